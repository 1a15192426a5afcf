//! Generic CRUD over a `RecordStore`, plus the paginated listing.

use crate::config::{ResolvedEntity, ResolvedListing};
use crate::error::AppError;
use crate::query::{ListParams, Page};
use crate::service::RequestValidator;
use crate::store::RecordStore;
use serde_json::{Map, Value};

pub struct CrudService;

impl CrudService {
    /// Load the listing's rows with includes, run the query engine, strip hidden columns from the page.
    pub async fn list(
        store: &dyn RecordStore,
        listing: &ResolvedListing,
        params: &ListParams,
    ) -> Result<Page<Value>, AppError> {
        let rows = store.list(&listing.entity, &listing.includes).await?;
        let mut page = listing.executor().execute(rows, params);
        for row in &mut page.items {
            listing.present(row);
        }
        Ok(page)
    }

    /// Fetch one live row. Soft-deleted rows read as not found.
    pub async fn read(store: &dyn RecordStore, entity: &ResolvedEntity, id: &Value) -> Result<Value, AppError> {
        let mut row = store
            .get(entity, id)
            .await?
            .filter(|row| !entity.is_deleted(row))
            .ok_or_else(|| not_found(entity, id))?;
        entity.strip_hidden(&mut row);
        Ok(row)
    }

    pub async fn create(
        store: &dyn RecordStore,
        entity: &ResolvedEntity,
        body: &Map<String, Value>,
    ) -> Result<Value, AppError> {
        RequestValidator::validate_create(entity, body)?;
        let mut row = store.insert(entity, body).await?;
        tracing::info!(entity = %entity.id, id = %row[&entity.primary_key], "created");
        entity.strip_hidden(&mut row);
        Ok(row)
    }

    /// Update a live row; the primary key comes from the body.
    pub async fn update(
        store: &dyn RecordStore,
        entity: &ResolvedEntity,
        body: &Map<String, Value>,
    ) -> Result<Value, AppError> {
        let id = RequestValidator::validate_update(entity, body)?;
        let mut row = store
            .update(entity, &id, body)
            .await?
            .ok_or_else(|| not_found(entity, &id))?;
        tracing::info!(entity = %entity.id, id = %id, "updated");
        entity.strip_hidden(&mut row);
        Ok(row)
    }

    /// Soft delete a live row. Returns the row as it was marked.
    pub async fn delete(store: &dyn RecordStore, entity: &ResolvedEntity, id: &Value) -> Result<Value, AppError> {
        let mut row = store
            .mark_deleted(entity, id)
            .await?
            .ok_or_else(|| not_found(entity, id))?;
        tracing::info!(entity = %entity.id, id = %id, "deleted");
        entity.strip_hidden(&mut row);
        Ok(row)
    }
}

fn not_found(entity: &ResolvedEntity, id: &Value) -> AppError {
    AppError::NotFound(format!("{} {}", entity.id, id))
}
