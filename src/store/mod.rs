//! Relational storage interface the CRUD service and the listing engine read from.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use crate::config::{IncludeSpec, ResolvedEntity};
use crate::error::AppError;
use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};

/// Rows are JSON objects keyed by column name.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert one row. The store assigns the primary key when absent and fills column defaults.
    async fn insert(&self, entity: &ResolvedEntity, body: &Map<String, Value>) -> Result<Value, AppError>;

    /// Set the given columns on a live (not soft-deleted) row. None when there is no such row.
    async fn update(
        &self,
        entity: &ResolvedEntity,
        id: &Value,
        body: &Map<String, Value>,
    ) -> Result<Option<Value>, AppError>;

    /// Fetch one row by primary key, soft-deleted or not.
    async fn get(&self, entity: &ResolvedEntity, id: &Value) -> Result<Option<Value>, AppError>;

    /// Soft-delete a live row (hard delete when the entity has no soft-delete column).
    /// Returns the affected row, or None when there was no live row.
    async fn mark_deleted(&self, entity: &ResolvedEntity, id: &Value) -> Result<Option<Value>, AppError>;

    /// All rows of the entity, each with its to-one includes embedded under the include name.
    async fn list(&self, entity: &ResolvedEntity, includes: &[IncludeSpec]) -> Result<Vec<Value>, AppError>;

    /// Readiness check.
    async fn ping(&self) -> Result<(), AppError> {
        Ok(())
    }
}

/// Current time in the format rows carry for timestamp columns.
pub fn now_timestamp() -> Value {
    Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true))
}
