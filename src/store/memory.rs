//! In-process store: one ordered map of rows per table behind a tokio RwLock.

use crate::config::{ColumnDefault, ColumnType, IncludeSpec, ResolvedEntity};
use crate::error::AppError;
use crate::query::is_deleted_flag;
use crate::store::{now_timestamp, RecordStore};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

#[derive(Default)]
struct Table {
    last_id: i64,
    rows: BTreeMap<i64, Map<String, Value>>,
}

/// Supports integer primary keys only; ids are assigned sequentially per table.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<HashMap<String, Table>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn key_of(entity: &ResolvedEntity, id: &Value) -> Result<i64, AppError> {
    if entity.pk_type != ColumnType::Integer {
        return Err(AppError::BadRequest(format!(
            "{}: in-memory store supports integer primary keys only",
            entity.id
        )));
    }
    match id {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
    .ok_or_else(|| AppError::BadRequest(format!("invalid id for {}: {}", entity.id, id)))
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn insert(&self, entity: &ResolvedEntity, body: &Map<String, Value>) -> Result<Value, AppError> {
        if entity.pk_type != ColumnType::Integer {
            return Err(AppError::BadRequest(format!(
                "{}: in-memory store supports integer primary keys only",
                entity.id
            )));
        }
        let explicit_id = body
            .get(&entity.primary_key)
            .filter(|v| !v.is_null())
            .map(|v| key_of(entity, v))
            .transpose()?;

        let mut tables = self.tables.write().await;
        let table = tables.entry(entity.table_name.clone()).or_default();
        let id = match explicit_id {
            Some(id) if table.rows.contains_key(&id) => {
                return Err(AppError::Conflict(format!("{} {} already exists", entity.id, id)));
            }
            Some(id) => id,
            None => {
                let mut next = table.last_id + 1;
                while table.rows.contains_key(&next) {
                    next += 1;
                }
                next
            }
        };

        let mut row = Map::new();
        for col in &entity.columns {
            let value = if col.name == entity.primary_key {
                Value::from(id)
            } else if let Some(v) = body.get(&col.name) {
                v.clone()
            } else {
                match &col.default {
                    Some(ColumnDefault::Now) => now_timestamp(),
                    Some(ColumnDefault::Value(v)) => v.clone(),
                    None if entity.updated_column.as_deref() == Some(col.name.as_str()) => now_timestamp(),
                    None if col.nullable => Value::Null,
                    None => {
                        return Err(AppError::Validation(format!("{} is required", col.name)));
                    }
                }
            };
            row.insert(col.name.clone(), value);
        }

        table.last_id = table.last_id.max(id);
        table.rows.insert(id, row.clone());
        tracing::debug!(table = %entity.table_name, id, "insert");
        Ok(Value::Object(row))
    }

    async fn update(
        &self,
        entity: &ResolvedEntity,
        id: &Value,
        body: &Map<String, Value>,
    ) -> Result<Option<Value>, AppError> {
        let key = key_of(entity, id)?;
        let mut tables = self.tables.write().await;
        let Some(row) = tables
            .get_mut(&entity.table_name)
            .and_then(|t| t.rows.get_mut(&key))
        else {
            return Ok(None);
        };
        if is_deleted_flag(entity.soft_delete_column.as_deref().and_then(|col| row.get(col))) {
            return Ok(None);
        }
        for (k, v) in body {
            if *k == entity.primary_key || entity.column(k).is_none() {
                continue;
            }
            row.insert(k.clone(), v.clone());
        }
        if let Some(updated) = &entity.updated_column {
            row.insert(updated.clone(), now_timestamp());
        }
        tracing::debug!(table = %entity.table_name, id = key, "update");
        Ok(Some(Value::Object(row.clone())))
    }

    async fn get(&self, entity: &ResolvedEntity, id: &Value) -> Result<Option<Value>, AppError> {
        let key = key_of(entity, id)?;
        let tables = self.tables.read().await;
        Ok(tables
            .get(&entity.table_name)
            .and_then(|t| t.rows.get(&key))
            .map(|row| Value::Object(row.clone())))
    }

    async fn mark_deleted(&self, entity: &ResolvedEntity, id: &Value) -> Result<Option<Value>, AppError> {
        let key = key_of(entity, id)?;
        let mut tables = self.tables.write().await;
        let Some(table) = tables.get_mut(&entity.table_name) else {
            return Ok(None);
        };
        let Some(column) = &entity.soft_delete_column else {
            return Ok(table.rows.remove(&key).map(Value::Object));
        };
        let Some(row) = table.rows.get_mut(&key) else {
            return Ok(None);
        };
        if is_deleted_flag(row.get(column)) {
            return Ok(None);
        }
        row.insert(column.clone(), Value::Bool(true));
        if let Some(updated) = &entity.updated_column {
            row.insert(updated.clone(), now_timestamp());
        }
        tracing::debug!(table = %entity.table_name, id = key, "mark deleted");
        Ok(Some(Value::Object(row.clone())))
    }

    async fn list(&self, entity: &ResolvedEntity, includes: &[IncludeSpec]) -> Result<Vec<Value>, AppError> {
        let tables = self.tables.read().await;
        let Some(table) = tables.get(&entity.table_name) else {
            return Ok(Vec::new());
        };
        let rows = table
            .rows
            .values()
            .map(|row| {
                let mut row = row.clone();
                for inc in includes {
                    let related = row
                        .get(&inc.our_key_column)
                        .and_then(Value::as_i64)
                        .and_then(|fk| tables.get(&inc.related.table_name)?.rows.get(&fk))
                        .map(|r| Value::Object(r.clone()))
                        .unwrap_or(Value::Null);
                    row.insert(inc.name.clone(), related);
                }
                Value::Object(row)
            })
            .collect();
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{builtin_config, resolve, ResolvedModel};
    use serde_json::json;

    fn model() -> ResolvedModel {
        resolve(&builtin_config().unwrap()).unwrap()
    }

    fn body(v: Value) -> Map<String, Value> {
        v.as_object().unwrap().clone()
    }

    #[tokio::test]
    async fn insert_assigns_ids_and_defaults() {
        let model = model();
        let sprocket = model.entity("sprocket").unwrap();
        let store = MemoryStore::new();
        let a = store
            .insert(sprocket, &body(json!({"teeth": 5, "pitch_diameter": 5.0, "outside_diameter": 6.0, "pitch": 1})))
            .await
            .unwrap();
        let b = store
            .insert(sprocket, &body(json!({"teeth": 6, "pitch_diameter": 5.0, "outside_diameter": 6.0, "pitch": 1})))
            .await
            .unwrap();
        assert_eq!(a["id"], json!(1));
        assert_eq!(b["id"], json!(2));
        assert_eq!(a["deleted"], json!(false));
        assert!(a["date_created"].is_string());
        assert!(a["last_updated"].is_string());
    }

    #[tokio::test]
    async fn explicit_id_conflict() {
        let model = model();
        let factory = model.entity("factory").unwrap();
        let store = MemoryStore::new();
        store.insert(factory, &body(json!({"id": 7, "name": "A"}))).await.unwrap();
        let err = store.insert(factory, &body(json!({"id": 7, "name": "B"}))).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        let next = store.insert(factory, &body(json!({"name": "C"}))).await.unwrap();
        assert_eq!(next["id"], json!(8));
    }

    #[tokio::test]
    async fn missing_required_column_is_rejected() {
        let model = model();
        let factory = model.entity("factory").unwrap();
        let err = MemoryStore::new().insert(factory, &Map::new()).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn mark_deleted_is_soft_and_once() {
        let model = model();
        let factory = model.entity("factory").unwrap();
        let store = MemoryStore::new();
        store.insert(factory, &body(json!({"name": "A"}))).await.unwrap();
        assert!(store.mark_deleted(factory, &json!(1)).await.unwrap().is_some());
        assert!(store.mark_deleted(factory, &json!(1)).await.unwrap().is_none());
        let row = store.get(factory, &json!(1)).await.unwrap().unwrap();
        assert_eq!(row["deleted"], json!(true));
        assert!(store.update(factory, &json!(1), &body(json!({"name": "B"}))).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_embeds_related_rows() {
        let model = model();
        let listing = model.listing("sprocket_production").unwrap();
        let store = MemoryStore::new();
        store
            .insert(model.entity("factory").unwrap(), &body(json!({"name": "Factory 1"})))
            .await
            .unwrap();
        store
            .insert(
                model.entity("sprocket").unwrap(),
                &body(json!({"teeth": 5, "pitch_diameter": 5.0, "outside_diameter": 6.0, "pitch": 1})),
            )
            .await
            .unwrap();
        store
            .insert(
                &listing.entity,
                &body(json!({"sprocket_id": 1, "factory_id": 1, "sprocket_goal": 10, "sprocket_actual": 9})),
            )
            .await
            .unwrap();
        let rows = store.list(&listing.entity, &listing.includes).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["factory"]["name"], json!("Factory 1"));
        assert_eq!(rows[0]["sprocket"]["teeth"], json!(5));
        assert!(rows[0]["date_produced"].is_string());
    }

    #[tokio::test]
    async fn string_ids_are_accepted() {
        let model = model();
        let factory = model.entity("factory").unwrap();
        let store = MemoryStore::new();
        store.insert(factory, &body(json!({"name": "A"}))).await.unwrap();
        assert!(store.get(factory, &json!("1")).await.unwrap().is_some());
        assert!(matches!(
            store.get(factory, &json!("one")).await,
            Err(AppError::BadRequest(_))
        ));
    }
}
