//! Resolved entity model: config validated and flattened for runtime use.

use crate::config::{ColumnType, Operation, ValidationRule};
use crate::query::{is_deleted_flag, QueryConfig, QueryExecutor};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Value applied when an insert omits the column.
#[derive(Clone, Debug, PartialEq)]
pub enum ColumnDefault {
    Value(Value),
    /// Current time, as an RFC 3339 string.
    Now,
}

#[derive(Clone, Debug)]
pub struct ColumnInfo {
    pub name: String,
    pub column_type: ColumnType,
    pub nullable: bool,
    pub default: Option<ColumnDefault>,
}

impl ColumnInfo {
    /// PostgreSQL type name for SQL casts when binding values.
    pub fn pg_type(&self) -> &'static str {
        self.column_type.pg_type()
    }
}

/// To-one relation: our `column` references the related entity's primary key.
#[derive(Clone, Debug)]
pub struct RelationInfo {
    pub name: String,
    pub column: String,
    pub entity: String,
}

#[derive(Clone, Debug)]
pub struct ResolvedEntity {
    pub id: String,
    pub table_name: String,
    pub path_segment: String,
    pub primary_key: String,
    pub pk_type: ColumnType,
    pub columns: Vec<ColumnInfo>,
    pub relations: Vec<RelationInfo>,
    pub operations: HashSet<Operation>,
    /// Column names stripped from all API responses.
    pub hidden_columns: HashSet<String>,
    pub validation: HashMap<String, ValidationRule>,
    pub soft_delete_column: Option<String>,
    pub created_column: Option<String>,
    pub updated_column: Option<String>,
}

impl ResolvedEntity {
    pub fn column(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn relation(&self, name: &str) -> Option<&RelationInfo> {
        self.relations.iter().find(|r| r.name == name)
    }

    pub fn allows(&self, op: Operation) -> bool {
        self.operations.contains(&op)
    }

    /// Primary key and bookkeeping columns are managed by the store, never by request bodies.
    pub fn is_managed_column(&self, name: &str) -> bool {
        name == self.primary_key
            || self.soft_delete_column.as_deref() == Some(name)
            || self.created_column.as_deref() == Some(name)
            || self.updated_column.as_deref() == Some(name)
    }

    /// Columns a create/update body may set.
    pub fn writable_columns(&self) -> impl Iterator<Item = &ColumnInfo> {
        self.columns.iter().filter(|c| !self.is_managed_column(&c.name))
    }

    /// Whether a stored row carries the soft-delete flag.
    pub fn is_deleted(&self, row: &Value) -> bool {
        is_deleted_flag(self.soft_delete_column.as_deref().and_then(|col| row.get(col)))
    }

    /// Remove hidden columns from a row before it leaves the API.
    pub fn strip_hidden(&self, row: &mut Value) {
        if let Value::Object(map) = row {
            for col in &self.hidden_columns {
                map.remove(col);
            }
        }
    }
}

/// Related entity embedded in listing rows under `name`.
#[derive(Clone, Debug)]
pub struct IncludeSpec {
    pub name: String,
    /// Our foreign key column.
    pub our_key_column: String,
    /// Their primary key column.
    pub their_key_column: String,
    pub related: ResolvedEntity,
}

#[derive(Clone, Debug)]
pub struct ResolvedListing {
    pub id: String,
    pub path: String,
    pub entity: ResolvedEntity,
    pub includes: Vec<IncludeSpec>,
    pub query: Arc<QueryConfig>,
}

impl ResolvedListing {
    pub fn executor(&self) -> QueryExecutor {
        QueryExecutor::new(Arc::clone(&self.query))
    }

    /// Strip hidden columns from the row and from each embedded related row.
    pub fn present(&self, row: &mut Value) {
        for inc in &self.includes {
            if let Some(related) = row.get_mut(&inc.name) {
                inc.related.strip_hidden(related);
            }
        }
        self.entity.strip_hidden(row);
    }
}

#[derive(Clone, Debug)]
pub struct ResolvedModel {
    pub entities: Vec<ResolvedEntity>,
    pub entity_by_id: HashMap<String, ResolvedEntity>,
    pub listings: Vec<ResolvedListing>,
}

impl ResolvedModel {
    pub fn entity(&self, id: &str) -> Option<&ResolvedEntity> {
        self.entity_by_id.get(id)
    }

    pub fn listing(&self, id: &str) -> Option<&ResolvedListing> {
        self.listings.iter().find(|l| l.id == id)
    }
}
