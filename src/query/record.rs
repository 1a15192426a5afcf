//! Row access used by the executor. Rows are JSON objects; related rows are embedded under the relation name.

use crate::query::FieldPath;
use serde_json::{Map, Value};

/// Soft-delete flag check shared by the executor and the stores: only JSON `true` marks a row deleted.
pub fn is_deleted_flag(value: Option<&Value>) -> bool {
    value.and_then(Value::as_bool).unwrap_or(false)
}

pub trait Record {
    /// Raw value at `path`, following at most one relation.
    fn field(&self, path: &FieldPath) -> Option<&Value>;
}

impl Record for Map<String, Value> {
    fn field(&self, path: &FieldPath) -> Option<&Value> {
        match &path.relation {
            Some(rel) => self.get(rel)?.get(&path.column),
            None => self.get(&path.column),
        }
    }
}

impl Record for Value {
    fn field(&self, path: &FieldPath) -> Option<&Value> {
        self.as_object()?.field(path)
    }
}
