//! Allow-list descriptors and typed field values used by filters and ordering.

use crate::config::ColumnType;
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;

/// Where a field lives in a row: a column of the row itself, or a column of a related row
/// embedded under the relation name.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FieldPath {
    pub relation: Option<String>,
    pub column: String,
}

impl FieldPath {
    pub fn column(column: impl Into<String>) -> Self {
        FieldPath {
            relation: None,
            column: column.into(),
        }
    }

    pub fn related(relation: impl Into<String>, column: impl Into<String>) -> Self {
        FieldPath {
            relation: Some(relation.into()),
            column: column.into(),
        }
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.relation {
            Some(rel) => write!(f, "{}.{}", rel, self.column),
            None => f.write_str(&self.column),
        }
    }
}

/// Comparison selected by the key suffix: none, `__lt` or `__gt`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Comparator {
    Eq,
    Lt,
    Gt,
}

impl Comparator {
    pub fn suffix(self) -> &'static str {
        match self {
            Comparator::Eq => "",
            Comparator::Lt => "__lt",
            Comparator::Gt => "__gt",
        }
    }

    /// Split a query key into its base field and comparator. "sprocket_goal__lt" -> ("sprocket_goal", Lt).
    pub fn split_key(key: &str) -> (&str, Comparator) {
        for cmp in [Comparator::Lt, Comparator::Gt] {
            if let Some(base) = key.strip_suffix(cmp.suffix()) {
                if !base.is_empty() {
                    return (base, cmp);
                }
            }
        }
        (key, Comparator::Eq)
    }

    /// Whether `actual.cmp(target)` satisfies this comparator.
    pub fn accepts(self, ordering: Ordering) -> bool {
        match self {
            Comparator::Eq => ordering == Ordering::Equal,
            Comparator::Lt => ordering == Ordering::Less,
            Comparator::Gt => ordering == Ordering::Greater,
        }
    }
}

/// One allow-listed query key, resolved at startup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldDescriptor {
    /// Exact key accepted in a query string, suffix included.
    pub key: String,
    /// Key without the comparator suffix.
    pub field: String,
    pub path: FieldPath,
    pub comparator: Comparator,
    pub column_type: ColumnType,
}

/// Allow-list keyed by the exact query key.
pub type AllowList = HashMap<String, FieldDescriptor>;

/// A row value converted to its column type for comparison.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Timestamp(DateTime<Utc>),
}

impl FieldValue {
    /// Convert a query-string value. Returns None when the text does not fit the column type.
    pub fn parse(raw: &str, column_type: ColumnType) -> Option<Self> {
        match column_type {
            ColumnType::Integer => {
                let s = raw.trim();
                s.parse::<i64>()
                    .map(FieldValue::Int)
                    .ok()
                    .or_else(|| parse_finite_f64(s).map(FieldValue::Float))
            }
            ColumnType::Float => parse_finite_f64(raw.trim()).map(FieldValue::Float),
            ColumnType::Boolean => parse_bool(raw.trim()).map(FieldValue::Bool),
            ColumnType::Text => Some(FieldValue::Text(raw.to_string())),
            ColumnType::Timestamp => parse_timestamp(raw.trim()).map(FieldValue::Timestamp),
        }
    }

    /// Convert a stored row value. Null and mismatched values yield None.
    pub fn from_json(value: &Value, column_type: ColumnType) -> Option<Self> {
        match (column_type, value) {
            (_, Value::Null) => None,
            (ColumnType::Integer, Value::Number(n)) => n
                .as_i64()
                .map(FieldValue::Int)
                .or_else(|| n.as_f64().map(FieldValue::Float)),
            (ColumnType::Float, Value::Number(n)) => n.as_f64().map(FieldValue::Float),
            (ColumnType::Boolean, Value::Bool(b)) => Some(FieldValue::Bool(*b)),
            (ColumnType::Text, Value::String(s)) => Some(FieldValue::Text(s.clone())),
            (ColumnType::Text, Value::Number(n)) => Some(FieldValue::Text(n.to_string())),
            (ColumnType::Timestamp, Value::String(s)) => parse_timestamp(s).map(FieldValue::Timestamp),
            (ColumnType::Timestamp, Value::Number(n)) => n
                .as_i64()
                .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
                .map(FieldValue::Timestamp),
            (_, Value::String(s)) => FieldValue::parse(s, column_type),
            _ => None,
        }
    }

    /// Ordering between two values of compatible kinds. Integers and floats compare numerically.
    pub fn compare(&self, other: &FieldValue) -> Option<Ordering> {
        match (self, other) {
            (FieldValue::Int(a), FieldValue::Int(b)) => Some(a.cmp(b)),
            (FieldValue::Int(a), FieldValue::Float(b)) => (*a as f64).partial_cmp(b),
            (FieldValue::Float(a), FieldValue::Int(b)) => a.partial_cmp(&(*b as f64)),
            (FieldValue::Float(a), FieldValue::Float(b)) => a.partial_cmp(b),
            (FieldValue::Bool(a), FieldValue::Bool(b)) => Some(a.cmp(b)),
            (FieldValue::Text(a), FieldValue::Text(b)) => Some(a.cmp(b)),
            (FieldValue::Timestamp(a), FieldValue::Timestamp(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

fn parse_finite_f64(s: &str) -> Option<f64> {
    s.parse::<f64>().ok().filter(|f| f.is_finite())
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

/// Accepts RFC 3339, naive ISO date-times (taken as UTC) and plain dates (midnight UTC).
/// Bare numbers are not timestamps.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn split_key_recognizes_suffixes() {
        assert_eq!(Comparator::split_key("sprocket_goal__lt"), ("sprocket_goal", Comparator::Lt));
        assert_eq!(Comparator::split_key("sprocket__teeth__gt"), ("sprocket__teeth", Comparator::Gt));
        assert_eq!(Comparator::split_key("factory__name"), ("factory__name", Comparator::Eq));
        assert_eq!(Comparator::split_key("__lt"), ("__lt", Comparator::Eq));
    }

    #[test]
    fn integer_filter_value_falls_back_to_float() {
        assert_eq!(FieldValue::parse("42", ColumnType::Integer), Some(FieldValue::Int(42)));
        assert_eq!(FieldValue::parse("4.5", ColumnType::Integer), Some(FieldValue::Float(4.5)));
        assert_eq!(FieldValue::parse("abc", ColumnType::Integer), None);
        assert_eq!(FieldValue::parse("NaN", ColumnType::Float), None);
    }

    #[test]
    fn mixed_numeric_comparison() {
        let a = FieldValue::Int(3);
        let b = FieldValue::Float(3.5);
        assert_eq!(a.compare(&b), Some(Ordering::Less));
        assert_eq!(b.compare(&a), Some(Ordering::Greater));
        assert_eq!(a.compare(&FieldValue::Text("3".into())), None);
    }

    #[test]
    fn timestamps_in_several_shapes() {
        let expected = Utc.with_ymd_and_hms(2023, 3, 1, 12, 0, 0).single();
        assert_eq!(parse_timestamp("2023-03-01T12:00:00Z"), expected);
        assert_eq!(parse_timestamp("2023-03-01T14:00:00+02:00"), expected);
        assert_eq!(parse_timestamp("2023-03-01 12:00:00"), expected);
        assert_eq!(parse_timestamp(&expected.unwrap().timestamp().to_string()), None);
        assert_eq!(parse_timestamp("2025"), None);
        assert_eq!(
            parse_timestamp("2023-03-01"),
            Utc.with_ymd_and_hms(2023, 3, 1, 0, 0, 0).single()
        );
        assert_eq!(parse_timestamp("yesterday"), None);
    }

    #[test]
    fn from_json_rejects_null_and_mismatches() {
        assert_eq!(FieldValue::from_json(&Value::Null, ColumnType::Integer), None);
        assert_eq!(FieldValue::from_json(&json!(true), ColumnType::Integer), None);
        assert_eq!(
            FieldValue::from_json(&json!("7"), ColumnType::Integer),
            Some(FieldValue::Int(7))
        );
        assert_eq!(
            FieldValue::from_json(&json!(true), ColumnType::Boolean),
            Some(FieldValue::Bool(true))
        );
    }
}
