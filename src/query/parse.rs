//! Filter and order expression parsing against an allow-list.
//!
//! Parsing never fails: tokens naming keys outside the allow-list, and empty tokens, are dropped.

use crate::config::ColumnType;
use crate::query::{AllowList, Comparator, FieldPath, FieldValue, Record};

/// One `field[__lt|__gt]:value` condition.
#[derive(Clone, Debug, PartialEq)]
pub struct FilterPredicate {
    /// Allow-listed field without the comparator suffix.
    pub field: String,
    pub operator: Comparator,
    /// Raw value from the query string.
    pub value: String,
    pub path: FieldPath,
    pub column_type: ColumnType,
    /// `value` converted to the column type; None when it does not convert, which matches nothing.
    target: Option<FieldValue>,
}

impl FilterPredicate {
    pub fn matches<R: Record>(&self, row: &R) -> bool {
        let Some(target) = &self.target else {
            return false;
        };
        let Some(actual) = row
            .field(&self.path)
            .and_then(|v| FieldValue::from_json(v, self.column_type))
        else {
            return false;
        };
        actual
            .compare(target)
            .map(|ord| self.operator.accepts(ord))
            .unwrap_or(false)
    }
}

/// One `[-]field` sort key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrderKey {
    pub field: String,
    pub descending: bool,
    pub path: FieldPath,
    pub column_type: ColumnType,
}

impl OrderKey {
    pub fn ascending(field: impl Into<String>, path: FieldPath, column_type: ColumnType) -> Self {
        OrderKey {
            field: field.into(),
            descending: false,
            path,
            column_type,
        }
    }

    pub fn descending(field: impl Into<String>, path: FieldPath, column_type: ColumnType) -> Self {
        OrderKey {
            descending: true,
            ..OrderKey::ascending(field, path, column_type)
        }
    }

    /// Sort value of `row` for this key.
    pub fn value_of<R: Record>(&self, row: &R) -> Option<FieldValue> {
        row.field(&self.path)
            .and_then(|v| FieldValue::from_json(v, self.column_type))
    }
}

fn tokens(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|t| !t.is_empty())
}

/// Parse `key:value,key:value`. The key is looked up verbatim, suffix included.
/// A token without `:` is a key with an empty value.
pub fn parse_filters(allowed: &AllowList, raw: &str) -> Vec<FilterPredicate> {
    tokens(raw)
        .filter_map(|token| {
            let (key, value) = token.split_once(':').unwrap_or((token, ""));
            let key = key.trim();
            let value = value.trim();
            let Some(desc) = allowed.get(key) else {
                tracing::debug!(key = %key, "filter key not allowed, ignored");
                return None;
            };
            Some(FilterPredicate {
                field: desc.field.clone(),
                operator: desc.comparator,
                value: value.to_string(),
                path: desc.path.clone(),
                column_type: desc.column_type,
                target: FieldValue::parse(value, desc.column_type),
            })
        })
        .collect()
}

/// Parse `field,-field`. Only plain (suffix-free) allow-list entries can be ordered on.
pub fn parse_order(allowed: &AllowList, raw: &str) -> Vec<OrderKey> {
    tokens(raw)
        .filter_map(|token| {
            let (name, descending) = match token.strip_prefix('-') {
                Some(rest) => (rest.trim(), true),
                None => (token, false),
            };
            let desc = allowed
                .get(name)
                .filter(|d| d.comparator == Comparator::Eq);
            let Some(desc) = desc else {
                tracing::debug!(key = %name, "order key not allowed, ignored");
                return None;
            };
            Some(OrderKey {
                field: desc.field.clone(),
                descending,
                path: desc.path.clone(),
                column_type: desc.column_type,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::FieldDescriptor;
    use serde_json::json;

    fn allow(entries: &[(&str, FieldPath, ColumnType)]) -> AllowList {
        let mut out = AllowList::new();
        for (key, path, ty) in entries {
            let (field, comparator) = Comparator::split_key(key);
            out.insert(
                key.to_string(),
                FieldDescriptor {
                    key: key.to_string(),
                    field: field.to_string(),
                    path: path.clone(),
                    comparator,
                    column_type: *ty,
                },
            );
        }
        out
    }

    fn production_allow() -> AllowList {
        allow(&[
            ("factory_id", FieldPath::column("factory_id"), ColumnType::Integer),
            ("sprocket_goal", FieldPath::column("sprocket_goal"), ColumnType::Integer),
            ("sprocket_goal__lt", FieldPath::column("sprocket_goal"), ColumnType::Integer),
            ("sprocket_goal__gt", FieldPath::column("sprocket_goal"), ColumnType::Integer),
            ("sprocket__teeth__gt", FieldPath::related("sprocket", "teeth"), ColumnType::Integer),
            ("factory__name", FieldPath::related("factory", "name"), ColumnType::Text),
            ("date_produced__lt", FieldPath::column("date_produced"), ColumnType::Timestamp),
        ])
    }

    #[test]
    fn one_predicate_per_allowed_token() {
        let preds = parse_filters(&production_allow(), "factory_id:3,sprocket_goal__lt:100,factory__name:Factory 1");
        assert_eq!(preds.len(), 3);
        assert_eq!(preds[0].field, "factory_id");
        assert_eq!(preds[0].operator, Comparator::Eq);
        assert_eq!(preds[0].value, "3");
        assert_eq!(preds[1].field, "sprocket_goal");
        assert_eq!(preds[1].operator, Comparator::Lt);
        assert_eq!(preds[2].path, FieldPath::related("factory", "name"));
        assert_eq!(preds[2].value, "Factory 1");
    }

    #[test]
    fn unknown_fields_are_dropped_not_rejected() {
        let preds = parse_filters(&production_allow(), "password:x,factory_id:1,sprocket_actual__gt:5");
        assert_eq!(preds.len(), 1);
        assert_eq!(preds[0].field, "factory_id");
    }

    #[test]
    fn suffix_must_be_allow_listed_exactly() {
        // factory_id is allowed but factory_id__gt is not
        assert!(parse_filters(&production_allow(), "factory_id__gt:1").is_empty());
        // sprocket__teeth__gt is allowed but the plain key is not
        assert!(parse_filters(&production_allow(), "sprocket__teeth:10").is_empty());
    }

    #[test]
    fn value_keeps_colons_after_first_split() {
        let preds = parse_filters(&production_allow(), "date_produced__lt:2023-01-01T10:00:00Z");
        assert_eq!(preds.len(), 1);
        assert_eq!(preds[0].value, "2023-01-01T10:00:00Z");
        assert!(preds[0].matches(&json!({"date_produced": "2022-12-31T23:59:59Z"})));
    }

    #[test]
    fn token_without_colon_has_empty_value() {
        let preds = parse_filters(&production_allow(), "factory__name");
        assert_eq!(preds.len(), 1);
        assert_eq!(preds[0].value, "");
        assert!(preds[0].matches(&json!({"factory": {"name": ""}})));
        assert!(!preds[0].matches(&json!({"factory": {"name": "Factory 1"}})));
    }

    #[test]
    fn empty_and_blank_tokens_are_skipped() {
        assert!(parse_filters(&production_allow(), "").is_empty());
        assert_eq!(parse_filters(&production_allow(), " , factory_id:2 ,,").len(), 1);
    }

    #[test]
    fn unconvertible_value_matches_nothing() {
        let preds = parse_filters(&production_allow(), "factory_id:abc");
        assert_eq!(preds.len(), 1);
        assert!(!preds[0].matches(&json!({"factory_id": 1})));
    }

    #[test]
    fn predicates_compare_numerically_and_through_relations() {
        let preds = parse_filters(&production_allow(), "sprocket_goal__gt:9,sprocket__teeth__gt:10");
        let row = json!({"sprocket_goal": 10, "sprocket": {"teeth": 12}});
        assert!(preds.iter().all(|p| p.matches(&row)));
        let row = json!({"sprocket_goal": 10, "sprocket": {"teeth": 9}});
        assert!(!preds.iter().all(|p| p.matches(&row)));
        // missing relation never matches
        assert!(!preds[1].matches(&json!({"sprocket_goal": 10})));
    }

    #[test]
    fn order_tokens_with_direction() {
        let keys = parse_order(&production_allow(), "-sprocket_goal, factory_id,unknown");
        assert_eq!(keys.len(), 2);
        assert_eq!(keys[0].field, "sprocket_goal");
        assert!(keys[0].descending);
        assert_eq!(keys[1].field, "factory_id");
        assert!(!keys[1].descending);
    }

    #[test]
    fn order_ignores_comparator_entries() {
        assert!(parse_order(&production_allow(), "sprocket_goal__lt,-date_produced__lt").is_empty());
    }
}
