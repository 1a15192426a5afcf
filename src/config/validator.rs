//! Config validation: referential integrity, column roles and route uniqueness.

use crate::config::{ColumnDefaultConfig, ColumnType, EntityConfig, FullConfig};
use crate::error::ConfigError;
use regex::Regex;
use std::collections::{HashMap, HashSet};

/// Default expressions the stores know how to evaluate.
pub const NOW_EXPRESSION: &str = "now()";

pub fn validate(config: &FullConfig) -> Result<(), ConfigError> {
    if config.entities.is_empty() {
        return Err(ConfigError::Validation("at least one entity required".into()));
    }

    let mut entity_ids = HashSet::new();
    let mut path_segments = HashSet::new();
    let mut tables = HashSet::new();
    for e in &config.entities {
        if !entity_ids.insert(e.id.as_str()) {
            return Err(ConfigError::Duplicate { kind: "entity", id: e.id.clone() });
        }
        if !path_segments.insert(e.path_segment.as_str()) {
            return Err(ConfigError::Duplicate { kind: "path segment", id: e.path_segment.clone() });
        }
        if !tables.insert(e.table.as_str()) {
            return Err(ConfigError::Duplicate { kind: "table", id: e.table.clone() });
        }
        if !is_identifier(&e.path_segment) {
            return Err(ConfigError::Validation(format!(
                "entity {}: path segment '{}' must be alphanumeric or '_'",
                e.id, e.path_segment
            )));
        }
    }

    let by_id: HashMap<&str, &EntityConfig> = config.entities.iter().map(|e| (e.id.as_str(), e)).collect();
    for e in &config.entities {
        validate_entity(e, &by_id)?;
    }

    // Static routes generated per entity; a listing must not shadow one of them.
    let mut routes: HashSet<String> = config
        .entities
        .iter()
        .flat_map(|e| {
            [
                format!("/{}/create", e.path_segment),
                format!("/{}/update", e.path_segment),
            ]
        })
        .collect();
    for common in ["/status", "/status/", "/health", "/ready", "/version"] {
        routes.insert(common.to_string());
    }
    let mut listing_ids = HashSet::new();
    for l in &config.listings {
        if !listing_ids.insert(l.id.as_str()) {
            return Err(ConfigError::Duplicate { kind: "listing", id: l.id.clone() });
        }
        if !by_id.contains_key(l.entity.as_str()) {
            return Err(ConfigError::MissingReference { kind: "entity", id: l.entity.clone() });
        }
        if !l.path.starts_with('/') || l.path.contains(':') || l.path.contains('*') {
            return Err(ConfigError::Validation(format!(
                "listing {}: path '{}' must be a static path starting with '/'",
                l.id, l.path
            )));
        }
        if !routes.insert(l.path.clone()) {
            return Err(ConfigError::Duplicate { kind: "route", id: l.path.clone() });
        }
        if l.default_page_size == 0 || l.max_page_size < l.default_page_size {
            return Err(ConfigError::Validation(format!(
                "listing {}: need 1 <= default_page_size ({}) <= max_page_size ({})",
                l.id, l.default_page_size, l.max_page_size
            )));
        }
    }

    Ok(())
}

fn validate_entity(e: &EntityConfig, by_id: &HashMap<&str, &EntityConfig>) -> Result<(), ConfigError> {
    let mut columns: HashMap<&str, ColumnType> = HashMap::new();
    for c in &e.columns {
        if columns.insert(c.name.as_str(), c.type_).is_some() {
            return Err(ConfigError::Duplicate {
                kind: "column",
                id: format!("{}.{}", e.id, c.name),
            });
        }
        if let Some(ColumnDefaultConfig::Expression { expression }) = &c.default {
            if !expression.eq_ignore_ascii_case(NOW_EXPRESSION) || c.type_ != ColumnType::Timestamp {
                return Err(ConfigError::Validation(format!(
                    "{}.{}: only timestamp columns may default to {}",
                    e.id, c.name, NOW_EXPRESSION
                )));
            }
        }
    }

    if !columns.contains_key(e.primary_key.as_str()) {
        return Err(ConfigError::InvalidPrimaryKey {
            entity: e.id.clone(),
            column: e.primary_key.clone(),
        });
    }

    let roles = [
        ("soft delete", &e.soft_delete_column, ColumnType::Boolean),
        ("created", &e.created_column, ColumnType::Timestamp),
        ("updated", &e.updated_column, ColumnType::Timestamp),
    ];
    for (role, column, expected) in roles {
        let Some(name) = column else { continue };
        match columns.get(name.as_str()) {
            Some(t) if *t == expected => {}
            Some(t) => {
                return Err(ConfigError::Validation(format!(
                    "{}: {} column '{}' must be {:?}, is {:?}",
                    e.id, role, name, expected, t
                )))
            }
            None => {
                return Err(ConfigError::MissingReference {
                    kind: "column",
                    id: format!("{}.{}", e.id, name),
                })
            }
        }
    }

    let mut relation_names = HashSet::new();
    for r in &e.relations {
        if !relation_names.insert(r.name.as_str()) || columns.contains_key(r.name.as_str()) {
            return Err(ConfigError::Duplicate {
                kind: "relation",
                id: format!("{}.{}", e.id, r.name),
            });
        }
        let Some(target) = by_id.get(r.entity.as_str()) else {
            return Err(ConfigError::MissingReference { kind: "entity", id: r.entity.clone() });
        };
        let Some(fk_type) = columns.get(r.column.as_str()) else {
            return Err(ConfigError::MissingReference {
                kind: "column",
                id: format!("{}.{}", e.id, r.column),
            });
        };
        let pk_type = target
            .columns
            .iter()
            .find(|c| c.name == target.primary_key)
            .map(|c| c.type_);
        if pk_type != Some(*fk_type) {
            return Err(ConfigError::Validation(format!(
                "{}.{}: foreign key type does not match {}.{}",
                e.id, r.column, target.id, target.primary_key
            )));
        }
    }

    for name in e.hidden_columns.iter().chain(e.validation.keys()) {
        if !columns.contains_key(name.as_str()) {
            return Err(ConfigError::MissingReference {
                kind: "column",
                id: format!("{}.{}", e.id, name),
            });
        }
    }
    for (name, rule) in &e.validation {
        if let Some(pattern) = &rule.pattern {
            Regex::new(pattern)
                .map_err(|err| ConfigError::Validation(format!("{}.{}: invalid pattern: {}", e.id, name, err)))?;
        }
    }

    Ok(())
}

fn is_identifier(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}
