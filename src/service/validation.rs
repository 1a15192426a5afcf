//! Request body validation from the entity's columns and config rules.

use crate::config::{ColumnInfo, ColumnType, ResolvedEntity, ValidationRule};
use crate::error::AppError;
use crate::query::parse_timestamp;
use regex::Regex;
use serde_json::{Map, Value};

pub struct RequestValidator;

impl RequestValidator {
    /// Body of a create: only writable columns, correctly typed, every required column present.
    pub fn validate_create(entity: &ResolvedEntity, body: &Map<String, Value>) -> Result<(), AppError> {
        check_keys(entity, body, false)?;
        for col in entity.writable_columns() {
            let val = body.get(&col.name).filter(|v| !v.is_null());
            if val.is_none() && is_required(col, entity.validation.get(&col.name)) {
                return Err(AppError::Validation(format!("{} is required", col.name)));
            }
        }
        check_values(entity, body)
    }

    /// Body of an update: the primary key plus any subset of writable columns.
    pub fn validate_update(entity: &ResolvedEntity, body: &Map<String, Value>) -> Result<Value, AppError> {
        let id = body
            .get(&entity.primary_key)
            .filter(|v| !v.is_null())
            .cloned()
            .ok_or_else(|| AppError::Validation(format!("{} is required", entity.primary_key)))?;
        if let Some(pk) = entity.column(&entity.primary_key) {
            check_type(pk, &id)?;
        }
        check_keys(entity, body, true)?;
        for (key, v) in body {
            if *key == entity.primary_key {
                continue;
            }
            let required = entity
                .column(key)
                .is_some_and(|c| is_required(c, entity.validation.get(key)));
            if v.is_null() && required {
                return Err(AppError::Validation(format!("{} may not be null", key)));
            }
        }
        check_values(entity, body)?;
        Ok(id)
    }
}

/// Required by rule, or non-nullable without a default.
fn is_required(col: &ColumnInfo, rule: Option<&ValidationRule>) -> bool {
    match rule.and_then(|r| r.required) {
        Some(required) => required,
        None => !col.nullable && col.default.is_none(),
    }
}

fn check_keys(entity: &ResolvedEntity, body: &Map<String, Value>, allow_pk: bool) -> Result<(), AppError> {
    for key in body.keys() {
        if allow_pk && *key == entity.primary_key {
            continue;
        }
        match entity.column(key) {
            None => return Err(AppError::Validation(format!("unknown field: {}", key))),
            Some(_) if entity.is_managed_column(key) => {
                return Err(AppError::Validation(format!("{} is read-only", key)));
            }
            Some(_) => {}
        }
    }
    Ok(())
}

fn check_values(entity: &ResolvedEntity, body: &Map<String, Value>) -> Result<(), AppError> {
    for (key, v) in body {
        let Some(col) = entity.column(key) else { continue };
        check_type(col, v)?;
        if let Some(rule) = entity.validation.get(key) {
            validate_field(key, v, rule)?;
        }
    }
    Ok(())
}

fn check_type(col: &ColumnInfo, v: &Value) -> Result<(), AppError> {
    if v.is_null() {
        return if col.nullable {
            Ok(())
        } else {
            Err(AppError::Validation(format!("{} may not be null", col.name)))
        };
    }
    let ok = match col.column_type {
        ColumnType::Integer => v.as_i64().is_some(),
        ColumnType::Float => v.is_number(),
        ColumnType::Boolean => v.is_boolean(),
        ColumnType::Text => v.is_string(),
        ColumnType::Timestamp => v.as_str().and_then(parse_timestamp).is_some(),
    };
    if ok {
        Ok(())
    } else {
        Err(AppError::Validation(format!(
            "{} must be of type {}",
            col.name,
            col.column_type.as_str()
        )))
    }
}

fn validate_field(col: &str, v: &Value, rule: &ValidationRule) -> Result<(), AppError> {
    if v.is_null() {
        return Ok(());
    }
    if let (Some(max), Some(s)) = (rule.max_length, v.as_str()) {
        if s.chars().count() > max as usize {
            return Err(AppError::Validation(format!(
                "{} must be at most {} characters",
                col, max
            )));
        }
    }
    if let (Some(min), Some(s)) = (rule.min_length, v.as_str()) {
        if s.chars().count() < min as usize {
            return Err(AppError::Validation(format!(
                "{} must be at least {} characters",
                col, min
            )));
        }
    }
    if let (Some(pattern), Some(s)) = (&rule.pattern, v.as_str()) {
        let re = Regex::new(pattern).map_err(|_| AppError::Validation(format!("invalid pattern for {}", col)))?;
        if !re.is_match(s) {
            return Err(AppError::Validation(format!("{} does not match required pattern", col)));
        }
    }
    if let Some(allowed) = &rule.allowed {
        if !allowed.iter().any(|a| value_eq(v, a)) {
            return Err(AppError::Validation(format!(
                "{} must be one of: {:?}",
                col,
                allowed.iter().take(5).collect::<Vec<_>>()
            )));
        }
    }
    if let (Some(min), Some(n)) = (rule.minimum, v.as_f64()) {
        if n < min {
            return Err(AppError::Validation(format!("{} must be at least {}", col, min)));
        }
    }
    if let (Some(max), Some(n)) = (rule.maximum, v.as_f64()) {
        if n > max {
            return Err(AppError::Validation(format!("{} must be at most {}", col, max)));
        }
    }
    Ok(())
}

fn value_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(n), Value::Number(m)) => n.as_f64() == m.as_f64(),
        _ => a == b,
    }
}
