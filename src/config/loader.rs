//! Load model config (built in or from a JSON file) and resolve it for runtime use.

use crate::config::resolved::{
    ColumnDefault, ColumnInfo, IncludeSpec, RelationInfo, ResolvedEntity, ResolvedListing, ResolvedModel,
};
use crate::config::types::*;
use crate::config::validate;
use crate::error::ConfigError;
use crate::query::{AllowList, Comparator, FieldDescriptor, FieldPath, OrderKey, QueryConfig};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

const BUILTIN_CONFIG: &str = include_str!("../../config/sprocket.json");

/// The factory/sprocket model shipped with the crate.
pub fn builtin_config() -> Result<FullConfig, ConfigError> {
    serde_json::from_str(BUILTIN_CONFIG).map_err(|e| ConfigError::Load(format!("builtin config: {}", e)))
}

/// Read a model config JSON file.
pub async fn load_from_path(path: impl AsRef<Path>) -> Result<FullConfig, ConfigError> {
    let path = path.as_ref();
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
    serde_json::from_str(&raw).map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))
}

/// Build resolved model from full config. Validates first.
pub fn resolve(config: &FullConfig) -> Result<ResolvedModel, ConfigError> {
    validate(config)?;

    let entities: Vec<ResolvedEntity> = config.entities.iter().map(resolve_entity).collect::<Result<_, _>>()?;
    let entity_by_id: HashMap<String, ResolvedEntity> =
        entities.iter().map(|e| (e.id.clone(), e.clone())).collect();

    let mut listings = Vec::with_capacity(config.listings.len());
    for l in &config.listings {
        let entity = entity_by_id
            .get(&l.entity)
            .ok_or_else(|| ConfigError::MissingReference {
                kind: "entity",
                id: l.entity.clone(),
            })?;
        listings.push(resolve_listing(l, entity, &entity_by_id)?);
    }

    tracing::debug!(entities = entities.len(), listings = listings.len(), "model resolved");
    Ok(ResolvedModel {
        entities,
        entity_by_id,
        listings,
    })
}

fn resolve_entity(e: &EntityConfig) -> Result<ResolvedEntity, ConfigError> {
    let columns: Vec<ColumnInfo> = e
        .columns
        .iter()
        .map(|c| ColumnInfo {
            name: c.name.clone(),
            column_type: c.type_,
            nullable: c.nullable,
            default: c.default.as_ref().map(|d| match d {
                ColumnDefaultConfig::Literal(v) => ColumnDefault::Value(v.clone()),
                ColumnDefaultConfig::Expression { .. } => ColumnDefault::Now,
            }),
        })
        .collect();
    let pk_type = columns
        .iter()
        .find(|c| c.name == e.primary_key)
        .map(|c| c.column_type)
        .ok_or_else(|| ConfigError::InvalidPrimaryKey {
            entity: e.id.clone(),
            column: e.primary_key.clone(),
        })?;

    Ok(ResolvedEntity {
        id: e.id.clone(),
        table_name: e.table.clone(),
        path_segment: e.path_segment.clone(),
        primary_key: e.primary_key.clone(),
        pk_type,
        columns,
        relations: e
            .relations
            .iter()
            .map(|r| RelationInfo {
                name: r.name.clone(),
                column: r.column.clone(),
                entity: r.entity.clone(),
            })
            .collect(),
        operations: e.operations.iter().copied().collect(),
        hidden_columns: e.hidden_columns.iter().cloned().collect(),
        validation: e.validation.clone(),
        soft_delete_column: e.soft_delete_column.clone(),
        created_column: e.created_column.clone(),
        updated_column: e.updated_column.clone(),
    })
}

fn resolve_listing(
    l: &ListingConfig,
    entity: &ResolvedEntity,
    entity_by_id: &HashMap<String, ResolvedEntity>,
) -> Result<ResolvedListing, ConfigError> {
    let includes: Vec<IncludeSpec> = entity
        .relations
        .iter()
        .map(|r| {
            let related = entity_by_id.get(&r.entity).ok_or_else(|| ConfigError::MissingReference {
                kind: "entity",
                id: r.entity.clone(),
            })?;
            Ok(IncludeSpec {
                name: r.name.clone(),
                our_key_column: r.column.clone(),
                their_key_column: related.primary_key.clone(),
                related: related.clone(),
            })
        })
        .collect::<Result<_, ConfigError>>()?;

    let mut allowed = AllowList::new();
    for key in &l.allowed_fields {
        let desc = resolve_allowed_field(&l.id, key, entity, entity_by_id)?;
        if allowed.insert(key.clone(), desc).is_some() {
            return Err(ConfigError::Duplicate {
                kind: "allowed field",
                id: format!("{}.{}", l.id, key),
            });
        }
    }

    let mut query = QueryConfig::new(allowed, &entity.primary_key, entity.pk_type);
    query.soft_delete = entity.soft_delete_column.clone();
    if let Some(created) = &entity.created_column {
        query.default_order = vec![OrderKey::descending(
            created.clone(),
            FieldPath::column(created.clone()),
            ColumnType::Timestamp,
        )];
    }
    query.default_page_size = l.default_page_size;
    query.max_page_size = l.max_page_size;

    Ok(ResolvedListing {
        id: l.id.clone(),
        path: l.path.clone(),
        entity: entity.clone(),
        includes,
        query: Arc::new(query),
    })
}

/// `column`, `relation__column`, each optionally suffixed with `__lt` / `__gt`.
fn resolve_allowed_field(
    listing: &str,
    key: &str,
    entity: &ResolvedEntity,
    entity_by_id: &HashMap<String, ResolvedEntity>,
) -> Result<FieldDescriptor, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidAllowedField {
        listing: listing.to_string(),
        key: key.to_string(),
        reason,
    };

    let (field, comparator) = Comparator::split_key(key);
    let segments: Vec<&str> = field.split("__").collect();
    let (path, column_type) = match segments.as_slice() {
        [column] => {
            let col = entity
                .column(column)
                .ok_or_else(|| invalid(format!("is not a column of {}", entity.id)))?;
            (FieldPath::column(*column), col.column_type)
        }
        [relation, column] => {
            let rel = entity
                .relation(relation)
                .ok_or_else(|| invalid(format!("'{}' is not a relation of {}", relation, entity.id)))?;
            let related = entity_by_id
                .get(&rel.entity)
                .ok_or_else(|| invalid(format!("relation target {} is unknown", rel.entity)))?;
            let col = related
                .column(column)
                .ok_or_else(|| invalid(format!("is not a column of {}", related.id)))?;
            (FieldPath::related(*relation, *column), col.column_type)
        }
        _ => return Err(invalid("follows more than one relation".into())),
    };

    if comparator != Comparator::Eq && column_type == ColumnType::Boolean {
        return Err(invalid("uses a range comparison on a boolean column".into()));
    }

    Ok(FieldDescriptor {
        key: key.to_string(),
        field: field.to_string(),
        path,
        comparator,
        column_type,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing(cfg: &mut FullConfig) -> &mut ListingConfig {
        &mut cfg.listings[0]
    }

    #[test]
    fn builtin_config_resolves() {
        let model = resolve(&builtin_config().unwrap()).unwrap();
        assert_eq!(model.entities.len(), 3);
        let listing = model.listing("sprocket_production").unwrap();
        assert_eq!(listing.path, "/factory/sprockets");
        assert_eq!(listing.query.allowed.len(), 25);
        assert_eq!(listing.includes.len(), 2);
        assert_eq!(listing.query.soft_delete.as_deref(), Some("deleted"));
        assert_eq!(listing.query.default_order.len(), 1);
        assert!(listing.query.default_order[0].descending);
        assert_eq!(listing.query.default_order[0].field, "date_created");
    }

    #[test]
    fn relation_fields_resolve_to_descriptors() {
        let model = resolve(&builtin_config().unwrap()).unwrap();
        let allowed = &model.listing("sprocket_production").unwrap().query.allowed;

        let teeth_lt = &allowed["sprocket__teeth__lt"];
        assert_eq!(teeth_lt.field, "sprocket__teeth");
        assert_eq!(teeth_lt.comparator, Comparator::Lt);
        assert_eq!(teeth_lt.path, FieldPath::related("sprocket", "teeth"));
        assert_eq!(teeth_lt.column_type, ColumnType::Integer);

        let name = &allowed["factory__name"];
        assert_eq!(name.column_type, ColumnType::Text);

        let produced = &allowed["date_produced__gt"];
        assert_eq!(produced.path, FieldPath::column("date_produced"));
        assert_eq!(produced.column_type, ColumnType::Timestamp);
    }

    #[test]
    fn unknown_allowed_field_is_a_config_error() {
        let mut cfg = builtin_config().unwrap();
        listing(&mut cfg).allowed_fields.push("password".into());
        assert!(matches!(resolve(&cfg), Err(ConfigError::InvalidAllowedField { .. })));
    }

    #[test]
    fn unknown_relation_is_a_config_error() {
        let mut cfg = builtin_config().unwrap();
        listing(&mut cfg).allowed_fields.push("warehouse__name".into());
        assert!(matches!(resolve(&cfg), Err(ConfigError::InvalidAllowedField { .. })));
    }

    #[test]
    fn two_hop_paths_are_rejected() {
        let mut cfg = builtin_config().unwrap();
        listing(&mut cfg).allowed_fields.push("sprocket__factory__name".into());
        assert!(matches!(resolve(&cfg), Err(ConfigError::InvalidAllowedField { .. })));
    }

    #[test]
    fn listing_cannot_shadow_entity_route() {
        let mut cfg = builtin_config().unwrap();
        listing(&mut cfg).path = "/sprocket/create".into();
        assert!(matches!(resolve(&cfg), Err(ConfigError::Duplicate { kind: "route", .. })));
    }

    #[test]
    fn relation_must_target_known_entity() {
        let mut cfg = builtin_config().unwrap();
        cfg.entities[2].relations[0].entity = "gear".into();
        assert!(matches!(resolve(&cfg), Err(ConfigError::MissingReference { kind: "entity", .. })));
    }

    #[test]
    fn soft_delete_column_must_be_boolean() {
        let mut cfg = builtin_config().unwrap();
        cfg.entities[0].soft_delete_column = Some("name".into());
        assert!(matches!(resolve(&cfg), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn page_size_bounds_checked() {
        let mut cfg = builtin_config().unwrap();
        listing(&mut cfg).default_page_size = 0;
        assert!(resolve(&cfg).is_err());
        let mut cfg = builtin_config().unwrap();
        listing(&mut cfg).max_page_size = 5;
        assert!(resolve(&cfg).is_err());
    }
}
