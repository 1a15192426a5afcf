//! Builds parameterized INSERT, SELECT, UPDATE and soft-delete statements from a resolved entity.

use crate::config::{ColumnDefault, IncludeSpec, ResolvedEntity};
use serde_json::{Map, Value};

/// Quote identifier for PostgreSQL (safe: only from config).
fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<Value>,
}

impl QueryBuf {
    fn new() -> Self {
        QueryBuf {
            sql: String::new(),
            params: Vec::new(),
        }
    }

    /// Push a value and return its placeholder, cast to the column type.
    fn push_param(&mut self, v: Value, pg_type: &str) -> String {
        self.params.push(v);
        format!("${}::{}", self.params.len(), pg_type)
    }
}

/// SELECT list: every configured column, qualified with `alias` when given.
fn select_column_list(entity: &ResolvedEntity, alias: Option<&str>) -> String {
    entity
        .columns
        .iter()
        .map(|c| match alias {
            Some(a) => format!("{}.{} AS {}", a, quoted(&c.name), quoted(&c.name)),
            None => quoted(&c.name),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn pk_placeholder(q: &mut QueryBuf, entity: &ResolvedEntity, id: &Value) -> String {
    q.push_param(id.clone(), entity.pk_type.pg_type())
}

/// SELECT one row by primary key.
pub fn select_by_id(entity: &ResolvedEntity, id: &Value) -> QueryBuf {
    let mut q = QueryBuf::new();
    let ph = pk_placeholder(&mut q, entity, id);
    q.sql = format!(
        "SELECT {} FROM {} WHERE {} = {}",
        select_column_list(entity, None),
        quoted(&entity.table_name),
        quoted(&entity.primary_key),
        ph
    );
    q
}

/// SELECT all rows with each to-one include as a `row_to_json` scalar subquery.
/// Filtering, ordering and paging happen in the query engine, not here.
pub fn select_list_with_includes(entity: &ResolvedEntity, includes: &[IncludeSpec]) -> QueryBuf {
    const MAIN_ALIAS: &str = "main";
    let mut q = QueryBuf::new();
    let mut select_parts = vec![select_column_list(entity, Some(MAIN_ALIAS))];
    for inc in includes {
        let subquery = format!(
            "(SELECT row_to_json(sub) FROM (SELECT {} FROM {} WHERE {} = {}.{}) sub)",
            select_column_list(&inc.related, None),
            quoted(&inc.related.table_name),
            quoted(&inc.their_key_column),
            MAIN_ALIAS,
            quoted(&inc.our_key_column)
        );
        select_parts.push(format!("{} AS {}", subquery, quoted(&inc.name)));
    }
    q.sql = format!(
        "SELECT {} FROM {} {}",
        select_parts.join(", "),
        quoted(&entity.table_name),
        MAIN_ALIAS
    );
    q
}

/// INSERT: body values bound as parameters; missing columns fall back to the configured default
/// (NOW() for timestamp expressions) or to the database when there is none.
pub fn insert(entity: &ResolvedEntity, body: &Map<String, Value>) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut cols = Vec::new();
    let mut values = Vec::new();
    for c in &entity.columns {
        let expr = match (body.get(&c.name), &c.default) {
            (Some(v), _) => q.push_param(v.clone(), c.pg_type()),
            (None, Some(ColumnDefault::Now)) => "NOW()".to_string(),
            (None, Some(ColumnDefault::Value(v))) => q.push_param(v.clone(), c.pg_type()),
            (None, None) if entity.updated_column.as_deref() == Some(c.name.as_str()) => "NOW()".to_string(),
            (None, None) => continue,
        };
        cols.push(quoted(&c.name));
        values.push(expr);
    }
    q.sql = format!(
        "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
        quoted(&entity.table_name),
        cols.join(", "),
        values.join(", "),
        select_column_list(entity, None)
    );
    q
}

/// `AND NOT deleted` guard for statements that must only touch live rows.
fn live_guard(entity: &ResolvedEntity) -> String {
    entity
        .soft_delete_column
        .as_deref()
        .map(|c| format!(" AND {} IS NOT TRUE", quoted(c)))
        .unwrap_or_default()
}

/// UPDATE a live row by id: SET only configured columns present in body, refresh the updated column.
pub fn update(entity: &ResolvedEntity, id: &Value, body: &Map<String, Value>) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut sets = Vec::new();
    for (k, v) in body {
        if *k == entity.primary_key {
            continue;
        }
        let Some(c) = entity.column(k) else { continue };
        let ph = q.push_param(v.clone(), c.pg_type());
        sets.push(format!("{} = {}", quoted(k), ph));
    }
    if let Some(updated) = &entity.updated_column {
        sets.push(format!("{} = NOW()", quoted(updated)));
    }
    let id_ph = pk_placeholder(&mut q, entity, id);
    if sets.is_empty() {
        q.sql = format!(
            "SELECT {} FROM {} WHERE {} = {}{}",
            select_column_list(entity, None),
            quoted(&entity.table_name),
            quoted(&entity.primary_key),
            id_ph,
            live_guard(entity)
        );
        return q;
    }
    q.sql = format!(
        "UPDATE {} SET {} WHERE {} = {}{} RETURNING {}",
        quoted(&entity.table_name),
        sets.join(", "),
        quoted(&entity.primary_key),
        id_ph,
        live_guard(entity),
        select_column_list(entity, None)
    );
    q
}

/// Soft delete by id (flag + updated column); plain DELETE when the entity has no soft-delete column.
pub fn mark_deleted(entity: &ResolvedEntity, id: &Value) -> QueryBuf {
    let mut q = QueryBuf::new();
    let id_ph = pk_placeholder(&mut q, entity, id);
    let table = quoted(&entity.table_name);
    let pk = quoted(&entity.primary_key);
    let returning = select_column_list(entity, None);
    q.sql = match &entity.soft_delete_column {
        Some(col) => {
            let mut sets = vec![format!("{} = TRUE", quoted(col))];
            if let Some(updated) = &entity.updated_column {
                sets.push(format!("{} = NOW()", quoted(updated)));
            }
            format!(
                "UPDATE {} SET {} WHERE {} = {}{} RETURNING {}",
                table,
                sets.join(", "),
                pk,
                id_ph,
                live_guard(entity),
                returning
            )
        }
        None => format!("DELETE FROM {} WHERE {} = {} RETURNING {}", table, pk, id_ph, returning),
    };
    q
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{builtin_config, resolve};
    use serde_json::json;

    fn body(v: Value) -> Map<String, Value> {
        v.as_object().unwrap().clone()
    }

    #[test]
    fn select_by_id_binds_id() {
        let model = resolve(&builtin_config().unwrap()).unwrap();
        let q = select_by_id(model.entity("factory").unwrap(), &json!(3));
        assert_eq!(
            q.sql,
            "SELECT \"id\", \"name\", \"deleted\", \"date_created\", \"last_updated\" FROM \"sprocket_factory\" WHERE \"id\" = $1::bigint"
        );
        assert_eq!(q.params, vec![json!(3)]);
    }

    #[test]
    fn list_embeds_includes_as_subqueries() {
        let model = resolve(&builtin_config().unwrap()).unwrap();
        let listing = model.listing("sprocket_production").unwrap();
        let q = select_list_with_includes(&listing.entity, &listing.includes);
        assert!(q.sql.starts_with("SELECT main.\"id\" AS \"id\""));
        assert!(q.sql.contains(
            "(SELECT row_to_json(sub) FROM (SELECT \"id\", \"teeth\", \"pitch_diameter\", \"outside_diameter\", \"pitch\", \"deleted\", \"date_created\", \"last_updated\" FROM \"sprocket_sprocket\" WHERE \"id\" = main.\"sprocket_id\") sub) AS \"sprocket\""
        ));
        assert!(q.sql.ends_with("FROM \"sprocket_sprocketproduction\" main"));
        assert!(q.params.is_empty());
    }

    #[test]
    fn insert_uses_defaults_for_missing_columns() {
        let model = resolve(&builtin_config().unwrap()).unwrap();
        let q = insert(model.entity("factory").unwrap(), &body(json!({"name": "Robert'); DROP TABLE x;--"})));
        assert_eq!(
            q.sql,
            "INSERT INTO \"sprocket_factory\" (\"name\", \"deleted\", \"date_created\", \"last_updated\") VALUES ($1::text, $2::boolean, NOW(), NOW()) RETURNING \"id\", \"name\", \"deleted\", \"date_created\", \"last_updated\""
        );
        assert_eq!(q.params, vec![json!("Robert'); DROP TABLE x;--"), json!(false)]);
    }

    #[test]
    fn update_only_touches_known_live_columns() {
        let model = resolve(&builtin_config().unwrap()).unwrap();
        let q = update(
            model.entity("factory").unwrap(),
            &json!(2),
            &body(json!({"id": 9, "name": "B", "bogus": 1})),
        );
        assert_eq!(
            q.sql,
            "UPDATE \"sprocket_factory\" SET \"name\" = $1::text, \"last_updated\" = NOW() WHERE \"id\" = $2::bigint AND \"deleted\" IS NOT TRUE RETURNING \"id\", \"name\", \"deleted\", \"date_created\", \"last_updated\""
        );
        assert_eq!(q.params, vec![json!("B"), json!(2)]);
    }

    #[test]
    fn mark_deleted_sets_flag() {
        let model = resolve(&builtin_config().unwrap()).unwrap();
        let q = mark_deleted(model.entity("sprocket").unwrap(), &json!(1));
        assert!(q.sql.starts_with(
            "UPDATE \"sprocket_sprocket\" SET \"deleted\" = TRUE, \"last_updated\" = NOW() WHERE \"id\" = $1::bigint AND \"deleted\" IS NOT TRUE RETURNING"
        ));
    }
}
