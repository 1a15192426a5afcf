//! Entity handlers: listing, read, create, update, delete, plus the JSON 404/405 fallbacks.
//! Each route carries the id of its entity or listing as a request extension.

use crate::config::{ColumnType, ResolvedEntity, ResolvedListing};
use crate::error::AppError;
use crate::query::ListParams;
use crate::response::{success_one, success_page};
use crate::service::CrudService;
use crate::state::AppState;
use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{Method, Uri},
    response::IntoResponse,
    Extension, Json,
};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Entity id attached to the routes generated for that entity.
#[derive(Clone, Debug)]
pub struct EntityRoute(pub String);

/// Listing id attached to the listing's route.
#[derive(Clone, Debug)]
pub struct ListingRoute(pub String);

fn entity<'a>(state: &'a AppState, route: &EntityRoute) -> Result<&'a ResolvedEntity, AppError> {
    state
        .model
        .entity(&route.0)
        .ok_or_else(|| AppError::NotFound(route.0.clone()))
}

fn listing<'a>(state: &'a AppState, route: &ListingRoute) -> Result<&'a ResolvedListing, AppError> {
    state
        .model
        .listing(&route.0)
        .ok_or_else(|| AppError::NotFound(route.0.clone()))
}

fn parse_id(id_str: &str, pk_type: ColumnType) -> Result<Value, AppError> {
    Ok(match pk_type {
        ColumnType::Integer => {
            let n: i64 = id_str.parse().map_err(|_| AppError::BadRequest("invalid id".into()))?;
            Value::from(n)
        }
        _ => Value::String(id_str.to_string()),
    })
}

fn body_to_map(body: Result<Json<Value>, JsonRejection>) -> Result<Map<String, Value>, AppError> {
    let Json(value) = body.map_err(|e| AppError::BadRequest(e.body_text()))?;
    match value {
        Value::Object(m) => Ok(m),
        _ => Err(AppError::BadRequest("body must be a JSON object".into())),
    }
}

pub async fn list(
    State(state): State<AppState>,
    Extension(route): Extension<ListingRoute>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<impl IntoResponse, AppError> {
    let listing = listing(&state, &route)?;
    let params = ListParams::from_query(&params);
    let page = CrudService::list(state.store.as_ref(), listing, &params).await?;
    Ok(success_page(page, params.filter, params.order))
}

pub async fn read(
    State(state): State<AppState>,
    Extension(route): Extension<EntityRoute>,
    Path(id_str): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let entity = entity(&state, &route)?;
    let id = parse_id(&id_str, entity.pk_type)?;
    let row = CrudService::read(state.store.as_ref(), entity, &id).await?;
    Ok(success_one(row))
}

pub async fn create(
    State(state): State<AppState>,
    Extension(route): Extension<EntityRoute>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let entity = entity(&state, &route)?;
    let body = body_to_map(body)?;
    let row = CrudService::create(state.store.as_ref(), entity, &body).await?;
    Ok(success_one(row))
}

pub async fn update(
    State(state): State<AppState>,
    Extension(route): Extension<EntityRoute>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let entity = entity(&state, &route)?;
    let body = body_to_map(body)?;
    let row = CrudService::update(state.store.as_ref(), entity, &body).await?;
    Ok(success_one(row))
}

pub async fn delete(
    State(state): State<AppState>,
    Extension(route): Extension<EntityRoute>,
    Path(id_str): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let entity = entity(&state, &route)?;
    let id = parse_id(&id_str, entity.pk_type)?;
    let row = CrudService::delete(state.store.as_ref(), entity, &id).await?;
    Ok(success_one(row))
}

pub async fn method_not_allowed(method: Method, uri: Uri) -> AppError {
    AppError::MethodNotAllowed(format!("{} {}", method, uri.path()))
}

pub async fn not_found(uri: Uri) -> AppError {
    AppError::NotFound(uri.path().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ids_follow_the_key_type() {
        assert_eq!(parse_id("12", ColumnType::Integer).unwrap(), json!(12));
        assert!(matches!(parse_id("abc", ColumnType::Integer), Err(AppError::BadRequest(_))));
        assert_eq!(parse_id("abc", ColumnType::Text).unwrap(), json!("abc"));
    }
}
