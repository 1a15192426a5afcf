//! Router assembly.

mod common;
mod entity;

pub use common::common_routes;
pub use entity::entity_routes;

use crate::config::Settings;
use crate::handlers::not_found;
use crate::state::AppState;
use axum::Router;
use tower::ServiceBuilder;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};

/// Full application: common routes, model routes, JSON 404 fallback, tracing and body limit.
pub fn app(state: AppState, settings: &Settings) -> Router {
    common_routes()
        .merge(entity_routes(&state.model))
        .fallback(not_found)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(RequestBodyLimitLayer::new(settings.max_body_bytes)),
        )
        .with_state(state)
}
