//! Shared fixtures for the HTTP tests: the built-in model over a seeded in-memory store.

#![allow(dead_code)]

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use chrono::{Duration, TimeZone, Utc};
use http_body_util::BodyExt;
use serde_json::{json, Map, Value};
use sprocket_api::{app, builtin_config, resolve, AppState, MemoryStore, RecordStore, ResolvedModel, Settings};
use std::sync::Arc;
use tower::ServiceExt;

pub const FACTORIES: usize = 3;
pub const PRODUCTIONS_PER_FACTORY: usize = 20;

pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
    pub model: ResolvedModel,
}

fn object(v: Value) -> Map<String, Value> {
    match v {
        Value::Object(m) => m,
        _ => panic!("fixture must be an object"),
    }
}

impl TestApp {
    /// Three factories, three sprockets and 60 productions, 20 per factory.
    /// Production `n` (1-based id) was created `n` minutes after a fixed instant, has goal `100 + n`
    /// and actual `90 + n`, and uses factory and sprocket `(n - 1) % 3 + 1`.
    pub async fn seeded() -> Self {
        let model = resolve(&builtin_config().unwrap()).unwrap();
        let store = Arc::new(MemoryStore::new());

        let factory = model.entity("factory").unwrap();
        for i in 1..=FACTORIES {
            store
                .insert(factory, &object(json!({"name": format!("Factory {}", i)})))
                .await
                .unwrap();
        }
        let sprocket = model.entity("sprocket").unwrap();
        for i in 1..=FACTORIES as i64 {
            store
                .insert(
                    sprocket,
                    &object(json!({
                        "teeth": 10 * i,
                        "pitch_diameter": 5.0 * i as f64,
                        "outside_diameter": 6.0 * i as f64,
                        "pitch": i,
                    })),
                )
                .await
                .unwrap();
        }
        let production = model.entity("sprocket_production").unwrap();
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        for n in 1..=(FACTORIES * PRODUCTIONS_PER_FACTORY) as i64 {
            let created = (base + Duration::minutes(n)).to_rfc3339();
            store
                .insert(
                    production,
                    &object(json!({
                        "sprocket_id": (n - 1) % 3 + 1,
                        "factory_id": (n - 1) % 3 + 1,
                        "sprocket_goal": 100 + n,
                        "sprocket_actual": 90 + n,
                        "date_produced": created,
                        "date_created": created,
                    })),
                )
                .await
                .unwrap();
        }

        let state = AppState::new(store.clone(), model.clone());
        TestApp {
            router: app(state, &Settings::default()),
            store,
            model,
        }
    }

    pub async fn request(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        let response = self
            .request(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await;
        read_json(response).await
    }

    pub async fn send_json(&self, method: Method, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send_raw(method, uri, body.to_string()).await
    }

    pub async fn send_raw(&self, method: Method, uri: &str, body: impl Into<String>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.into()))
            .unwrap();
        read_json(self.request(request).await).await
    }

    pub async fn delete(&self, uri: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(Method::DELETE)
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        read_json(self.request(request).await).await
    }
}

pub async fn read_json(response: Response) -> (StatusCode, Value) {
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

pub fn ids(body: &Value) -> Vec<i64> {
    body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|row| row["id"].as_i64().unwrap())
        .collect()
}
