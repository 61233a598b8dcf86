//! End-to-end integration tests for BankShield
//!
//! These tests wire the shipped schema, a mocked token-classification endpoint
//! and the server router together. Shared helpers live here; the scenarios
//! are under `tests/`.

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use bankshield_inference::HttpClassifierConfig;
use bankshield_observability::Metrics;
use bankshield_server::app::{AppState, build_context};
use bankshield_server::build_router;
use bankshield_server::config::ServerConfig;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tower::ServiceExt;

/// The schema shipped under `config/`
pub fn shipped_schema() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../config/data_schema.json")
}

/// Server configuration over the shipped schema, with one classifier per endpoint
pub fn config_with_classifiers(endpoints: &[(&str, String)]) -> ServerConfig {
    ServerConfig {
        schema_path: shipped_schema(),
        classifiers: endpoints
            .iter()
            .map(|(name, endpoint)| HttpClassifierConfig {
                max_retries: 0,
                timeout_secs: 5,
                ..HttpClassifierConfig::new(*name, endpoint.clone())
            })
            .collect(),
        ..ServerConfig::default()
    }
}

/// Router plus the metrics it records into
pub fn router_for(config: &ServerConfig) -> (Router, Arc<Metrics>) {
    let metrics = Arc::new(Metrics::new().expect("metrics"));
    let context = build_context(config).expect("shipped schema loads");
    let state = AppState::new(Arc::new(context), metrics.clone());
    (build_router(state), metrics)
}

/// POST a JSON body and decode the JSON response
pub async fn post_json(app: Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("request");
    send(app, request).await
}

/// GET and decode the JSON response
pub async fn get_json(app: Router, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("request");
    send(app, request).await
}

/// GET and return the body as text
pub async fn get_text(app: Router, uri: &str) -> (StatusCode, String) {
    let request = Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("request");
    let response = app.oneshot(request).await.expect("response");
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    (status, String::from_utf8_lossy(&body).into_owned())
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.expect("response");
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
}
