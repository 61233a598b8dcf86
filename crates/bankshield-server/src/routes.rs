//! Detection API
//!
//! - `POST /api/validated/detect`
//! - `POST /api/validated/anonymize`
//! - `GET /api/data_schema`
//! - `GET /api/health`

use crate::app::AppState;
use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use bankshield_observability::Metrics;
use bankshield_pii::{AnonymizeRequest, AnonymizeResult, DetectionRequest, DetectionResult};
use serde::Serialize;
use serde_json::{Map, Value, json};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info};

/// Model identifier reported by the detection endpoints
pub const MODEL_NAME: &str = "validated_enhanced_multi_method";

const DETECT_ENDPOINT: &str = "detect";
const ANONYMIZE_ENDPOINT: &str = "anonymize";

/// API error types
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed body or out-of-range parameter
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The schema failed to load at startup
    #[error("Validated PII Detector not loaded")]
    DetectorUnavailable,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type) = match &self {
            ApiError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "invalid_request_error"),
            ApiError::DetectorUnavailable => {
                (StatusCode::SERVICE_UNAVAILABLE, "service_unavailable")
            }
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        };

        let body = json!({
            "error": {
                "message": self.to_string(),
                "type": error_type,
                "code": status.as_u16(),
            }
        });

        (status, Json(body)).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::InvalidRequest(rejection.body_text())
    }
}

impl From<bankshield_core::Error> for ApiError {
    fn from(err: bankshield_core::Error) -> Self {
        match err {
            bankshield_core::Error::InvalidRequest(msg) => ApiError::InvalidRequest(msg),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

/// A pipeline result tagged with the model identifier
#[derive(Debug, Serialize)]
pub struct ModelResponse<T> {
    pub model: &'static str,
    #[serde(flatten)]
    pub body: T,
}

impl<T> ModelResponse<T> {
    pub fn new(body: T) -> Self {
        Self {
            model: MODEL_NAME,
            body,
        }
    }
}

/// Create the detection API router
pub fn api_router(state: AppState) -> Router {
    Router::new()
        .route("/api/validated/detect", post(detect))
        .route("/api/validated/anonymize", post(anonymize))
        .route("/api/data_schema", get(data_schema))
        .route("/api/health", get(api_health))
        .with_state(state)
}

async fn detect(
    State(state): State<AppState>,
    payload: Result<Json<DetectionRequest>, JsonRejection>,
) -> Result<Json<ModelResponse<DetectionResult>>, ApiError> {
    let metrics = state.metrics();
    let request = accept(metrics, DETECT_ENDPOINT, payload, DetectionRequest::validate)?;
    let Some(context) = state.context() else {
        metrics.record_rejected_request(DETECT_ENDPOINT, "unavailable");
        return Err(ApiError::DetectorUnavailable);
    };

    let started = Instant::now();
    let result = context.detect(&request).await;
    record_result(metrics, DETECT_ENDPOINT, &result, started.elapsed());

    Ok(Json(ModelResponse::new(result)))
}

async fn anonymize(
    State(state): State<AppState>,
    payload: Result<Json<AnonymizeRequest>, JsonRejection>,
) -> Result<Json<ModelResponse<AnonymizeResult>>, ApiError> {
    let metrics = state.metrics();
    let request = accept(metrics, ANONYMIZE_ENDPOINT, payload, AnonymizeRequest::validate)?;
    let Some(context) = state.context() else {
        metrics.record_rejected_request(ANONYMIZE_ENDPOINT, "unavailable");
        return Err(ApiError::DetectorUnavailable);
    };

    let started = Instant::now();
    let result = context.anonymize(&request).await;
    record_result(metrics, ANONYMIZE_ENDPOINT, &result.detection, started.elapsed());

    Ok(Json(ModelResponse::new(result)))
}

/// The raw schema document, `null` when it failed to load
async fn data_schema(State(state): State<AppState>) -> Json<Value> {
    let schema = state
        .context()
        .map(|context| context.schema().document().clone())
        .unwrap_or(Value::Null);

    Json(json!({ "schema": schema }))
}

async fn api_health(State(state): State<AppState>) -> Json<Value> {
    let mut models = Map::new();
    let mut schema = Map::new();

    match state.context() {
        Some(context) => {
            for name in context.classifier_names() {
                models.insert(name, Value::Bool(true));
            }
            let store = context.schema();
            schema.insert("loaded".into(), Value::Bool(true));
            schema.insert("usable".into(), json!(store.usable_categories().count()));
            schema.insert("unusable".into(), json!(store.unusable_categories().count()));
        }
        None => {
            schema.insert("loaded".into(), Value::Bool(false));
            if let Some(reason) = state.load_error() {
                schema.insert("error".into(), json!(reason));
            }
        }
    }
    models.insert(
        "validated_enhanced".into(),
        Value::Bool(state.context().is_some()),
    );

    Json(json!({
        "status": "healthy",
        "models": models,
        "schema": schema,
    }))
}

/// Unwrap and validate a request body, counting rejections
fn accept<T>(
    metrics: &Metrics,
    endpoint: &str,
    payload: Result<Json<T>, JsonRejection>,
    validate: impl Fn(&T) -> bankshield_core::Result<()>,
) -> Result<T, ApiError> {
    let checked = payload
        .map_err(ApiError::from)
        .and_then(|Json(request)| validate(&request).map(|()| request).map_err(ApiError::from));

    if let Err(e) = &checked {
        debug!(endpoint, "Rejected request: {}", e);
        metrics.record_rejected_request(endpoint, "invalid");
    }
    checked
}

fn record_result(metrics: &Metrics, endpoint: &str, result: &DetectionResult, elapsed: Duration) {
    metrics.record_detection(endpoint, elapsed.as_secs_f64());

    for entity in &result.entities {
        metrics.record_entity_accepted(&entity.category);
        if let Some(original) = &entity.original_category {
            metrics.record_correction(original, &entity.category);
        }
    }
    for entity in &result.filtered_entities {
        metrics.record_entity_filtered(&entity.category);
    }
    for classifier in &result.failed_classifiers {
        metrics.record_ml_failure(classifier);
    }

    info!(
        endpoint,
        "{} entities accepted, {} filtered in {:.1}ms",
        result.summary.total_entities,
        result.summary.filtered_entities,
        elapsed.as_secs_f64() * 1000.0
    );
}
