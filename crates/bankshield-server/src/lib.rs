//! BankShield server
//!
//! HTTP boundary of the detection pipeline: configuration, application state
//! and the axum routers.

pub mod app;
pub mod config;
pub mod routes;

use app::AppState;
use axum::Router;
use bankshield_observability::{HealthState, health_router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Detection API plus `/healthz`, `/readyz` and `/metrics`
pub fn build_router(state: AppState) -> Router {
    let health_state =
        HealthState::with_readiness_checker(state.metrics().clone(), Arc::new(state.clone()));

    routes::api_router(state)
        .merge(health_router(health_state))
        .layer(TraceLayer::new_for_http())
}
