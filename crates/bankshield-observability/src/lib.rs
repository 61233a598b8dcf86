//! BankShield Observability
//!
//! Prometheus metrics for detection traffic and the health endpoints
//! (`/healthz`, `/readyz`, `/metrics`).

pub mod health;
pub mod metrics;

pub use health::{
    ComponentStatus, HealthResponse, HealthState, ReadinessChecker, ReadinessResponse,
    health_router,
};
pub use metrics::Metrics;
