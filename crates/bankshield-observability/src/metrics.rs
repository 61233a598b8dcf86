//! Metrics collection with Prometheus
//!
//! - Request counts by endpoint and outcome
//! - Detection latency histogram
//! - Accepted / filtered entity counts by category
//! - Cross-validation corrections
//! - ML classifier failures
//! - Schema partition gauges

use prometheus::{
    CounterVec, GaugeVec, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry,
};
use std::sync::Arc;

/// Metrics collector for BankShield
#[derive(Clone)]
pub struct Metrics {
    registry: Arc<Registry>,

    /// Requests received, by endpoint and outcome (`ok`, `invalid`, `unavailable`)
    pub requests_total: CounterVec,

    /// End-to-end detection duration, by endpoint
    pub detection_duration_seconds: HistogramVec,

    /// Entities returned as valid, by (final) category
    pub entities_accepted_total: IntCounterVec,
    /// Entities filtered out, by detector-assigned category
    pub entities_filtered_total: IntCounterVec,

    /// Categories replaced by cross-validation, by original and corrected category
    pub cross_validation_corrections_total: IntCounterVec,

    /// Failed classifier calls, by classifier name
    pub ml_failures_total: IntCounterVec,

    /// Schema categories by state (`usable`, `unusable`)
    pub schema_categories: GaugeVec,
}

impl Metrics {
    /// Create a new metrics collector
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let requests_total = CounterVec::new(
            Opts::new("bankshield_requests_total", "Total number of API requests"),
            &["endpoint", "outcome"],
        )?;

        let detection_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "bankshield_detection_duration_seconds",
                "Detection duration in seconds",
            )
            .buckets(vec![
                0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0,
            ]),
            &["endpoint"],
        )?;

        let entities_accepted_total = IntCounterVec::new(
            Opts::new(
                "bankshield_entities_accepted_total",
                "Entities accepted after validation",
            ),
            &["category"],
        )?;

        let entities_filtered_total = IntCounterVec::new(
            Opts::new(
                "bankshield_entities_filtered_total",
                "Entities rejected by validation or confidence threshold",
            ),
            &["category"],
        )?;

        let cross_validation_corrections_total = IntCounterVec::new(
            Opts::new(
                "bankshield_cross_validation_corrections_total",
                "Entities whose category was corrected by cross-validation",
            ),
            &["original", "corrected"],
        )?;

        let ml_failures_total = IntCounterVec::new(
            Opts::new(
                "bankshield_ml_failures_total",
                "Failed token classifier calls",
            ),
            &["classifier"],
        )?;

        let schema_categories = GaugeVec::new(
            Opts::new(
                "bankshield_schema_categories",
                "Schema categories by state",
            ),
            &["state"],
        )?;

        registry.register(Box::new(requests_total.clone()))?;
        registry.register(Box::new(detection_duration_seconds.clone()))?;
        registry.register(Box::new(entities_accepted_total.clone()))?;
        registry.register(Box::new(entities_filtered_total.clone()))?;
        registry.register(Box::new(cross_validation_corrections_total.clone()))?;
        registry.register(Box::new(ml_failures_total.clone()))?;
        registry.register(Box::new(schema_categories.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            requests_total,
            detection_duration_seconds,
            entities_accepted_total,
            entities_filtered_total,
            cross_validation_corrections_total,
            ml_failures_total,
            schema_categories,
        })
    }

    /// Get the Prometheus registry for exporting metrics
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Record a request that ran the pipeline
    pub fn record_detection(&self, endpoint: &str, duration_secs: f64) {
        self.requests_total
            .with_label_values(&[endpoint, "ok"])
            .inc();
        self.detection_duration_seconds
            .with_label_values(&[endpoint])
            .observe(duration_secs);
    }

    /// Record a request rejected before detection (`invalid`, `unavailable`)
    pub fn record_rejected_request(&self, endpoint: &str, outcome: &str) {
        self.requests_total
            .with_label_values(&[endpoint, outcome])
            .inc();
    }

    pub fn record_entity_accepted(&self, category: &str) {
        self.entities_accepted_total
            .with_label_values(&[category])
            .inc();
    }

    pub fn record_entity_filtered(&self, category: &str) {
        self.entities_filtered_total
            .with_label_values(&[category])
            .inc();
    }

    pub fn record_correction(&self, original: &str, corrected: &str) {
        self.cross_validation_corrections_total
            .with_label_values(&[original, corrected])
            .inc();
    }

    pub fn record_ml_failure(&self, classifier: &str) {
        self.ml_failures_total
            .with_label_values(&[classifier])
            .inc();
    }

    /// Publish the schema's usable / unusable split
    pub fn set_schema_categories(&self, usable: usize, unusable: usize) {
        self.schema_categories
            .with_label_values(&["usable"])
            .set(usable as f64);
        self.schema_categories
            .with_label_values(&["unusable"])
            .set(unusable as f64);
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new().expect("Failed to create metrics")
    }
}
