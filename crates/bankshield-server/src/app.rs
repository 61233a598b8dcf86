//! Application state shared by the HTTP handlers
//!
//! The detection pipeline is built once at startup. When the schema can't be
//! loaded the server still starts; the state then carries the load error and
//! the detection endpoints answer 503.

use crate::config::ServerConfig;
use bankshield_core::Result;
use bankshield_inference::HttpTokenClassifier;
use bankshield_observability::{ComponentStatus, Metrics, ReadinessChecker};
use bankshield_pii::{DetectionContext, SchemaStore};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Load the schema and wire the configured classifiers into a pipeline
///
/// A classifier whose client can't be built is skipped with a warning; only a
/// schema failure is fatal.
pub fn build_context(config: &ServerConfig) -> Result<DetectionContext> {
    let schema = SchemaStore::load(&config.schema_path)?;
    let mut context = DetectionContext::new(
        Arc::new(schema),
        config.detection.clone(),
        config.validation.clone(),
    );

    for classifier_config in config.enabled_classifiers() {
        match HttpTokenClassifier::new(classifier_config.clone()) {
            Ok(classifier) => {
                info!(
                    "Token classifier `{}` at {}",
                    classifier_config.name, classifier_config.endpoint
                );
                context = context.with_classifier(Arc::new(classifier));
            }
            Err(e) => warn!(
                "Skipping token classifier `{}`: {}",
                classifier_config.name, e
            ),
        }
    }

    Ok(context)
}

#[derive(Clone)]
pub struct AppState {
    context: Option<Arc<DetectionContext>>,
    load_error: Option<String>,
    metrics: Arc<Metrics>,
}

impl AppState {
    /// State serving the given pipeline
    pub fn new(context: Arc<DetectionContext>, metrics: Arc<Metrics>) -> Self {
        let schema = context.schema();
        metrics.set_schema_categories(
            schema.usable_categories().count(),
            schema.unusable_categories().count(),
        );

        Self {
            context: Some(context),
            load_error: None,
            metrics,
        }
    }

    /// State without a pipeline; detection requests are refused
    pub fn unavailable(reason: impl Into<String>, metrics: Arc<Metrics>) -> Self {
        Self {
            context: None,
            load_error: Some(reason.into()),
            metrics,
        }
    }

    /// Build the pipeline from configuration, degrading to [`AppState::unavailable`]
    pub fn from_config(config: &ServerConfig, metrics: Arc<Metrics>) -> Self {
        match build_context(config) {
            Ok(context) => {
                info!(
                    "Loaded schema {} ({} categories)",
                    config.schema_path.display(),
                    context.schema().len()
                );
                Self::new(Arc::new(context), metrics)
            }
            Err(e) => {
                error!(
                    "Failed to load schema {}: {}",
                    config.schema_path.display(),
                    e
                );
                Self::unavailable(e.to_string(), metrics)
            }
        }
    }

    pub fn context(&self) -> Option<&Arc<DetectionContext>> {
        self.context.as_ref()
    }

    pub fn load_error(&self) -> Option<&str> {
        self.load_error.as_deref()
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }
}

impl ReadinessChecker for AppState {
    fn is_ready(&self) -> bool {
        self.context.is_some()
    }

    fn component_statuses(&self) -> Vec<ComponentStatus> {
        let Some(context) = &self.context else {
            let mut schema = ComponentStatus::new("schema", "unavailable");
            if let Some(reason) = &self.load_error {
                schema = schema.with_detail(reason.clone());
            }
            return vec![schema];
        };

        let unusable = context.schema().unusable_categories().count();
        let schema = if unusable == 0 {
            ComponentStatus::new("schema", "ok")
        } else {
            ComponentStatus::new("schema", "degraded")
                .with_detail(format!("{} unusable categories", unusable))
        };

        std::iter::once(schema)
            .chain(
                context
                    .classifier_names()
                    .into_iter()
                    .map(|name| ComponentStatus::new(name, "configured")),
            )
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn schema_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(".json")
            .tempfile()
            .unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    fn config_for(path: &std::path::Path) -> ServerConfig {
        ServerConfig {
            schema_path: path.to_path_buf(),
            ..ServerConfig::default()
        }
    }

    #[test]
    fn test_from_config_loaded() {
        let file = schema_file(r#"{"PAN": {"regex": "^[A-Z]{5}\\d{4}[A-Z]$"}}"#);
        let state = AppState::from_config(
            &config_for(file.path()),
            Arc::new(Metrics::new().unwrap()),
        );

        assert!(state.is_ready());
        assert!(state.load_error().is_none());
        assert_eq!(
            state.component_statuses(),
            vec![ComponentStatus::new("schema", "ok")]
        );
    }

    #[test]
    fn test_from_config_missing_schema() {
        let config = config_for(std::path::Path::new("/nonexistent/data_schema.json"));
        let state = AppState::from_config(&config, Arc::new(Metrics::new().unwrap()));

        assert!(!state.is_ready());
        assert!(state.context().is_none());
        assert!(state.load_error().is_some());
        assert_eq!(state.component_statuses()[0].status, "unavailable");
    }

    #[test]
    fn test_degraded_schema_and_classifiers() {
        let file = schema_file(
            r#"{"PAN": {"regex": "^[A-Z]{5}\\d{4}[A-Z]$"}, "BROKEN": {"regex": "(["}}"#,
        );
        let mut config = config_for(file.path());
        config.classifiers = vec![
            bankshield_inference::HttpClassifierConfig::new("bert", "http://localhost:8081"),
            bankshield_inference::HttpClassifierConfig::new("no-endpoint", ""),
        ];

        let state = AppState::from_config(&config, Arc::new(Metrics::new().unwrap()));
        let statuses = state.component_statuses();

        assert!(state.is_ready());
        assert_eq!(statuses[0].status, "degraded");
        assert_eq!(statuses[0].detail.as_deref(), Some("1 unusable categories"));
        // The classifier without an endpoint is skipped
        assert_eq!(statuses.len(), 2);
        assert_eq!(statuses[1], ComponentStatus::new("bert", "configured"));
    }
}
