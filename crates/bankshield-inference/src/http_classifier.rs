//! Token classifier served over HTTP
//!
//! Speaks the common inference-server shape: `POST {"inputs": text}` answered
//! by a JSON array of labeled spans (`entity_group`/`entity`, `score`, `word`,
//! `start`, `end`). Batched servers wrap that array in another array; both are
//! accepted.

use crate::client::{HttpClientConfig, create_client, with_retry};
use crate::{InferenceError, Result};
use bankshield_core::{ClassifierError, RawPrediction, TokenClassifier};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, instrument};

fn default_timeout_secs() -> u64 {
    30
}

fn default_connect_timeout_secs() -> u64 {
    5
}

fn default_max_retries() -> u32 {
    1
}

fn default_enabled() -> bool {
    true
}

/// Configuration for one HTTP token classifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpClassifierConfig {
    /// Name used in logs, metrics and health output
    pub name: String,

    /// Full URL of the classification endpoint
    pub endpoint: String,

    /// Sent as a bearer token when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl HttpClassifierConfig {
    pub fn new(name: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            endpoint: endpoint.into(),
            api_key: None,
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            max_retries: default_max_retries(),
            enabled: default_enabled(),
        }
    }

    fn client_config(&self) -> HttpClientConfig {
        HttpClientConfig {
            timeout_secs: self.timeout_secs,
            connect_timeout_secs: self.connect_timeout_secs,
            max_retries: self.max_retries,
            ..HttpClientConfig::default()
        }
    }
}

/// `TokenClassifier` backed by an HTTP inference endpoint
pub struct HttpTokenClassifier {
    config: HttpClassifierConfig,
    client: Client,
}

impl HttpTokenClassifier {
    pub fn new(config: HttpClassifierConfig) -> Result<Self> {
        if config.endpoint.trim().is_empty() {
            return Err(InferenceError::ConfigError(format!(
                "classifier `{}` has no endpoint",
                config.name
            )));
        }

        let client = create_client(&config.client_config())?;
        Ok(Self { config, client })
    }

    async fn request(&self, text: &str) -> Result<Vec<RawPrediction>> {
        let mut builder = self
            .client
            .post(&self.config.endpoint)
            .json(&json!({ "inputs": text }));
        if let Some(api_key) = &self.config.api_key {
            builder = builder.bearer_auth(api_key);
        }

        let response = builder.send().await.map_err(|e| self.transport_error(e))?;
        let status = response.status();
        debug!(classifier = %self.config.name, "Status: {}", status);

        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error body".to_string());
            return Err(InferenceError::ProviderError {
                status_code: status.as_u16(),
                message,
            });
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| InferenceError::ParseError(e.to_string()))?;

        parse_predictions(body)
    }

    fn transport_error(&self, err: reqwest::Error) -> InferenceError {
        if err.is_timeout() {
            InferenceError::Timeout(self.config.timeout_secs)
        } else {
            InferenceError::HttpError(err)
        }
    }
}

#[async_trait::async_trait]
impl TokenClassifier for HttpTokenClassifier {
    #[instrument(skip(self, text), fields(classifier = %self.config.name))]
    async fn classify(
        &self,
        text: &str,
    ) -> std::result::Result<Vec<RawPrediction>, ClassifierError> {
        with_retry(self.config.max_retries, || self.request(text))
            .await
            .map_err(ClassifierError::from)
    }

    fn name(&self) -> &str {
        &self.config.name
    }
}

/// Flatten a classifier response body into predictions
///
/// Elements that are not prediction objects are skipped; an object at the top
/// level is only accepted when it carries an `entities` array.
pub fn parse_predictions(body: Value) -> Result<Vec<RawPrediction>> {
    match body {
        Value::Array(items) => {
            let mut predictions = Vec::with_capacity(items.len());
            collect_predictions(items, &mut predictions);
            Ok(predictions)
        }
        Value::Object(mut map) => match map.remove("entities") {
            Some(entities) => parse_predictions(entities),
            None => Err(InferenceError::ParseError(match map.get("error") {
                Some(error) => format!("classifier reported an error: {}", error),
                None => "expected an array of predictions".to_string(),
            })),
        },
        other => Err(InferenceError::ParseError(format!(
            "expected an array of predictions, got {}",
            other
        ))),
    }
}

fn collect_predictions(items: Vec<Value>, out: &mut Vec<RawPrediction>) {
    for item in items {
        match item {
            Value::Array(nested) => collect_predictions(nested, out),
            Value::Object(_) => match serde_json::from_value::<RawPrediction>(item) {
                Ok(prediction) => out.push(prediction),
                Err(e) => debug!("Skipping malformed prediction: {}", e),
            },
            _ => debug!("Skipping non-object prediction"),
        }
    }
}
