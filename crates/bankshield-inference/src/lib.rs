//! BankShield Inference Connectors
//!
//! This crate provides the HTTP token-classification collaborator:
//! - Shared HTTP client construction and retry policy
//! - `HttpTokenClassifier`, a `TokenClassifier` backed by an inference endpoint

pub mod client;
pub mod http_classifier;

pub use client::{HttpClientConfig, create_client, with_retry};
pub use http_classifier::{HttpClassifierConfig, HttpTokenClassifier};

use bankshield_core::ClassifierError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Classifier returned status {status_code}: {message}")]
    ProviderError { status_code: u16, message: String },

    #[error("Failed to parse classifier response: {0}")]
    ParseError(String),

    #[error("Request timeout after {0}s")]
    Timeout(u64),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),
}

pub type Result<T> = std::result::Result<T, InferenceError>;

impl From<InferenceError> for ClassifierError {
    fn from(err: InferenceError) -> Self {
        match err {
            InferenceError::HttpError(e) => ClassifierError::Transport(e.to_string()),
            InferenceError::ProviderError {
                status_code,
                message,
            } => ClassifierError::Status {
                status_code,
                message,
            },
            InferenceError::ParseError(message) => ClassifierError::Decode(message),
            InferenceError::Timeout(secs) => ClassifierError::Timeout(secs),
            InferenceError::ConfigError(message) => ClassifierError::Unavailable(message),
        }
    }
}
