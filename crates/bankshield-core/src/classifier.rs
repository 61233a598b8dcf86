//! Token-classification collaborator trait

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One labeled span as reported by a token classifier
///
/// Classifier output is loosely typed: fields may be missing, null, or carry
/// the wrong JSON type. Every field is therefore optional raw JSON; the ML
/// adapter owns the single coercion path.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawPrediction {
    /// Aggregated label (`EMAIL`, `TELEPHONENUM`, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_group: Option<serde_json::Value>,

    /// Per-token label, used when no aggregated label is present (`B-EMAIL`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity: Option<serde_json::Value>,

    /// Confidence; expected to be a number
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<serde_json::Value>,

    /// Surface form produced by the tokenizer (never trusted)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub word: Option<serde_json::Value>,

    /// Start character offset into the classified text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<serde_json::Value>,

    /// End character offset into the classified text (exclusive)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<serde_json::Value>,
}

/// Failure of a whole classifier call
///
/// These are recoverable: the pipeline continues with pattern-based candidates.
#[derive(Debug, Error)]
pub enum ClassifierError {
    /// Classifier is not loaded or not configured
    #[error("Classifier unavailable: {0}")]
    Unavailable(String),

    /// Network or connection failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// Classifier answered with a non-success status
    #[error("Classifier returned status {status_code}: {message}")]
    Status { status_code: u16, message: String },

    /// Response body could not be decoded into predictions
    #[error("Failed to decode classifier response: {0}")]
    Decode(String),

    /// Call exceeded its deadline
    #[error("Classifier timed out after {0}s")]
    Timeout(u64),
}

/// An external token-classification capability
///
/// Given text, returns labeled spans with confidence scores and (ideally)
/// character offsets into that text.
#[async_trait::async_trait]
pub trait TokenClassifier: Send + Sync {
    /// Classify the given text
    async fn classify(&self, text: &str) -> Result<Vec<RawPrediction>, ClassifierError>;

    /// Human-readable classifier name (used in logs and health output)
    fn name(&self) -> &str;
}
