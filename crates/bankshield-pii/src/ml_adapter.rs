//! Adapter from token-classifier output to candidate entities
//!
//! Classifier predictions are loosely typed. Every prediction goes through
//! [`MlAdapter::normalize_prediction`], the single coercion path:
//! - label: `entity_group`, then `entity` (without a `B-`/`I-` tag), then
//!   `UNKNOWN`; a label that is not a non-empty string counts as absent
//! - score: number or numeric string, anything else counts as 0.0; clamped to `[0, 1]`
//! - offsets: absent means 0; integers, integral floats and integer strings are
//!   accepted; any other value rejects the prediction
//!
//! Offsets reported by the classifier are character offsets. They are clamped to
//! the text and mapped to byte offsets, and the entity text is always sliced from
//! the original input; the classifier's `word` field is never used.

use bankshield_core::{
    CandidateEntity, ClassifierError, DetectionMethod, RawPrediction, TokenClassifier,
};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Label used when a prediction carries none
pub const UNKNOWN_LABEL: &str = "UNKNOWN";

/// Why a single prediction was dropped
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PredictionRejected {
    #[error("offset `{field}` is not a non-negative integer: {value}")]
    InvalidOffset { field: &'static str, value: String },

    #[error("empty span {start}..{end}")]
    EmptySpan { start: usize, end: usize },
}

/// Wraps a [`TokenClassifier`] and normalizes its output
#[derive(Clone)]
pub struct MlAdapter {
    classifier: Arc<dyn TokenClassifier>,
}

impl MlAdapter {
    pub fn new(classifier: Arc<dyn TokenClassifier>) -> Self {
        Self { classifier }
    }

    /// Name of the wrapped classifier
    pub fn name(&self) -> &str {
        self.classifier.name()
    }

    /// Classify `text`, degrading to no candidates when the classifier fails
    pub async fn classify(&self, text: &str) -> Vec<CandidateEntity> {
        match self.try_classify(text).await {
            Ok(entities) => entities,
            Err(e) => {
                warn!(classifier = self.name(), "ML inference failed: {}", e);
                Vec::new()
            }
        }
    }

    /// Classify `text`, surfacing a failure of the classifier call itself
    ///
    /// Per-prediction problems never fail the call; those predictions are dropped.
    pub async fn try_classify(&self, text: &str) -> Result<Vec<CandidateEntity>, ClassifierError> {
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }

        let predictions = self.classifier.classify(text).await?;
        Ok(Self::normalize(text, &predictions))
    }

    /// Normalize a batch of predictions, dropping the ones that cannot be coerced
    pub fn normalize(text: &str, predictions: &[RawPrediction]) -> Vec<CandidateEntity> {
        predictions
            .iter()
            .filter_map(|prediction| match Self::normalize_prediction(text, prediction) {
                Ok(entity) => Some(entity),
                Err(reason) => {
                    debug!("Dropping ML prediction: {}", reason);
                    None
                }
            })
            .collect()
    }

    /// Normalize one prediction against the original text
    pub fn normalize_prediction(
        text: &str,
        prediction: &RawPrediction,
    ) -> Result<CandidateEntity, PredictionRejected> {
        let start = coerce_offset("start", prediction.start.as_ref())?;
        let end = coerce_offset("end", prediction.end.as_ref())?;

        let start = char_to_byte(text, start);
        let end = char_to_byte(text, end);
        if start >= end {
            return Err(PredictionRejected::EmptySpan { start, end });
        }

        Ok(CandidateEntity::from_span(
            label_of(prediction),
            text,
            start,
            end,
            coerce_score(prediction.score.as_ref()),
            DetectionMethod::Ml,
        ))
    }
}

fn label_text(value: Option<&Value>) -> Option<&str> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|label| !label.is_empty())
}

fn label_of(prediction: &RawPrediction) -> String {
    if let Some(group) = label_text(prediction.entity_group.as_ref()) {
        return group.to_string();
    }

    if let Some(entity) = label_text(prediction.entity.as_ref()) {
        let stripped = entity
            .strip_prefix("B-")
            .or_else(|| entity.strip_prefix("I-"))
            .unwrap_or(entity);
        if !stripped.is_empty() {
            return stripped.to_string();
        }
    }

    UNKNOWN_LABEL.to_string()
}

fn coerce_score(value: Option<&Value>) -> f32 {
    let score = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };

    match score {
        Some(s) if s.is_finite() => s.clamp(0.0, 1.0) as f32,
        _ => 0.0,
    }
}

fn coerce_offset(field: &'static str, value: Option<&Value>) -> Result<usize, PredictionRejected> {
    let rejected = |value: &Value| PredictionRejected::InvalidOffset {
        field,
        value: value.to_string(),
    };

    match value {
        None | Some(Value::Null) => Ok(0),
        Some(v @ Value::Number(n)) => {
            if let Some(u) = n.as_u64() {
                usize::try_from(u).map_err(|_| rejected(v))
            } else {
                match n.as_f64() {
                    Some(f) if f.is_finite() && f >= 0.0 && f.fract() == 0.0 => Ok(f as usize),
                    _ => Err(rejected(v)),
                }
            }
        }
        Some(v @ Value::String(s)) => s.trim().parse::<usize>().map_err(|_| rejected(v)),
        Some(v) => Err(rejected(v)),
    }
}

/// Byte offset of the `chars`-th character, clamped to the end of `text`
fn char_to_byte(text: &str, chars: usize) -> usize {
    text.char_indices()
        .nth(chars)
        .map(|(i, _)| i)
        .unwrap_or(text.len())
}
