//! Detection pipeline
//!
//! [`DetectionContext`] is built once at startup and never mutated; requests
//! share it through an `Arc`. A detection runs the pattern detectors and every
//! configured ML adapter, fuses the candidates, validates each fused entity
//! against the schema and partitions the result into valid and filtered
//! entities.

use crate::detector::{
    ContextualDetector, ContextualPattern, NameDetector, NameDetectorConfig, PIIDetector,
    RegexDetectorConfig, RegexPiiDetector, default_contextual_patterns,
};
use crate::fusion::EntityFuser;
use crate::ml_adapter::MlAdapter;
use crate::redactor::{Anonymizer, DEFAULT_REPLACEMENT};
use crate::schema::SchemaStore;
use crate::validator::{CrossValidationPolicy, SchemaValidator, Verdict};
use bankshield_core::{
    CandidateEntity, DetectionMethod, Error, Provenance, Result, TokenClassifier,
};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

fn default_min_confidence() -> f32 {
    0.5
}

fn default_replacement() -> String {
    DEFAULT_REPLACEMENT.to_string()
}

fn default_true() -> bool {
    true
}

/// Pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Threshold used when a detect request does not carry one
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f32,

    /// Threshold used by anonymize requests that do not carry one
    #[serde(default = "default_min_confidence")]
    pub anonymize_min_confidence: f32,

    /// Token written over each accepted entity
    #[serde(default = "default_replacement")]
    pub replacement: String,

    /// Enhanced regex detector table
    #[serde(default)]
    pub regex: RegexDetectorConfig,

    /// Contextual detector cue table
    #[serde(default = "default_contextual_patterns")]
    pub contextual_patterns: Vec<ContextualPattern>,

    /// Name heuristics
    #[serde(default)]
    pub names: NameDetectorConfig,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            min_confidence: default_min_confidence(),
            anonymize_min_confidence: default_min_confidence(),
            replacement: default_replacement(),
            regex: RegexDetectorConfig::default(),
            contextual_patterns: default_contextual_patterns(),
            names: NameDetectorConfig::default(),
        }
    }
}

/// A detect request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionRequest {
    pub text: String,

    #[serde(default = "default_true")]
    pub use_regex: bool,

    #[serde(default = "default_true")]
    pub use_contextual: bool,

    #[serde(default = "default_true")]
    pub use_names: bool,

    #[serde(default = "default_true")]
    pub use_ml: bool,

    /// Minimum score for an entity to be accepted; the context default when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_confidence: Option<f32>,
}

impl DetectionRequest {
    /// Request running every detector family with the default threshold
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            use_regex: true,
            use_contextual: true,
            use_names: true,
            use_ml: true,
            min_confidence: None,
        }
    }

    /// Reject thresholds outside `[0, 1]`
    pub fn validate(&self) -> Result<()> {
        check_threshold(self.min_confidence)
    }
}

/// An anonymize request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnonymizeRequest {
    pub text: String,

    /// Replacement token; the context default when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replacement: Option<String>,

    /// Minimum score for an entity to be redacted; the context default when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_confidence: Option<f32>,
}

impl AnonymizeRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            replacement: None,
            min_confidence: None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        check_threshold(self.min_confidence)
    }
}

fn check_threshold(threshold: Option<f32>) -> Result<()> {
    match threshold {
        Some(t) if !(0.0..=1.0).contains(&t) => Err(Error::InvalidRequest(format!(
            "min_confidence must be between 0 and 1, got {}",
            t
        ))),
        _ => Ok(()),
    }
}

/// Whether an entity was accepted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityStatus {
    Valid,
    Filtered,
}

/// An accepted entity, category possibly corrected by cross-validation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidEntity {
    pub category: String,
    pub text: String,
    pub start: usize,
    pub end: usize,
    pub score: f32,
    pub method: Provenance,

    /// Detector-assigned category when cross-validation replaced it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_category: Option<String>,

    pub validation: Verdict,
    pub status: EntityStatus,
}

impl ValidEntity {
    /// The entity as a plain span, for redaction
    pub fn to_candidate(&self) -> CandidateEntity {
        CandidateEntity {
            category: self.category.clone(),
            text: self.text.clone(),
            start: self.start,
            end: self.end,
            score: self.score,
            method: self.method.clone(),
        }
    }
}

/// A rejected entity with its detector-assigned category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilteredEntity {
    pub category: String,
    pub text: String,
    pub start: usize,
    pub end: usize,
    pub score: f32,
    pub method: Provenance,
    pub validation: Verdict,
    pub status: EntityStatus,
    pub filter_reason: String,
}

/// Aggregate figures for one detection
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectionSummary {
    pub total_entities: usize,
    pub filtered_entities: usize,

    /// Distinct accepted categories, sorted
    pub categories_found: Vec<String>,

    /// Detector families that produced at least one candidate
    pub methods_used: Vec<DetectionMethod>,

    /// Mean score of the accepted entities, 0 when there are none
    pub avg_confidence: f32,

    /// accepted / (accepted + filtered), 0 when nothing was detected
    pub validation_rate: f32,
}

impl DetectionSummary {
    fn build(
        entities: &[ValidEntity],
        filtered: &[FilteredEntity],
        methods_used: Vec<DetectionMethod>,
    ) -> Self {
        let mut categories_found: Vec<String> =
            entities.iter().map(|e| e.category.clone()).collect();
        categories_found.sort();
        categories_found.dedup();

        let avg_confidence = if entities.is_empty() {
            0.0
        } else {
            entities.iter().map(|e| e.score).sum::<f32>() / entities.len() as f32
        };

        let seen = entities.len() + filtered.len();
        let validation_rate = if seen == 0 {
            0.0
        } else {
            entities.len() as f32 / seen as f32
        };

        Self {
            total_entities: entities.len(),
            filtered_entities: filtered.len(),
            categories_found,
            methods_used,
            avg_confidence,
            validation_rate,
        }
    }
}

/// Outcome of a detect request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    pub entities: Vec<ValidEntity>,
    pub filtered_entities: Vec<FilteredEntity>,
    pub summary: DetectionSummary,

    /// Classifiers whose call failed, in run order
    #[serde(skip)]
    pub failed_classifiers: Vec<String>,
}

/// Outcome of an anonymize request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnonymizeResult {
    #[serde(flatten)]
    pub detection: DetectionResult,
    pub redacted: String,
}

/// Immutable, shareable detection pipeline
pub struct DetectionContext {
    schema: Arc<SchemaStore>,
    regex: RegexPiiDetector,
    contextual: ContextualDetector,
    names: NameDetector,
    adapters: Vec<MlAdapter>,
    fuser: EntityFuser,
    validator: SchemaValidator,
    config: DetectionConfig,
}

impl DetectionContext {
    pub fn new(
        schema: Arc<SchemaStore>,
        config: DetectionConfig,
        policy: CrossValidationPolicy,
    ) -> Self {
        Self {
            regex: RegexPiiDetector::new(config.regex.clone()),
            contextual: ContextualDetector::new(&config.contextual_patterns),
            names: NameDetector::new(config.names.clone()),
            adapters: Vec::new(),
            fuser: EntityFuser::new(),
            validator: SchemaValidator::new(schema.clone(), policy),
            schema,
            config,
        }
    }

    /// Add a token classifier; classifiers run in the order they were added
    pub fn with_classifier(mut self, classifier: Arc<dyn TokenClassifier>) -> Self {
        self.adapters.push(MlAdapter::new(classifier));
        self
    }

    pub fn schema(&self) -> &SchemaStore {
        &self.schema
    }

    /// Names of the configured classifiers, in run order
    pub fn classifier_names(&self) -> Vec<String> {
        self.adapters.iter().map(|a| a.name().to_string()).collect()
    }

    /// Run the enabled detectors, fuse, validate and partition
    pub async fn detect(&self, request: &DetectionRequest) -> DetectionResult {
        let text = request.text.as_str();
        if text.trim().is_empty() {
            return DetectionResult::default();
        }

        let min_confidence = request.min_confidence.unwrap_or(self.config.min_confidence);
        let mut candidates = Vec::new();
        let mut methods_used = Vec::new();

        let pattern_detectors: [(&dyn PIIDetector, bool); 3] = [
            (&self.regex, request.use_regex),
            (&self.contextual, request.use_contextual),
            (&self.names, request.use_names),
        ];
        for (detector, enabled) in pattern_detectors {
            if !enabled {
                continue;
            }
            let found = detector.detect(text);
            if !found.is_empty() {
                methods_used.push(detector.method());
            }
            candidates.extend(found);
        }

        let mut failed_classifiers = Vec::new();
        if request.use_ml && !self.adapters.is_empty() {
            let outcomes = join_all(self.adapters.iter().map(|a| a.try_classify(text))).await;

            let mut ml_found = false;
            for (adapter, outcome) in self.adapters.iter().zip(outcomes) {
                match outcome {
                    Ok(found) => {
                        ml_found |= !found.is_empty();
                        candidates.extend(found);
                    }
                    Err(e) => {
                        warn!(classifier = adapter.name(), "ML inference failed: {}", e);
                        failed_classifiers.push(adapter.name().to_string());
                    }
                }
            }
            if ml_found {
                methods_used.push(DetectionMethod::Ml);
            }
        }

        let fused = self.fuser.fuse(text, &candidates);
        debug!(
            "{} candidates fused into {} entities",
            candidates.len(),
            fused.len()
        );

        let mut entities = Vec::new();
        let mut filtered_entities = Vec::new();
        for entity in fused {
            let verdict = self
                .validator
                .validate(&entity.category, &entity.text, entity.score);

            if verdict.valid && entity.score >= min_confidence {
                entities.push(ValidEntity {
                    category: verdict
                        .corrected_category
                        .clone()
                        .unwrap_or_else(|| entity.category.clone()),
                    original_category: verdict.original_category.clone(),
                    text: entity.text,
                    start: entity.start,
                    end: entity.end,
                    score: entity.score,
                    method: entity.method,
                    validation: verdict,
                    status: EntityStatus::Valid,
                });
            } else {
                let filter_reason = if verdict.valid {
                    format!(
                        "Confidence {:.2} below threshold {:.2}",
                        entity.score, min_confidence
                    )
                } else {
                    verdict.reason.clone()
                };
                debug!(
                    category = %entity.category,
                    "Filtered {}..{}: {}",
                    entity.start,
                    entity.end,
                    filter_reason
                );
                filtered_entities.push(FilteredEntity {
                    category: entity.category,
                    text: entity.text,
                    start: entity.start,
                    end: entity.end,
                    score: entity.score,
                    method: entity.method,
                    validation: verdict,
                    status: EntityStatus::Filtered,
                    filter_reason,
                });
            }
        }

        let summary = DetectionSummary::build(&entities, &filtered_entities, methods_used);
        DetectionResult {
            entities,
            filtered_entities,
            summary,
            failed_classifiers,
        }
    }

    /// Detect with every family enabled and redact the accepted entities
    pub async fn anonymize(&self, request: &AnonymizeRequest) -> AnonymizeResult {
        let detect_request = DetectionRequest {
            min_confidence: Some(
                request
                    .min_confidence
                    .unwrap_or(self.config.anonymize_min_confidence),
            ),
            ..DetectionRequest::new(request.text.clone())
        };
        let detection = self.detect(&detect_request).await;

        let replacement = request
            .replacement
            .as_deref()
            .unwrap_or(&self.config.replacement);
        let spans: Vec<CandidateEntity> =
            detection.entities.iter().map(ValidEntity::to_candidate).collect();
        let redacted = Anonymizer::anonymize(&request.text, &spans, replacement);

        AnonymizeResult {
            detection,
            redacted,
        }
    }
}
