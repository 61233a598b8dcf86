//! BankShield PII Detection, Validation and Redaction
//!
//! This crate provides the detection-fusion and validation pipeline:
//! - Schema store of category validation patterns
//! - Regex, contextual and name detectors plus an ML adapter
//! - Overlap fusion, schema validation with cross-category correction
//! - Span-preserving anonymization

pub mod detector;
pub mod fusion;
pub mod ml_adapter;
pub mod pipeline;
pub mod redactor;
pub mod schema;
pub mod validator;

pub use detector::{
    ContextualDetector, ContextualPattern, EnhancedPattern, NameDetector, NameDetectorConfig,
    PIIDetector, RegexDetectorConfig, RegexPiiDetector,
};
pub use fusion::EntityFuser;
pub use ml_adapter::{MlAdapter, PredictionRejected};
pub use pipeline::{
    AnonymizeRequest, AnonymizeResult, DetectionConfig, DetectionContext, DetectionRequest,
    DetectionResult, DetectionSummary, EntityStatus, FilteredEntity, ValidEntity,
};
pub use redactor::{Anonymizer, DEFAULT_REPLACEMENT, PIIRedactor};
pub use schema::{SchemaIssue, SchemaPattern, SchemaStore};
pub use validator::{CrossValidationPolicy, SchemaValidator, Verdict};
