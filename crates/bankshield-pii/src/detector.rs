//! Pattern-based PII detectors
//!
//! Three independent, stateless detectors scan raw text and emit candidate
//! entities. Detectors are deliberately loose (high recall); deciding whether a
//! candidate is trustworthy is left to the schema validator.

mod contextual_detector;
mod name_detector;
mod regex_detector;

pub use contextual_detector::{ContextualDetector, ContextualPattern, default_contextual_patterns};
pub use name_detector::{NameDetector, NameDetectorConfig};
pub use regex_detector::{
    EnhancedPattern, RegexDetectorConfig, RegexPiiDetector, default_enhanced_patterns,
};

use bankshield_core::{CandidateEntity, DetectionMethod};

/// Score assigned to enhanced regex matches
pub const REGEX_SCORE: f32 = 0.95;

/// Score assigned to contextual (cue-prefixed) matches
pub const CONTEXTUAL_SCORE: f32 = 0.90;

/// Trait for detecting PII candidates in text
pub trait PIIDetector: Send + Sync {
    /// Detect PII candidates in the given text
    fn detect(&self, text: &str) -> Vec<CandidateEntity>;

    /// The provenance tag this detector stamps on its candidates
    fn method(&self) -> DetectionMethod;

    /// Get the categories this detector can emit
    fn supported_categories(&self) -> Vec<String>;
}
