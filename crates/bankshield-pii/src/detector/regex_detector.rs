//! Enhanced regex detector implementation

use crate::detector::{PIIDetector, REGEX_SCORE};
use bankshield_core::{CandidateEntity, DetectionMethod};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

/// A recall-oriented detection pattern for one category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnhancedPattern {
    /// Category to stamp on matches
    pub category: String,

    /// Regex pattern
    pub pattern: String,

    /// Match letters regardless of case
    #[serde(default)]
    pub case_insensitive: bool,
}

impl EnhancedPattern {
    pub fn new(category: &str, pattern: &str) -> Self {
        Self {
            category: category.to_string(),
            pattern: pattern.to_string(),
            case_insensitive: false,
        }
    }

    fn case_insensitive(mut self) -> Self {
        self.case_insensitive = true;
        self
    }
}

/// Default enhanced pattern table
///
/// Single-token catch-alls (given name, surname, city, age, building number)
/// and bare account numbers match almost any word or number when scanned
/// without context, so they are only picked up by the contextual detector.
pub fn default_enhanced_patterns() -> Vec<EnhancedPattern> {
    vec![
        EnhancedPattern::new("FULLNAME", r"\b[A-Z][a-z]+(?:[ \t]+[A-Z][a-z]+)+\b"),
        EnhancedPattern::new("TELEPHONENUM", r"(?:\+91[-\s]?|\b0?)[6-9]\d{9}\b"),
        EnhancedPattern::new(
            "EMAIL",
            r"\b[a-zA-Z0-9_.+-]+@[a-zA-Z0-9-]+\.[a-zA-Z0-9.-]*[a-zA-Z0-9]\b",
        ),
        EnhancedPattern::new(
            "STREET",
            r"\b\d+[ \t]+[A-Za-z0-9 \t]+?(?:Street|Road|Avenue|Lane|Drive|Way|Boulevard|Place|Marg)\b",
        ),
        EnhancedPattern::new("ZIPCODE", r"\b\d{6}\b"),
        EnhancedPattern::new("DATE", r"\b\d{2}[-/]\d{2}[-/]\d{4}\b"),
        EnhancedPattern::new("TIME", r"\b\d{2}:\d{2}(?::\d{2})?\b"),
        EnhancedPattern::new("AADHAAR", r"\b\d{4}\s\d{4}\s\d{4}\b"),
        EnhancedPattern::new("PAN", r"\b[A-Z]{3}[PFCHAT][A-Z]\d{4}[A-Z]\b"),
        EnhancedPattern::new("VOTERID", r"\b[A-Z]{3}\d{7}\b"),
        EnhancedPattern::new(
            "DRIVERLICENSENUM",
            r"\b[A-Z]{2}[-\s]?\d{2}[-\s]?\d{4}[-\s]?\d{7}\b",
        ),
        EnhancedPattern::new("IFSC", r"\b[A-Z]{4}0[A-Z0-9]{6}\b"),
        EnhancedPattern::new("CREDITCARDNUM", r"\b\d{4}[ -]\d{4}[ -]\d{4}[ -]\d{4}\b"),
        EnhancedPattern::new(
            "TRANSACTIONID",
            r"\b[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[1-5][0-9a-fA-F]{3}-[89abAB][0-9a-fA-F]{3}-[0-9a-fA-F]{12}\b",
        ),
        EnhancedPattern::new("GENDER", r"\b(?:male|female)\b").case_insensitive(),
        EnhancedPattern::new("PASSPORTNUM", r"\b[A-Z]\d{7}\b"),
    ]
}

/// Configuration for the enhanced regex detector
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegexDetectorConfig {
    /// Base pattern table
    #[serde(default = "default_enhanced_patterns")]
    pub patterns: Vec<EnhancedPattern>,

    /// Additional patterns appended after the base table
    #[serde(default)]
    pub extra_patterns: Vec<EnhancedPattern>,

    /// Score assigned to every match
    #[serde(default = "default_score")]
    pub score: f32,
}

fn default_score() -> f32 {
    REGEX_SCORE
}

impl Default for RegexDetectorConfig {
    fn default() -> Self {
        Self {
            patterns: default_enhanced_patterns(),
            extra_patterns: Vec::new(),
            score: REGEX_SCORE,
        }
    }
}

/// Regex-based PII detector scanning the whole text per category
pub struct RegexPiiDetector {
    regexes: Vec<(String, Arc<Regex>)>, // (category, regex)
    score: f32,
}

impl RegexPiiDetector {
    /// Create a new enhanced regex detector with the given configuration
    ///
    /// A pattern that fails to compile is skipped with a warning; the other
    /// patterns stay active.
    pub fn new(config: RegexDetectorConfig) -> Self {
        let regexes = config
            .patterns
            .iter()
            .chain(config.extra_patterns.iter())
            .filter_map(|p| {
                match RegexBuilder::new(&p.pattern)
                    .case_insensitive(p.case_insensitive)
                    .build()
                {
                    Ok(regex) => Some((p.category.clone(), Arc::new(regex))),
                    Err(e) => {
                        warn!("Skipping detection pattern for {}: {}", p.category, e);
                        None
                    }
                }
            })
            .collect();

        Self {
            regexes,
            score: config.score,
        }
    }
}

impl Default for RegexPiiDetector {
    fn default() -> Self {
        Self::new(RegexDetectorConfig::default())
    }
}

impl PIIDetector for RegexPiiDetector {
    fn detect(&self, text: &str) -> Vec<CandidateEntity> {
        let mut detections = Vec::new();

        for (category, regex) in &self.regexes {
            for capture in regex.find_iter(text) {
                detections.push(CandidateEntity::from_span(
                    category.as_str(),
                    text,
                    capture.start(),
                    capture.end(),
                    self.score,
                    DetectionMethod::Regex,
                ));
            }
        }

        detections
    }

    fn method(&self) -> DetectionMethod {
        DetectionMethod::Regex
    }

    fn supported_categories(&self) -> Vec<String> {
        let mut categories: Vec<String> = Vec::new();
        for (category, _) in &self.regexes {
            if !categories.contains(category) {
                categories.push(category.clone());
            }
        }
        categories
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detect(text: &str) -> Vec<CandidateEntity> {
        RegexPiiDetector::default().detect(text)
    }

    fn of_category<'a>(detections: &'a [CandidateEntity], category: &str) -> Vec<&'a str> {
        detections
            .iter()
            .filter(|d| d.category == category)
            .map(|d| d.text.as_str())
            .collect()
    }

    #[test]
    fn test_phone_detection() {
        let text = "My phone is 9876543210 or +91-9123456780";
        let detections = detect(text);

        assert_eq!(
            of_category(&detections, "TELEPHONENUM"),
            vec!["9876543210", "+91-9123456780"]
        );
        let first = detections
            .iter()
            .find(|d| d.category == "TELEPHONENUM")
            .unwrap();
        assert_eq!((first.start, first.end), (12, 22));
        assert_eq!(first.score, 0.95);
        assert_eq!(first.method.to_string(), "regex");
    }

    #[test]
    fn test_phone_not_matched_inside_longer_digit_runs() {
        let detections = detect("Account 12345987654321099");
        assert!(of_category(&detections, "TELEPHONENUM").is_empty());
    }

    #[test]
    fn test_email_detection() {
        let detections = detect("Contact arun.sharma@hdfc.com.");
        assert_eq!(of_category(&detections, "EMAIL"), vec!["arun.sharma@hdfc.com"]);
    }

    #[test]
    fn test_government_ids() {
        let text = "PAN: ABCPD1234E, Aadhaar: 1234 5678 9012, Passport: K1234567";
        let detections = detect(text);

        assert_eq!(of_category(&detections, "PAN"), vec!["ABCPD1234E"]);
        assert_eq!(of_category(&detections, "AADHAAR"), vec!["1234 5678 9012"]);
        assert_eq!(of_category(&detections, "PASSPORTNUM"), vec!["K1234567"]);
    }

    #[test]
    fn test_full_name_requires_two_capitalised_tokens() {
        let detections = detect("customer Arun Kumar Sharma called, then Ravi left");
        assert_eq!(of_category(&detections, "FULLNAME"), vec!["Arun Kumar Sharma"]);
    }

    #[test]
    fn test_gender_is_case_insensitive() {
        let detections = detect("Gender: FEMALE");
        assert_eq!(of_category(&detections, "GENDER"), vec!["FEMALE"]);
    }

    #[test]
    fn test_transaction_id() {
        let detections = detect("Transaction ID: f47ac10b-58cc-4372-a567-0e02b2c3d479 done");
        assert_eq!(
            of_category(&detections, "TRANSACTIONID"),
            vec!["f47ac10b-58cc-4372-a567-0e02b2c3d479"]
        );
    }

    #[test]
    fn test_extra_patterns_and_invalid_patterns() {
        let config = RegexDetectorConfig {
            patterns: vec![EnhancedPattern::new("BROKEN", "([0-9")],
            extra_patterns: vec![EnhancedPattern::new("CUSTOMERID", r"\bCUST-\d{6}\b")],
            score: 0.8,
        };
        let detector = RegexPiiDetector::new(config);

        assert_eq!(detector.supported_categories(), vec!["CUSTOMERID".to_string()]);

        let detections = detector.detect("ref CUST-123456");
        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].category, "CUSTOMERID");
        assert_eq!(detections[0].score, 0.8);
    }

    #[test]
    fn test_non_overlapping_matches_per_pattern() {
        let detections = detect("Dates 01/02/2020 and 03/04/2021");
        assert_eq!(
            of_category(&detections, "DATE"),
            vec!["01/02/2020", "03/04/2021"]
        );
    }

    #[test]
    fn test_empty_text() {
        assert!(detect("").is_empty());
    }
}
