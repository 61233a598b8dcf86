//! Schema validation with cross-category correction

use crate::schema::{SchemaPattern, SchemaStore};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Categories tried first when a text fails its own category's pattern
pub fn default_priority() -> Vec<String> {
    [
        "PAN",
        "TELEPHONENUM",
        "AADHAAR",
        "DRIVERLICENSENUM",
        "EMAIL",
        "IFSC",
        "VOTERID",
        "PASSPORTNUM",
        "CREDITCARDNUM",
        "TRANSACTIONID",
        "GENDER",
        "DATE",
        "TIME",
        "AGE",
        "ZIPCODE",
        "BUILDINGNUM",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_fallback_scan() -> bool {
    true
}

/// Order in which other categories are tried during cross-validation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossValidationPolicy {
    /// Specific, high-signal categories checked first, in order
    #[serde(default = "default_priority")]
    pub priority: Vec<String>,

    /// After the priority list, scan every remaining category in schema order
    #[serde(default = "default_fallback_scan")]
    pub fallback_scan: bool,
}

impl Default for CrossValidationPolicy {
    fn default() -> Self {
        Self {
            priority: default_priority(),
            fallback_scan: default_fallback_scan(),
        }
    }
}

impl CrossValidationPolicy {
    /// Disable cross-validation entirely
    pub fn disabled() -> Self {
        Self {
            priority: Vec::new(),
            fallback_scan: false,
        }
    }
}

/// Outcome of validating one entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub valid: bool,
    pub reason: String,

    /// Carried through unchanged from the caller
    pub confidence: f32,

    /// Category the entity validated as (set only when valid)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub corrected_category: Option<String>,

    /// Category the detector assigned, set only when cross-validation changed it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_category: Option<String>,
}

impl Verdict {
    fn invalid(reason: String, confidence: f32) -> Self {
        Self {
            valid: false,
            reason,
            confidence,
            corrected_category: None,
            original_category: None,
        }
    }
}

/// Checks entity text against the schema patterns
#[derive(Clone)]
pub struct SchemaValidator {
    schema: Arc<SchemaStore>,
    policy: CrossValidationPolicy,
}

impl SchemaValidator {
    pub fn new(schema: Arc<SchemaStore>, policy: CrossValidationPolicy) -> Self {
        Self { schema, policy }
    }

    /// Validate `text` as `category`
    ///
    /// `confidence` never affects the outcome; thresholding is left to the caller.
    pub fn validate(&self, category: &str, text: &str, confidence: f32) -> Verdict {
        if !self.schema.contains(category) {
            return Verdict::invalid(format!("Unknown category: {}", category), confidence);
        }

        let Some(pattern) = self.schema.pattern_for(category) else {
            return Verdict::invalid(
                format!("No validation pattern available for {}", category),
                confidence,
            );
        };

        if pattern.matches(text) {
            return Verdict {
                valid: true,
                reason: format!("Matches {} schema pattern", category),
                confidence,
                corrected_category: Some(category.to_string()),
                original_category: None,
            };
        }

        if let Some(other) = self.cross_validate(category, text) {
            debug!("Cross-validated {} as {}", category, other);
            return Verdict {
                valid: true,
                reason: format!(
                    "Cross-validated: matches {} pattern instead of {}",
                    other, category
                ),
                confidence,
                corrected_category: Some(other.to_string()),
                original_category: Some(category.to_string()),
            };
        }

        Verdict::invalid(
            format!(
                "Does not match {} schema pattern: {}",
                category,
                pattern.source()
            ),
            confidence,
        )
    }

    /// First other category whose pattern matches `text`
    ///
    /// Wildcard and unusable categories never take part.
    pub fn cross_validate(&self, category: &str, text: &str) -> Option<&str> {
        let eligible = |(name, pattern): &(&str, &SchemaPattern)| {
            *name != category && !pattern.is_wildcard() && pattern.matches(text)
        };

        let prioritized = self
            .policy
            .priority
            .iter()
            .filter_map(|name| {
                self.schema
                    .pattern_for(name)
                    .map(|pattern| (name.as_str(), pattern))
            })
            .find(eligible);

        if let Some((name, _)) = prioritized {
            return Some(name);
        }

        if self.policy.fallback_scan {
            return self
                .schema
                .usable_categories()
                .find(eligible)
                .map(|(name, _)| name);
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCHEMA: &str = r#"{
        "GIVENNAME": {"regex": "^[A-Z][a-z]+$", "examples": ["Arun"]},
        "STREET": {"regex": ".*", "examples": ["12 MG Road"]},
        "CUSTOMERCODE": {"regex": "^[A-Z]{3}[A-Z0-9]{7}$"},
        "PAN": {"regex": "^[A-Z]{3}[PFCHAT][A-Z]\\d{4}[A-Z]$", "examples": ["ABCPD1234E"]},
        "TELEPHONENUM": {"regex": "^(?:\\+91[- ]?)?[6-9]\\d{9}$", "examples": ["9876543210"]},
        "AADHAAR": {"regex": "^\\d{4} \\d{4} \\d{4}$", "examples": ["1234 5678 9012"]},
        "ACCOUNTNUM": {"regex": "^\\d{9,18}$", "examples": ["123456789012"]},
        "VOTERID": {"regex": "^[A-Z]{3}\\d{7}$"},
        "BROKEN": {"regex": "([0-9"}
    }"#;

    fn validator() -> SchemaValidator {
        let schema = SchemaStore::from_json_str(SCHEMA).unwrap();
        SchemaValidator::new(Arc::new(schema), CrossValidationPolicy::default())
    }

    #[test]
    fn test_matching_category_is_valid() {
        let verdict = validator().validate("TELEPHONENUM", "9876543210", 0.90);

        assert!(verdict.valid);
        assert_eq!(verdict.corrected_category.as_deref(), Some("TELEPHONENUM"));
        assert!(verdict.original_category.is_none());
        assert!(verdict.original_category.is_none());
        assert_eq!(verdict.reason, "Matches TELEPHONENUM schema pattern");
        assert_eq!(verdict.confidence, 0.90);
    }

    #[test]
    fn test_mislabeled_phone_is_corrected() {
        let verdict = validator().validate("AADHAAR", "9876543210", 1.0);

        assert!(verdict.valid);
        assert_eq!(verdict.corrected_category.as_deref(), Some("TELEPHONENUM"));
        assert_eq!(verdict.original_category.as_deref(), Some("AADHAAR"));
        assert_eq!(
            verdict.reason,
            "Cross-validated: matches TELEPHONENUM pattern instead of AADHAAR"
        );
    }

    #[test]
    fn test_fragment_matching_nothing_is_invalid() {
        let verdict = validator().validate("AADHAAR", "9012", 0.70);

        assert!(!verdict.valid);
        assert!(verdict.corrected_category.is_none());
        assert_eq!(
            verdict.reason,
            r"Does not match AADHAAR schema pattern: ^\d{4} \d{4} \d{4}$"
        );
    }

    #[test]
    fn test_unknown_category() {
        let verdict = validator().validate("SHOESIZE", "42", 0.99);

        assert!(!verdict.valid);
        assert_eq!(verdict.reason, "Unknown category: SHOESIZE");
    }

    #[test]
    fn test_unusable_category() {
        let verdict = validator().validate("BROKEN", "123", 0.99);

        assert!(!verdict.valid);
        assert_eq!(verdict.reason, "No validation pattern available for BROKEN");
    }

    #[test]
    fn test_priority_beats_table_order() {
        // CUSTOMERCODE and PAN both match; PAN is on the priority list
        let verdict = validator().validate("GIVENNAME", "ABCPD1234E", 0.8);

        assert_eq!(verdict.corrected_category.as_deref(), Some("PAN"));
    }

    #[test]
    fn test_wildcard_never_validates_by_cross_validation() {
        let verdict = validator().validate("PAN", "not an id at all", 0.95);

        assert!(!verdict.valid);
        assert!(verdict.reason.starts_with("Does not match PAN"));
    }

    #[test]
    fn test_wildcard_category_still_validates_itself() {
        let verdict = validator().validate("STREET", "anything goes", 0.5);
        assert!(verdict.valid);
        assert_eq!(verdict.corrected_category.as_deref(), Some("STREET"));
    }

    #[test]
    fn test_fallback_scan_reaches_unprioritized_categories() {
        let verdict = validator().validate("PAN", "123456789012", 0.9);
        assert_eq!(verdict.corrected_category.as_deref(), Some("ACCOUNTNUM"));

        let schema = SchemaStore::from_json_str(SCHEMA).unwrap();
        let no_fallback = SchemaValidator::new(
            Arc::new(schema),
            CrossValidationPolicy {
                fallback_scan: false,
                ..CrossValidationPolicy::default()
            },
        );
        assert!(!no_fallback.validate("PAN", "123456789012", 0.9).valid);
    }

    #[test]
    fn test_disabled_policy() {
        let schema = SchemaStore::from_json_str(SCHEMA).unwrap();
        let validator = SchemaValidator::new(Arc::new(schema), CrossValidationPolicy::disabled());

        assert!(!validator.validate("AADHAAR", "9876543210", 1.0).valid);
    }

    #[test]
    fn test_confidence_never_flips_validity() {
        let validator = validator();

        for confidence in [0.0, 0.3, 0.99, 1.0] {
            assert!(validator.validate("AADHAAR", "1234 5678 9012", confidence).valid);
            assert!(!validator.validate("AADHAAR", "9012", confidence).valid);
        }
    }

    #[test]
    fn test_policy_deserializes_with_defaults() {
        let policy: CrossValidationPolicy = serde_yaml::from_str("fallback_scan: false").unwrap();

        assert_eq!(policy.priority, default_priority());
        assert!(!policy.fallback_scan);
    }
}
