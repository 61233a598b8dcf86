//! Contextual detector: cue phrase followed by a captured value
//!
//! Matches text such as `phone: 9876543210`, `PAN number is ABCPD1234E` or
//! `Date of Birth: 15/08/1990` and emits only the captured value's span.

use crate::detector::{CONTEXTUAL_SCORE, PIIDetector};
use bankshield_core::{CandidateEntity, DetectionMethod};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Separator between the cue and the value: optional `number`/`no.`/`#`,
/// then an optional `:`, `=`, `-` or `is`
const SEPARATOR: &str = r"(?i:\s*(?:(?:number|no\.?|num|#)\s*)?(?:[:=-]|\bis\b)?\s*)";

/// One (category, cue, value) rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextualPattern {
    pub category: String,

    /// Cue alternation, matched case-insensitively on word boundaries
    pub cue: String,

    /// Value pattern; its span becomes the candidate
    pub value: String,
}

impl ContextualPattern {
    pub fn new(category: &str, cue: &str, value: &str) -> Self {
        Self {
            category: category.to_string(),
            cue: cue.to_string(),
            value: value.to_string(),
        }
    }

    fn to_regex(&self) -> Result<Regex, regex::Error> {
        Regex::new(&format!(
            r"(?i:\b(?:{}))\b{}({})",
            self.cue, SEPARATOR, self.value
        ))
    }
}

/// Default cue table
pub fn default_contextual_patterns() -> Vec<ContextualPattern> {
    vec![
        ContextualPattern::new(
            "FULLNAME",
            r"name|customer|account\s*holder",
            r"[A-Z][a-z]+(?:[ \t]+[A-Z][a-z]+)+",
        ),
        ContextualPattern::new(
            "EMAIL",
            r"e-?mail",
            r"[a-zA-Z0-9_.+-]+@[a-zA-Z0-9-]+\.[a-zA-Z0-9.-]*[a-zA-Z0-9]",
        ),
        ContextualPattern::new(
            "TELEPHONENUM",
            r"phone|mobile|cell|contact",
            r"(?:\+91[- ]?|0)?[6-9]\d{9}\b",
        ),
        ContextualPattern::new(
            "STREET",
            r"address|addr",
            r"[A-Za-z0-9 ,]+?(?:Street|Road|Avenue|Lane|Drive|Way|Boulevard|Place|Marg)\b",
        ),
        ContextualPattern::new("CITY", r"city|town", r"[A-Z][a-z]+(?:[ \t][A-Z][a-z]+)*"),
        ContextualPattern::new(
            "ZIPCODE",
            r"pin\s*code|zip(?:\s*code)?|postal\s*code",
            r"\d{6}\b",
        ),
        ContextualPattern::new("AGE", r"age|aged", r"\d{1,3}\b"),
        ContextualPattern::new(
            "GENDER",
            r"gender|sex",
            r"(?:Male|Female|MALE|FEMALE|male|female|M|F)\b",
        ),
        ContextualPattern::new("PAN", r"pan(?:\s*card)?", r"[A-Z]{3}[PFCHAT][A-Z]\d{4}[A-Z]\b"),
        ContextualPattern::new("AADHAAR", r"aadhaa?r|uid", r"\d{4} \d{4} \d{4}\b"),
        ContextualPattern::new("PASSPORTNUM", r"passport", r"[A-Z]\d{7}\b"),
        ContextualPattern::new("ACCOUNTNUM", r"account|a/c|acct", r"\d{9,18}\b"),
        ContextualPattern::new("IFSC", r"ifsc(?:\s*code)?", r"[A-Z]{4}0[A-Z0-9]{6}\b"),
        ContextualPattern::new(
            "CREDITCARDNUM",
            r"credit\s*card|debit\s*card|card",
            r"\d{4}[ -]\d{4}[ -]\d{4}[ -]\d{4}\b",
        ),
        ContextualPattern::new(
            "TRANSACTIONID",
            r"transaction(?:\s*id)?|txn(?:\s*id)?",
            r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[1-5][0-9a-fA-F]{3}-[89abAB][0-9a-fA-F]{3}-[0-9a-fA-F]{12}\b",
        ),
        ContextualPattern::new(
            "DATE",
            r"date(?:\s*of\s*birth)?|dob|birth\s*date|born(?:\s*on)?",
            r"\d{2}[-/]\d{2}[-/]\d{4}\b",
        ),
        ContextualPattern::new("TIME", r"time", r"\d{2}:\d{2}(?::\d{2})?\b"),
        ContextualPattern::new(
            "DRIVERLICENSENUM",
            r"driver'?s?\s*licen[cs]e|driving\s*licen[cs]e|licen[cs]e|dl",
            r"[A-Z]{2}[- ]?\d{2}[- ]?\d{4}[- ]?\d{7}\b",
        ),
        ContextualPattern::new("VOTERID", r"voter\s*id|epic", r"[A-Z]{3}\d{7}\b"),
    ]
}

/// Contextual PII detector
pub struct ContextualDetector {
    rules: Vec<(String, Regex)>, // (category, cue + value regex)
}

impl ContextualDetector {
    /// Build a detector from a cue table
    ///
    /// Rules that fail to compile are skipped with a warning.
    pub fn new(patterns: &[ContextualPattern]) -> Self {
        let rules = patterns
            .iter()
            .filter_map(|p| match p.to_regex() {
                Ok(regex) => Some((p.category.clone(), regex)),
                Err(e) => {
                    warn!("Skipping contextual rule for {}: {}", p.category, e);
                    None
                }
            })
            .collect();

        Self { rules }
    }
}

impl Default for ContextualDetector {
    fn default() -> Self {
        Self::new(&default_contextual_patterns())
    }
}

impl PIIDetector for ContextualDetector {
    fn detect(&self, text: &str) -> Vec<CandidateEntity> {
        let mut detections = Vec::new();

        for (category, regex) in &self.rules {
            for captures in regex.captures_iter(text) {
                let Some(value) = captures.get(1) else {
                    continue;
                };
                if value.is_empty() {
                    continue;
                }

                detections.push(CandidateEntity::from_span(
                    category.as_str(),
                    text,
                    value.start(),
                    value.end(),
                    CONTEXTUAL_SCORE,
                    DetectionMethod::Contextual,
                ));
            }
        }

        detections
    }

    fn method(&self) -> DetectionMethod {
        DetectionMethod::Contextual
    }

    fn supported_categories(&self) -> Vec<String> {
        let mut categories: Vec<String> = Vec::new();
        for (category, _) in &self.rules {
            if !categories.contains(category) {
                categories.push(category.clone());
            }
        }
        categories
    }
}
