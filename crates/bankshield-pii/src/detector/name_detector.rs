//! Name heuristics: capitalised word runs and known surnames

use crate::detector::PIIDetector;
use bankshield_core::{CandidateEntity, DetectionMethod};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

const CATEGORY: &str = "FULLNAME";

/// Two or more consecutive capitalised words
static CAPITALISED_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[A-Z][a-z]+(?:[ \t]+[A-Z][a-z]+)+\b").unwrap());

fn default_surnames() -> Vec<String> {
    [
        "Kumar", "Singh", "Sharma", "Verma", "Mehta", "Patel", "Gupta", "Agarwal", "Jain", "Shah",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_full_name_score() -> f32 {
    0.90
}

fn default_surname_score() -> f32 {
    0.95
}

/// Configuration for the name detector
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NameDetectorConfig {
    /// Surnames that make a preceding capitalised token a full name
    #[serde(default = "default_surnames")]
    pub surnames: Vec<String>,

    /// Score for a plain run of capitalised words
    #[serde(default = "default_full_name_score")]
    pub full_name_score: f32,

    /// Score for a capitalised token followed by a known surname
    #[serde(default = "default_surname_score")]
    pub surname_score: f32,
}

impl Default for NameDetectorConfig {
    fn default() -> Self {
        Self {
            surnames: default_surnames(),
            full_name_score: default_full_name_score(),
            surname_score: default_surname_score(),
        }
    }
}

/// Heuristic full-name detector
pub struct NameDetector {
    with_surname: Option<Regex>,
    config: NameDetectorConfig,
}

impl NameDetector {
    pub fn new(config: NameDetectorConfig) -> Self {
        let with_surname = if config.surnames.is_empty() {
            None
        } else {
            let alternation = config
                .surnames
                .iter()
                .map(|s| regex::escape(s))
                .collect::<Vec<_>>()
                .join("|");
            match Regex::new(&format!(r"\b[A-Z][a-z]+[ \t]+(?:{})\b", alternation)) {
                Ok(regex) => Some(regex),
                Err(e) => {
                    warn!("Surname pattern disabled: {}", e);
                    None
                }
            }
        };

        Self {
            with_surname,
            config,
        }
    }
}

impl Default for NameDetector {
    fn default() -> Self {
        Self::new(NameDetectorConfig::default())
    }
}

impl PIIDetector for NameDetector {
    fn detect(&self, text: &str) -> Vec<CandidateEntity> {
        let mut detections: Vec<CandidateEntity> = CAPITALISED_RUN
            .find_iter(text)
            .map(|m| {
                CandidateEntity::from_span(
                    CATEGORY,
                    text,
                    m.start(),
                    m.end(),
                    self.config.full_name_score,
                    DetectionMethod::NamePattern,
                )
            })
            .collect();

        if let Some(regex) = &self.with_surname {
            detections.extend(regex.find_iter(text).map(|m| {
                CandidateEntity::from_span(
                    CATEGORY,
                    text,
                    m.start(),
                    m.end(),
                    self.config.surname_score,
                    DetectionMethod::NamePattern,
                )
            }));
        }

        detections
    }

    fn method(&self) -> DetectionMethod {
        DetectionMethod::NamePattern
    }

    fn supported_categories(&self) -> Vec<String> {
        vec![CATEGORY.to_string()]
    }
}
