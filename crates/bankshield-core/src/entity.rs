//! Candidate entity model
//!
//! Every detector (pattern-based or ML) emits [`CandidateEntity`] values. Offsets
//! are half-open byte offsets into the original UTF-8 input, so
//! `&input[entity.start..entity.end]` is always a valid slice.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Detector family that produced an entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMethod {
    /// Enhanced regex patterns matched anywhere in the text
    Regex,

    /// Cue-word prefixed capture groups ("phone: <value>")
    Contextual,

    /// Capitalised-token and known-surname heuristics
    NamePattern,

    /// External token-classification model
    Ml,
}

impl DetectionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            DetectionMethod::Regex => "regex",
            DetectionMethod::Contextual => "contextual",
            DetectionMethod::NamePattern => "name_pattern",
            DetectionMethod::Ml => "ml",
        }
    }
}

impl fmt::Display for DetectionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DetectionMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "regex" => Ok(DetectionMethod::Regex),
            "contextual" => Ok(DetectionMethod::Contextual),
            "name_pattern" => Ok(DetectionMethod::NamePattern),
            "ml" => Ok(DetectionMethod::Ml),
            other => Err(format!("unknown detection method: {}", other)),
        }
    }
}

/// Provenance of an entity: the methods that agreed on it, in scan order
///
/// Serialized as the `+`-joined method names, e.g. `"regex+ml"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Provenance(Vec<DetectionMethod>);

impl Provenance {
    /// Provenance for an entity produced by a single detector
    pub fn single(method: DetectionMethod) -> Self {
        Self(vec![method])
    }

    /// Concatenate two provenances (used when the fuser merges entities)
    pub fn join(&self, other: &Provenance) -> Self {
        let mut methods = self.0.clone();
        methods.extend_from_slice(&other.0);
        Self(methods)
    }
}

impl From<DetectionMethod> for Provenance {
    fn from(method: DetectionMethod) -> Self {
        Self::single(method)
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, method) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("+")?;
            }
            f.write_str(method.as_str())?;
        }
        Ok(())
    }
}

impl From<Provenance> for String {
    fn from(provenance: Provenance) -> Self {
        provenance.to_string()
    }
}

impl TryFrom<String> for Provenance {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let methods = value
            .split('+')
            .map(DetectionMethod::from_str)
            .collect::<Result<Vec<_>, _>>()?;

        if methods.is_empty() {
            return Err("empty provenance".to_string());
        }

        Ok(Self(methods))
    }
}

/// A detector's unvalidated guess at a PII span
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateEntity {
    /// Schema category the detector assigned (e.g. `EMAIL`, `PAN`)
    pub category: String,

    /// The literal substring believed to be PII
    pub text: String,

    /// Start byte offset in the original text
    pub start: usize,

    /// End byte offset in the original text (exclusive)
    pub end: usize,

    /// Confidence score (0.0 to 1.0)
    pub score: f32,

    /// Which detector(s) produced this entity
    pub method: Provenance,
}

/// A candidate entity after overlap resolution
///
/// Same shape as a candidate; `method` may be composite and `score` is the
/// maximum of the merged scores.
pub type FusedEntity = CandidateEntity;

impl CandidateEntity {
    /// Build an entity from a slice of `source`
    ///
    /// `start..end` must lie on char boundaries of `source`.
    pub fn from_span(
        category: impl Into<String>,
        source: &str,
        start: usize,
        end: usize,
        score: f32,
        method: DetectionMethod,
    ) -> Self {
        Self {
            category: category.into(),
            text: source[start..end].to_string(),
            start,
            end,
            score,
            method: Provenance::single(method),
        }
    }
}
