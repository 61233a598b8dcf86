//! PII redaction

use bankshield_core::CandidateEntity;

/// Replacement token used when the caller does not supply one
pub const DEFAULT_REPLACEMENT: &str = "[REDACTED]";

/// Trait for redacting PII from text
pub trait PIIRedactor: Send + Sync {
    /// Redact the given entities from text
    fn redact(&self, text: &str, entities: &[CandidateEntity]) -> String;

    /// The token written in place of each entity
    fn replacement(&self) -> &str;
}

/// Replaces every entity span with a fixed token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Anonymizer {
    replacement: String,
}

impl Anonymizer {
    pub fn new(replacement: impl Into<String>) -> Self {
        Self {
            replacement: replacement.into(),
        }
    }

    /// Replace each entity's `start..end` span in `text` with `replacement`
    ///
    /// Spans are replaced from the end of the text toward the beginning so that
    /// earlier offsets stay valid. Overlapping spans are not rejected: the
    /// earlier-positioned entity overwrites into the tail of the region already
    /// replaced. Offsets are clamped to the current text and to char boundaries.
    pub fn anonymize(text: &str, entities: &[CandidateEntity], replacement: &str) -> String {
        if entities.is_empty() {
            return text.to_string();
        }

        let mut ordered: Vec<&CandidateEntity> = entities.iter().collect();
        ordered.sort_by(|a, b| b.start.cmp(&a.start));

        let mut redacted = text.to_string();
        for entity in ordered {
            let end = floor_boundary(&redacted, entity.end);
            let start = floor_boundary(&redacted, entity.start.min(end));
            redacted.replace_range(start..end, replacement);
        }

        redacted
    }
}

impl Default for Anonymizer {
    fn default() -> Self {
        Self::new(DEFAULT_REPLACEMENT)
    }
}

impl PIIRedactor for Anonymizer {
    fn redact(&self, text: &str, entities: &[CandidateEntity]) -> String {
        Self::anonymize(text, entities, &self.replacement)
    }

    fn replacement(&self) -> &str {
        &self.replacement
    }
}

/// Largest char boundary of `text` at or below `index`
fn floor_boundary(text: &str, index: usize) -> usize {
    let mut index = index.min(text.len());
    while !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}
