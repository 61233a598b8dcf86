//! Schema store: category name → validation pattern
//!
//! The schema asset is a structured document mapping each category to
//! `{ "regex": "<pattern>", "examples": ["...", ...] }`. It is loaded once at
//! startup and never mutated afterwards.
//!
//! Loading is split in two failure domains:
//! - the document itself must parse as an object, otherwise loading fails;
//! - each category compiles independently. A category whose definition is
//!   malformed is kept as an unusable entry and never validates anything.

use bankshield_core::{Error, Result};
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Why a category has no usable pattern
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaIssue {
    /// The category's definition is not an object
    #[error("definition is not an object")]
    NotAnObject,

    /// The definition has no string `regex` field
    #[error("definition has no `regex` string")]
    MissingRegex,

    /// The regex failed to compile
    #[error("invalid regex `{pattern}`: {message}")]
    InvalidRegex { pattern: String, message: String },
}

/// A compiled, start-anchored validation pattern
///
/// Matching follows "matches from the start" semantics: the pattern must match
/// a prefix of the text. Schema patterns that want a full match end in `$`.
#[derive(Debug, Clone)]
pub struct SchemaPattern {
    source: String,
    anchored: Regex,
}

impl SchemaPattern {
    /// Compile a schema pattern source
    pub fn compile(source: &str) -> std::result::Result<Self, regex::Error> {
        let anchored = Regex::new(&format!("^(?:{})", source))?;
        Ok(Self {
            source: source.to_string(),
            anchored,
        })
    }

    /// The pattern as written in the schema
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Whether the pattern matches `text` from its first character
    pub fn matches(&self, text: &str) -> bool {
        self.anchored.is_match(text)
    }

    /// Whether the pattern accepts every input
    ///
    /// Under prefix semantics a pattern that matches the empty string matches
    /// the start of any text (`.*`, `\d*`, `(foo)?`).
    pub fn is_wildcard(&self) -> bool {
        self.anchored.is_match("")
    }
}

/// One category of the schema
#[derive(Debug, Clone)]
struct CategoryEntry {
    name: String,
    examples: Vec<String>,
    pattern: std::result::Result<SchemaPattern, SchemaIssue>,
}

impl CategoryEntry {
    fn examples(&self) -> &[String] {
        &self.examples
    }

    fn pattern(&self) -> Option<&SchemaPattern> {
        self.pattern.as_ref().ok()
    }

    fn issue(&self) -> Option<&SchemaIssue> {
        self.pattern.as_ref().err()
    }
}

/// Read-only table of schema categories in document order
#[derive(Debug, Clone)]
pub struct SchemaStore {
    entries: Vec<CategoryEntry>,
    index: HashMap<String, usize>,
    document: Value,
}

impl SchemaStore {
    /// Load a schema file
    ///
    /// YAML is used for `.yaml`/`.yml` files, JSON otherwise.
    ///
    /// # Errors
    /// - `Error::Io` if the file can't be read
    /// - `Error::SchemaParse` if the file isn't a structured document mapping
    ///   category names to definitions
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;

        let store = match path.extension().and_then(|s| s.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml_str(&contents)?,
            _ => Self::from_json_str(&contents)?,
        };

        info!(
            "Loaded schema from {:?}: {} categories ({} usable)",
            path,
            store.len(),
            store.usable_categories().count()
        );

        Ok(store)
    }

    /// Parse a JSON schema document
    pub fn from_json_str(contents: &str) -> Result<Self> {
        let document: Value = serde_json::from_str(contents)
            .map_err(|e| Error::SchemaParse(format!("invalid JSON: {}", e)))?;
        Self::from_document(document)
    }

    /// Parse a YAML schema document
    pub fn from_yaml_str(contents: &str) -> Result<Self> {
        let document: Value = serde_yaml::from_str(contents)
            .map_err(|e| Error::SchemaParse(format!("invalid YAML: {}", e)))?;
        Self::from_document(document)
    }

    /// Build the store from an already parsed document
    pub fn from_document(document: Value) -> Result<Self> {
        let Some(categories) = document.as_object() else {
            return Err(Error::SchemaParse(
                "schema must be an object mapping category names to definitions".to_string(),
            ));
        };

        let entries = compile_categories(categories);
        let index = entries
            .iter()
            .enumerate()
            .map(|(i, entry)| (entry.name.clone(), i))
            .collect();

        Ok(Self {
            entries,
            index,
            document,
        })
    }

    /// Validation pattern for a category, if the category exists and compiled
    pub fn pattern_for(&self, category: &str) -> Option<&SchemaPattern> {
        self.entry(category).and_then(CategoryEntry::pattern)
    }

    /// Whether the category is known (usable or not)
    pub fn contains(&self, category: &str) -> bool {
        self.index.contains_key(category)
    }

    fn entry(&self, category: &str) -> Option<&CategoryEntry> {
        self.index.get(category).map(|&i| &self.entries[i])
    }

    /// All category names in document order
    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    /// Categories with a compiled pattern, in document order
    pub fn usable_categories(&self) -> impl Iterator<Item = (&str, &SchemaPattern)> {
        self.entries
            .iter()
            .filter_map(|e| e.pattern().map(|p| (e.name.as_str(), p)))
    }

    /// Categories that failed to load, with the reason
    pub fn unusable_categories(&self) -> impl Iterator<Item = (&str, &SchemaIssue)> {
        self.entries
            .iter()
            .filter_map(|e| e.issue().map(|issue| (e.name.as_str(), issue)))
    }

    /// Example values for a category
    pub fn examples_for(&self, category: &str) -> &[String] {
        self.entry(category).map(CategoryEntry::examples).unwrap_or(&[])
    }

    /// Examples that do not validate against their own category's pattern
    pub fn mismatched_examples(&self) -> Vec<(&str, &str)> {
        self.entries
            .iter()
            .filter_map(|e| e.pattern().map(|p| (e, p)))
            .flat_map(|(e, p)| {
                e.examples
                    .iter()
                    .filter(move |example| !p.matches(example))
                    .map(move |example| (e.name.as_str(), example.as_str()))
            })
            .collect()
    }

    /// The document as loaded
    pub fn document(&self) -> &Value {
        &self.document
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn compile_categories(categories: &Map<String, Value>) -> Vec<CategoryEntry> {
    categories
        .iter()
        .map(|(name, definition)| {
            let examples = definition
                .get("examples")
                .and_then(Value::as_array)
                .map(|values| {
                    values
                        .iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default();

            let pattern = compile_definition(definition);
            match &pattern {
                Ok(p) => debug!("Schema category {}: {}", name, p.source()),
                Err(issue) => warn!("Schema category {} is unusable: {}", name, issue),
            }

            CategoryEntry {
                name: name.clone(),
                examples,
                pattern,
            }
        })
        .collect()
}

fn compile_definition(definition: &Value) -> std::result::Result<SchemaPattern, SchemaIssue> {
    let object = definition.as_object().ok_or(SchemaIssue::NotAnObject)?;
    let source = object
        .get("regex")
        .and_then(Value::as_str)
        .ok_or(SchemaIssue::MissingRegex)?;

    SchemaPattern::compile(source).map_err(|e| SchemaIssue::InvalidRegex {
        pattern: source.to_string(),
        message: e.to_string(),
    })
}
