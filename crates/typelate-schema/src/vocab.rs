//! Vocabulary collections - named, closed sets of allowed string literals.

use indexmap::IndexMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Errors from loading vocabularies.
#[derive(Debug, Error)]
pub enum VocabError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A collection of named vocabularies.
///
/// Names are case-sensitive unique keys; each vocabulary is an ordered,
/// deduplicated list of literals. Membership tests are case-insensitive, and
/// the stored casing is the canonical one. Collections are extended during
/// configuration and treated as read-only once handed to a validator or
/// engine.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VocabularyCollection {
    entries: IndexMap<String, Vec<String>>,
}

impl VocabularyCollection {
    /// Create an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a named vocabulary, deduplicating literals case-insensitively
    /// while preserving first-seen order and casing. Replaces any existing
    /// vocabulary with the same name.
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        literals: impl IntoIterator<Item = impl Into<String>>,
    ) {
        let mut seen: Vec<String> = Vec::new();
        for literal in literals {
            let literal = literal.into();
            if !seen.iter().any(|s| s.eq_ignore_ascii_case(&literal)) {
                seen.push(literal);
            }
        }
        self.entries.insert(name.into(), seen);
    }

    /// Chainable form of [`insert`](Self::insert).
    pub fn with(
        mut self,
        name: impl Into<String>,
        literals: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.insert(name, literals);
        self
    }

    /// The literals of a vocabulary, in canonical casing and order.
    pub fn get(&self, name: &str) -> Option<&[String]> {
        self.entries.get(name).map(Vec::as_slice)
    }

    /// Whether a vocabulary with this exact name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Case-insensitively match `candidate` against the named vocabulary,
    /// returning the canonical stored casing on a hit.
    pub fn canonical(&self, name: &str, candidate: &str) -> Option<&str> {
        self.entries
            .get(name)?
            .iter()
            .find(|literal| literal.eq_ignore_ascii_case(candidate))
            .map(String::as_str)
    }

    /// Vocabulary names in insertion order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Number of vocabularies.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the collection has no vocabularies.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Parse a collection from a JSON object of `name -> [string]`.
    pub fn from_json(json: &str) -> Result<Self, VocabError> {
        let raw: IndexMap<String, Vec<String>> = serde_json::from_str(json)?;
        let mut collection = Self::new();
        for (name, literals) in raw {
            collection.insert(name, literals);
        }
        Ok(collection)
    }

    /// Load a collection from a JSON file of `name -> [string]`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, VocabError> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }
}
