//! Index access consumed by query engines.
//!
//! The inverted index itself lives outside this crate; runners and terms
//! queries only need the narrow [`IndexReader`] view defined here.

pub mod memory;

use std::collections::HashMap;
use std::fmt::Debug;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::query::postings::Posting;

/// Stored content of a single document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentData {
    /// The document URI.
    pub uri: String,
    /// The document title.
    pub title: String,
    /// The document text as a token stream; bindings index into it.
    pub tokens: Vec<String>,
    /// Arbitrary metadata fields.
    pub metadata: HashMap<String, serde_json::Value>,
}

impl DocumentData {
    /// Create a new document, splitting `text` on whitespace.
    pub fn new<U: Into<String>, T: Into<String>>(uri: U, title: T, text: &str) -> Self {
        DocumentData {
            uri: uri.into(),
            title: title.into(),
            tokens: text.split_whitespace().map(str::to_string).collect(),
            metadata: HashMap::new(),
        }
    }

    /// Add a metadata field.
    pub fn with_metadata<K: Into<String>>(mut self, key: K, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Tokens in `[term_position, term_position + length)`, clamped to the
    /// document.
    pub fn token_span(&self, term_position: usize, length: usize) -> &[String] {
        let start = term_position.min(self.tokens.len());
        let end = term_position.saturating_add(length).min(self.tokens.len());
        &self.tokens[start..end]
    }
}

/// One entry of a field's term dictionary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermEntry {
    /// The indexed term string.
    pub term: String,
    /// Number of documents containing the term.
    pub count: i64,
    /// Length of the term in tokens, when the field records it.
    pub length: Option<i32>,
    /// Human-readable description, for fields with opaque term strings.
    pub description: Option<String>,
}

impl TermEntry {
    /// Create a dictionary entry without length or description.
    pub fn new<S: Into<String>>(term: S, count: i64) -> Self {
        TermEntry {
            term: term.into(),
            count,
            length: None,
            description: None,
        }
    }

    /// Set the term length.
    pub fn with_length(mut self, length: i32) -> Self {
        self.length = Some(length);
        self
    }

    /// Set the term description.
    pub fn with_description<S: Into<String>>(mut self, description: S) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Read access to an index.
pub trait IndexReader: Send + Sync + Debug {
    /// Check whether a document has been deleted from the index.
    fn is_deleted(&self, document_id: i64) -> bool;

    /// Load the stored content of a document.
    fn document(&self, document_id: i64) -> Result<DocumentData>;

    /// Length of a document in tokens.
    fn document_length(&self, document_id: i64) -> Result<usize> {
        Ok(self.document(document_id)?.tokens.len())
    }

    /// Average document length in tokens across the index.
    fn average_document_length(&self) -> f64;

    /// Term dictionary of a field, sorted by term string.
    fn dictionary(&self, field: &str) -> Result<Vec<TermEntry>>;

    /// Occurrences of `token` in the stored token streams, by document ID.
    fn token_postings(&self, token: &str) -> Result<Vec<Posting>>;
}
