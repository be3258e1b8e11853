//! Query execution interfaces consumed by the result runners.
//!
//! A [`QueryNode`] is a parsed query that can be executed any number of times;
//! every execution yields a fresh, forward-only [`QueryExecutor`]. Executors
//! enumerate matching documents in strictly ascending ID order and, for the
//! current document, the [`Binding`]s (hit spans) that matched.

pub mod postings;
pub mod scorer;

use std::fmt::Debug;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::index::IndexReader;

/// Returned by [`QueryExecutor::next_document`] once no documents remain.
pub const NO_MORE_DOCUMENTS: i64 = -1;

/// A single match occurrence inside a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Binding {
    /// The document containing the match.
    pub document_id: i64,
    /// Position of the first matched token.
    pub term_position: usize,
    /// Number of matched tokens.
    pub length: usize,
}

impl Binding {
    /// Create a new binding.
    pub fn new(document_id: i64, term_position: usize, length: usize) -> Self {
        Binding {
            document_id,
            term_position,
            length,
        }
    }

    /// Position one past the last matched token.
    pub fn end_position(&self) -> usize {
        self.term_position + self.length
    }

    /// Check whether this binding covers the given token position.
    pub fn covers(&self, position: usize) -> bool {
        position >= self.term_position && position < self.end_position()
    }
}

/// Forward-only enumeration of the documents and hits matching a query.
pub trait QueryExecutor: Send {
    /// Advance to the next matching document with an ID strictly greater
    /// than `greater_than` (and than the current document). Returns
    /// [`NO_MORE_DOCUMENTS`] when the executor is exhausted.
    fn next_document(&mut self, greater_than: i64) -> Result<i64>;

    /// Return the next hit for the current document, or `None` once the
    /// current document's hits are drained.
    fn next_hit(&mut self) -> Result<Option<Binding>>;

    /// The document most recently returned by `next_document`, or
    /// [`NO_MORE_DOCUMENTS`] before the first call.
    fn latest_document(&self) -> i64;

    /// Check if this executor has run past its last document.
    fn is_exhausted(&self) -> bool;

    /// Release any resources held by this executor.
    fn close(&mut self) -> Result<()>;
}

/// A query that can be executed repeatedly against an index.
pub trait QueryNode: Send + Sync + Debug {
    /// Create a fresh executor positioned before the first document.
    fn executor(&self, index: &dyn IndexReader) -> Result<Box<dyn QueryExecutor>>;

    /// Get a human-readable description of this query.
    fn description(&self) -> String;
}

/// Drain every remaining hit of the executor's current document.
pub fn collect_hits(executor: &mut dyn QueryExecutor) -> Result<Vec<Binding>> {
    let mut hits = Vec::new();
    while let Some(hit) = executor.next_hit()? {
        hits.push(hit);
    }
    Ok(hits)
}
