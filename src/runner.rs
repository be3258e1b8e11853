//! Rank-addressable result lists.
//!
//! A [`QueryRunner`] turns the stream of documents matching a query into a
//! list addressed by rank, 0 being the best document. Results become
//! available incrementally: accessors for ranks that are not computed yet
//! block the calling thread until the runner's background work produces
//! them, and never return partial data.
//!
//! Two implementations exist:
//!
//! - [`RankingQueryRunner`](ranking::RankingQueryRunner) executes a query on
//!   one index, optionally ranking the documents by score.
//! - [`FederatedQueryRunner`](federated::FederatedQueryRunner) merges several
//!   runners, each over its own index, into one ranked list.

pub mod federated;
pub(crate) mod future;
pub(crate) mod interval;
pub mod ranker;
pub mod ranking;

use std::fmt::Write;

use crate::error::{Result, SemsearchError};
use crate::query::Binding;

/// Returned by [`QueryRunner::documents_count`] while the count is unknown.
pub const UNKNOWN_COUNT: i64 = -1;

/// Rank-indexed access to the results of a query.
///
/// All rank-taking methods fail with [`SemsearchError::OutOfBounds`] for
/// `rank < 0` or `rank >= documents_current_count()`, and with
/// [`SemsearchError::Closed`] once the runner has been closed.
pub trait QueryRunner: Send + Sync {
    /// Total number of result documents, or [`UNKNOWN_COUNT`] while the
    /// documents are still being enumerated.
    fn documents_count(&self) -> Result<i64>;

    /// Total number of result documents, blocking until it is known.
    fn documents_count_sync(&self) -> Result<i64>;

    /// Number of result documents discovered so far. Never decreases.
    fn documents_current_count(&self) -> Result<i64>;

    /// ID of the document at `rank`.
    fn document_id(&self, rank: i64) -> Result<i64>;

    /// Score of the document at `rank`.
    fn document_score(&self, rank: i64) -> Result<f64>;

    /// Hits of the document at `rank`.
    fn document_hits(&self, rank: i64) -> Result<Vec<Binding>>;

    /// Tokens `[term_position, term_position + length)` of the document at
    /// `rank`, clamped to the document.
    fn document_text(&self, rank: i64, term_position: usize, length: usize)
    -> Result<Vec<String>>;

    /// URI of the document at `rank`.
    fn document_uri(&self, rank: i64) -> Result<String>;

    /// Title of the document at `rank`.
    fn document_title(&self, rank: i64) -> Result<String>;

    /// A metadata field of the document at `rank`, if the document has it.
    fn document_metadata_field(&self, rank: i64, field: &str)
    -> Result<Option<serde_json::Value>>;

    /// Render the document at `rank`, with its hits highlighted, to `out`.
    fn render_document(&self, rank: i64, out: &mut dyn Write) -> Result<()>;

    /// Stop background work and release resources. Closing twice is a no-op.
    fn close(&self) -> Result<()>;

    /// Check if the runner has been closed.
    fn is_closed(&self) -> bool;
}

/// Validate `rank` against the number of documents known so far.
pub(crate) fn check_rank(rank: i64, current_count: i64) -> Result<usize> {
    if rank < 0 || rank >= current_count {
        return Err(SemsearchError::out_of_bounds(rank, current_count));
    }
    Ok(rank as usize)
}
