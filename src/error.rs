//! Error types for the semsearch library.
//!
//! All fallible operations return [`Result`], whose error side is the
//! [`SemsearchError`] enum. The variants follow the failure classes of the
//! result engine: bounds errors on rank-taking accessors, faults raised by a
//! runner's background worker, consistency faults between collaborators, and
//! use of a runner after it was closed.
//!
//! # Examples
//!
//! ```
//! use semsearch::error::{Result, SemsearchError};
//!
//! fn example_operation() -> Result<()> {
//!     Err(SemsearchError::invalid_argument("block size must be positive"))
//! }
//!
//! match example_operation() {
//!     Ok(_) => println!("Success"),
//!     Err(e) => eprintln!("Error: {}", e),
//! }
//! ```

use std::io;

use thiserror::Error;

/// The main error type for semsearch operations.
#[derive(Error, Debug)]
pub enum SemsearchError {
    /// A rank or document index outside the currently valid range.
    #[error("Rank {rank} out of bounds (count: {count})")]
    OutOfBounds {
        /// The rank that was requested.
        rank: i64,
        /// The document count the rank was checked against.
        count: i64,
    },

    /// A background task failed; delivered to every caller waiting on it.
    #[error("Background task failed: {0}")]
    Background(String),

    /// Two collaborators disagree about the state of a result set.
    #[error("Consistency error: {0}")]
    Consistency(String),

    /// The runner or engine was closed before or during the call.
    #[error("Closed: {0}")]
    Closed(String),

    /// I/O errors (configuration files, document stores, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid regular expression in a terms filter
    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    /// Index-related errors
    #[error("Index error: {0}")]
    Index(String),

    /// Query-related errors
    #[error("Query error: {0}")]
    Query(String),

    /// Invalid argument
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Generic error for other cases
    #[error("Error: {0}")]
    Other(String),
}

/// Result type alias for operations that may fail with SemsearchError.
pub type Result<T> = std::result::Result<T, SemsearchError>;

impl SemsearchError {
    /// Create a new bounds error.
    pub fn out_of_bounds(rank: i64, count: i64) -> Self {
        SemsearchError::OutOfBounds { rank, count }
    }

    /// Create a new background task error.
    pub fn background<S: Into<String>>(msg: S) -> Self {
        SemsearchError::Background(msg.into())
    }

    /// Create a new consistency error.
    pub fn consistency<S: Into<String>>(msg: S) -> Self {
        SemsearchError::Consistency(msg.into())
    }

    /// Create a new closed error.
    pub fn closed<S: Into<String>>(msg: S) -> Self {
        SemsearchError::Closed(msg.into())
    }

    /// Create a new index error.
    pub fn index<S: Into<String>>(msg: S) -> Self {
        SemsearchError::Index(msg.into())
    }

    /// Create a new query error.
    pub fn query<S: Into<String>>(msg: S) -> Self {
        SemsearchError::Query(msg.into())
    }

    /// Create a new invalid argument error.
    pub fn invalid_argument<S: Into<String>>(msg: S) -> Self {
        SemsearchError::InvalidArgument(msg.into())
    }

    /// Create a new invalid config error.
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        SemsearchError::InvalidArgument(format!("Invalid configuration: {}", msg.into()))
    }

    /// Create a new generic error.
    pub fn other<S: Into<String>>(msg: S) -> Self {
        SemsearchError::Other(msg.into())
    }

    /// Returns true for errors caused by a closed runner.
    pub fn is_closed(&self) -> bool {
        matches!(self, SemsearchError::Closed(_))
    }

    /// Returns true for bounds errors.
    pub fn is_out_of_bounds(&self) -> bool {
        matches!(self, SemsearchError::OutOfBounds { .. })
    }
}
