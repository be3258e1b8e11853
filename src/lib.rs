//! # Semsearch
//!
//! Ranking, pagination and merging of semantic search results.
//!
//! ## Features
//!
//! - Rank-addressable result lists that fill in while the query is running
//! - Incremental top-k ranking with a deterministic tie-break
//! - Lazy hit collection, at most once per document
//! - Federation of several indexes into one ranked list
//! - Terms queries with AND/OR/sort/limit composition
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use semsearch::prelude::*;
//!
//! # fn main() -> semsearch::error::Result<()> {
//! let mut index = MemoryIndex::new();
//! index.add_document("mem://a", "A", "semantic search engine");
//! index.add_document("mem://b", "B", "search search search");
//! let index = Arc::new(index);
//!
//! let engine = QueryEngine::builder(index.clone())
//!     .scorer_source(HitCountScorer::source())
//!     .build()?;
//! let runner = engine.query_runner(Arc::new(index.token_query("search")?))?;
//!
//! assert_eq!(runner.documents_count_sync()?, 2);
//! assert_eq!(runner.document_uri(0)?, "mem://b");
//! runner.close()?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod index;
pub mod query;
pub mod render;
pub mod runner;
pub mod terms;

pub mod prelude {
    pub use crate::config::EngineConfig;
    pub use crate::engine::{FederatedEngine, QueryEngine};
    pub use crate::error::{Result, SemsearchError};
    pub use crate::index::memory::MemoryIndex;
    pub use crate::index::{DocumentData, IndexReader, TermEntry};
    pub use crate::query::postings::{Posting, PostingsQuery, TokenQuery};
    pub use crate::query::scorer::{Bm25Scorer, HitCountScorer, Scorer, ScorerSource};
    pub use crate::query::{Binding, QueryExecutor, QueryNode};
    pub use crate::runner::federated::FederatedQueryRunner;
    pub use crate::runner::ranking::RankingQueryRunner;
    pub use crate::runner::{QueryRunner, UNKNOWN_COUNT};
    pub use crate::terms::{
        AndTermsQuery, CompoundTermsQuery, CountsStrategy, IndexTermsQuery, LimitTermsQuery,
        OrTermsQuery, SortOrder, SortedTermsQuery, TermsQuery, TermsResultSet,
    };
}

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
