//! Terms queries.
//!
//! A terms query selects terms from an index's term dictionaries rather than
//! documents, for autocompletion or facet listings. Leaf queries read one
//! field's dictionary; compound queries combine the sorted results of their
//! sub-queries:
//!
//! - [`AndTermsQuery`]: terms present in every sub-result.
//! - [`OrTermsQuery`]: terms present in any sub-result.
//! - [`SortedTermsQuery`]: reorders one sub-result.
//! - [`LimitTermsQuery`]: keeps the first rows of one sub-result.
//!
//! Compound queries expose [`CompoundTermsQuery::combine`] so results
//! computed elsewhere, for example on other indexes, can be merged without
//! re-executing anything.

pub mod and;
pub mod counts;
pub mod index_terms;
pub mod limit;
pub mod or;
pub mod result_set;
pub mod sort;

use std::fmt::Debug;

use crate::engine::QueryEngine;
use crate::error::Result;

pub use and::AndTermsQuery;
pub use counts::CountsStrategy;
pub use index_terms::IndexTermsQuery;
pub use limit::LimitTermsQuery;
pub use or::OrTermsQuery;
pub use result_set::TermsResultSet;
pub use sort::{SortOrder, SortedTermsQuery};

/// A query producing a [`TermsResultSet`] sorted by term string.
pub trait TermsQuery: Send + Sync + Debug {
    /// Execute the query on `engine`.
    fn execute(&self, engine: &QueryEngine) -> Result<TermsResultSet>;
}

/// A terms query combining the results of sub-queries.
pub trait CompoundTermsQuery: TermsQuery {
    /// The sub-queries whose results are combined.
    fn subqueries(&self) -> &[Box<dyn TermsQuery>];

    /// Combine already computed sub-results, in sub-query order.
    fn combine(&self, results: Vec<TermsResultSet>) -> Result<TermsResultSet>;

    /// Execute every sub-query on `engine` and collect the results.
    fn execute_subqueries(&self, engine: &QueryEngine) -> Result<Vec<TermsResultSet>> {
        self.subqueries()
            .iter()
            .map(|query| query.execute(engine))
            .collect()
    }
}
