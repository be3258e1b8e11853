//! Truncation of terms results.

use crate::engine::QueryEngine;
use crate::error::Result;
use crate::terms::result_set::TermsResultSet;
use crate::terms::sort::single_result;
use crate::terms::{CompoundTermsQuery, TermsQuery};

/// Keeps the first rows of one sub-query's result.
///
/// Unlike the limit of an [`IndexTermsQuery`](crate::terms::IndexTermsQuery),
/// which stops reading the dictionary early, this applies after the
/// sub-query has been fully combined. Wrapping a [`SortedTermsQuery`](crate::terms::SortedTermsQuery)
/// therefore gives the top rows by the sort criteria.
#[derive(Debug)]
pub struct LimitTermsQuery {
    subqueries: Vec<Box<dyn TermsQuery>>,
    limit: usize,
}

impl LimitTermsQuery {
    /// Keep at most `limit` rows of the result of `query`.
    pub fn new(query: Box<dyn TermsQuery>, limit: usize) -> Self {
        LimitTermsQuery {
            subqueries: vec![query],
            limit,
        }
    }

    /// The maximum number of rows.
    pub fn limit(&self) -> usize {
        self.limit
    }
}

impl TermsQuery for LimitTermsQuery {
    fn execute(&self, engine: &QueryEngine) -> Result<TermsResultSet> {
        let results = self.execute_subqueries(engine)?;
        self.combine(results)
    }
}

impl CompoundTermsQuery for LimitTermsQuery {
    fn subqueries(&self) -> &[Box<dyn TermsQuery>] {
        &self.subqueries
    }

    fn combine(&self, results: Vec<TermsResultSet>) -> Result<TermsResultSet> {
        let mut result = single_result(results, "a limit terms query")?;
        result.validate()?;
        result.truncate(self.limit);
        Ok(result)
    }
}
