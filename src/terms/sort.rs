//! Reordering of terms results.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::engine::QueryEngine;
use crate::error::{Result, SemsearchError};
use crate::terms::result_set::TermsResultSet;
use crate::terms::{CompoundTermsQuery, TermsQuery};

/// One sort criterion for [`SortedTermsQuery`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    /// Ascending count.
    CountAsc,
    /// Descending count.
    CountDesc,
    /// Ascending term string.
    String,
    /// Descending term string.
    StringDesc,
    /// Ascending description.
    Description,
    /// Descending description.
    DescriptionDesc,
}

impl SortOrder {
    /// Criteria used when none are given: most frequent first, then
    /// alphabetical.
    pub const DEFAULT: [SortOrder; 2] = [SortOrder::CountDesc, SortOrder::String];

    /// Compare two rows of `set`. Rows compare equal on a column the set
    /// does not have.
    pub fn compare(self, set: &TermsResultSet, a: usize, b: usize) -> Ordering {
        match self {
            SortOrder::CountAsc => compare_counts(set, a, b),
            SortOrder::CountDesc => compare_counts(set, b, a),
            SortOrder::String => set.term_strings[a].cmp(&set.term_strings[b]),
            SortOrder::StringDesc => set.term_strings[b].cmp(&set.term_strings[a]),
            SortOrder::Description => set.term_description(a).cmp(&set.term_description(b)),
            SortOrder::DescriptionDesc => set.term_description(b).cmp(&set.term_description(a)),
        }
    }
}

fn compare_counts(set: &TermsResultSet, a: usize, b: usize) -> Ordering {
    set.term_count(a).cmp(&set.term_count(b))
}

/// Sorts the result of one sub-query by a list of criteria; the first
/// criterion on which two rows differ decides their order.
#[derive(Debug)]
pub struct SortedTermsQuery {
    subqueries: Vec<Box<dyn TermsQuery>>,
    criteria: Vec<SortOrder>,
}

impl SortedTermsQuery {
    /// Sort the result of `query` by [`SortOrder::DEFAULT`].
    pub fn new(query: Box<dyn TermsQuery>) -> Self {
        Self::with_criteria(query, SortOrder::DEFAULT.to_vec())
    }

    /// Sort the result of `query` by `criteria`.
    pub fn with_criteria(query: Box<dyn TermsQuery>, criteria: Vec<SortOrder>) -> Self {
        SortedTermsQuery {
            subqueries: vec![query],
            criteria,
        }
    }

    /// The sort criteria, most significant first.
    pub fn criteria(&self) -> &[SortOrder] {
        &self.criteria
    }

    /// Sort `set` in place by `criteria`. Rows equal on every criterion
    /// keep their relative order.
    pub fn sort(set: &mut TermsResultSet, criteria: &[SortOrder]) {
        set.sort_rows_by(|set, a, b| {
            criteria
                .iter()
                .map(|criterion| criterion.compare(set, a, b))
                .find(|ordering| ordering.is_ne())
                .unwrap_or(Ordering::Equal)
        });
    }
}

/// Take the single result of a one-input compound query.
pub(crate) fn single_result(mut results: Vec<TermsResultSet>, name: &str) -> Result<TermsResultSet> {
    match (results.pop(), results.is_empty()) {
        (Some(result), true) => Ok(result),
        _ => Err(SemsearchError::invalid_argument(format!(
            "{name} combines exactly one result set"
        ))),
    }
}

impl TermsQuery for SortedTermsQuery {
    fn execute(&self, engine: &QueryEngine) -> Result<TermsResultSet> {
        let results = self.execute_subqueries(engine)?;
        self.combine(results)
    }
}

impl CompoundTermsQuery for SortedTermsQuery {
    fn subqueries(&self) -> &[Box<dyn TermsQuery>] {
        &self.subqueries
    }

    fn combine(&self, results: Vec<TermsResultSet>) -> Result<TermsResultSet> {
        let mut result = single_result(results, "a sorted terms query")?;
        result.validate()?;
        Self::sort(&mut result, &self.criteria);
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> TermsResultSet {
        TermsResultSet::from_terms(["a", "b", "c", "d"])
            .with_counts(vec![5, 9, 1, 5])
            .unwrap()
            .with_descriptions(vec!["zulu", "yankee", "xray", "alpha"])
            .unwrap()
    }

    #[test]
    fn test_default_criteria() {
        let mut set = sample();
        SortedTermsQuery::sort(&mut set, &SortOrder::DEFAULT);
        assert_eq!(set.term_strings, vec!["b", "a", "d", "c"]);
        assert_eq!(set.term_counts, Some(vec![9, 5, 5, 1]));
        assert_eq!(set.term_description(0), Some("yankee"));
    }

    #[test]
    fn test_tie_keeps_order_without_further_criteria() {
        let mut set = sample();
        SortedTermsQuery::sort(&mut set, &[SortOrder::CountAsc]);
        assert_eq!(set.term_strings, vec!["c", "a", "d", "b"]);
    }

    #[test]
    fn test_string_and_description_orders() {
        let mut set = sample();
        SortedTermsQuery::sort(&mut set, &[SortOrder::StringDesc]);
        assert_eq!(set.term_strings, vec!["d", "c", "b", "a"]);

        SortedTermsQuery::sort(&mut set, &[SortOrder::Description]);
        assert_eq!(set.term_strings, vec!["d", "c", "b", "a"]);

        SortedTermsQuery::sort(&mut set, &[SortOrder::DescriptionDesc]);
        assert_eq!(set.term_strings, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_missing_column_compares_equal() {
        let mut set = TermsResultSet::from_terms(["b", "a"]);
        SortedTermsQuery::sort(&mut set, &[SortOrder::CountDesc]);
        assert_eq!(set.term_strings, vec!["b", "a"]);
    }

    #[test]
    fn test_combine_requires_one_input() {
        #[derive(Debug)]
        struct Nothing;
        impl TermsQuery for Nothing {
            fn execute(&self, _: &QueryEngine) -> Result<TermsResultSet> {
                Ok(TermsResultSet::default())
            }
        }

        let query = SortedTermsQuery::new(Box::new(Nothing));
        assert!(query.combine(vec![]).is_err());
        assert!(query
            .combine(vec![TermsResultSet::default(), TermsResultSet::default()])
            .is_err());
        assert!(query.combine(vec![sample()]).is_ok());
    }
}
