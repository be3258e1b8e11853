//! Union of terms results.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use crate::engine::QueryEngine;
use crate::error::Result;
use crate::terms::counts::CountsStrategy;
use crate::terms::result_set::{ResultBuilder, TermsResultSet, check_sorted};
use crate::terms::{CompoundTermsQuery, TermsQuery};

/// Terms present in the result of any sub-query.
///
/// Counts of a term found in several sub-results are combined with the
/// query's [`CountsStrategy`], or the engine's default when none was set.
/// A column is kept only when every sub-result has it.
#[derive(Debug)]
pub struct OrTermsQuery {
    subqueries: Vec<Box<dyn TermsQuery>>,
    strategy: Option<CountsStrategy>,
}

impl OrTermsQuery {
    /// Create a union of `subqueries`.
    pub fn new(subqueries: Vec<Box<dyn TermsQuery>>) -> Self {
        OrTermsQuery {
            subqueries,
            strategy: None,
        }
    }

    /// Combine counts with `strategy`.
    pub fn with_strategy(mut self, strategy: CountsStrategy) -> Self {
        self.strategy = Some(strategy);
        self
    }

    /// Merge `results` using `strategy` for counts. The inputs must be
    /// sorted by term string.
    pub fn union(results: &[TermsResultSet], strategy: CountsStrategy) -> Result<TermsResultSet> {
        check_sorted(results)?;
        let all = |has: fn(&TermsResultSet) -> bool| !results.is_empty() && results.iter().all(has);
        let mut builder = ResultBuilder::new(
            all(|r| r.term_lengths.is_some()),
            all(|r| r.term_counts.is_some()),
            all(|r| r.term_descriptions.is_some()),
            all(|r| r.original_term_strings.is_some()),
        );

        // (term, set, row), smallest term first; equal terms pop in set order
        let mut heap: BinaryHeap<Reverse<(&str, usize, usize)>> = results
            .iter()
            .enumerate()
            .filter(|(_, r)| !r.is_empty())
            .map(|(set, r)| Reverse((r.term_strings[0].as_str(), set, 0)))
            .collect();

        let mut matched: Vec<(usize, usize)> = Vec::with_capacity(results.len());
        while let Some(Reverse((term, set, row))) = heap.pop() {
            matched.clear();
            matched.push((set, row));
            while let Some(&Reverse((next, other, other_row))) = heap.peek() {
                if next != term {
                    break;
                }
                heap.pop();
                matched.push((other, other_row));
            }

            emit_row(&mut builder, results, &matched, term, strategy);

            for &(set, row) in &matched {
                if let Some(next) = results[set].term_strings.get(row + 1) {
                    heap.push(Reverse((next.as_str(), set, row + 1)));
                }
            }
        }
        Ok(builder.finish())
    }
}

fn emit_row(
    builder: &mut ResultBuilder,
    results: &[TermsResultSet],
    matched: &[(usize, usize)],
    term: &str,
    strategy: CountsStrategy,
) {
    let rows = || matched.iter().map(|&(set, row)| (&results[set], row));
    let length = rows().find_map(|(r, row)| r.term_lengths.as_ref().map(|l| l[row]));
    let description = rows().find_map(|(r, row)| r.term_description(row));
    let count = strategy.combine(rows().filter_map(|(r, row)| r.term_count(row)));

    // element-wise union of the per-source original terms
    let mut originals: Vec<Vec<String>> = Vec::new();
    for (r, row) in rows() {
        let Some(sources) = r.original_term_strings.as_ref().map(|o| &o[row]) else {
            continue;
        };
        if originals.len() < sources.len() {
            originals.resize_with(sources.len(), Vec::new);
        }
        for (merged, terms) in originals.iter_mut().zip(sources) {
            for original in terms {
                if !merged.contains(original) {
                    merged.push(original.clone());
                }
            }
        }
    }

    builder.push(term, length, Some(count), description, Some(originals));
}

impl TermsQuery for OrTermsQuery {
    fn execute(&self, engine: &QueryEngine) -> Result<TermsResultSet> {
        let results = self.execute_subqueries(engine)?;
        let strategy = self
            .strategy
            .unwrap_or(engine.config().default_counts_strategy);
        Self::union(&results, strategy)
    }
}

impl CompoundTermsQuery for OrTermsQuery {
    fn subqueries(&self) -> &[Box<dyn TermsQuery>] {
        &self.subqueries
    }

    fn combine(&self, results: Vec<TermsResultSet>) -> Result<TermsResultSet> {
        Self::union(&results, self.strategy.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::BTreeSet;

    #[test]
    fn test_union() {
        let a = TermsResultSet::from_terms(["a", "b", "c"]);
        let b = TermsResultSet::from_terms(["b", "c", "d"]);
        let result = OrTermsQuery::union(&[a, b], CountsStrategy::First).unwrap();
        assert_eq!(result.term_strings, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_counts_combined_per_strategy() {
        let sets = [
            TermsResultSet::from_terms(["a", "m"]).with_counts(vec![3, 1]).unwrap(),
            TermsResultSet::from_terms(["m"]).with_counts(vec![0]).unwrap(),
            TermsResultSet::from_terms(["m", "z"]).with_counts(vec![7, 2]).unwrap(),
        ];
        let sum = OrTermsQuery::union(&sets, CountsStrategy::Sum).unwrap();
        assert_eq!(sum.term_strings, vec!["a", "m", "z"]);
        assert_eq!(sum.term_counts, Some(vec![3, 8, 2]));

        let first = OrTermsQuery::union(&sets, CountsStrategy::First).unwrap();
        assert_eq!(first.term_counts, Some(vec![3, 1, 2]));
        let max = OrTermsQuery::union(&sets, CountsStrategy::Max).unwrap();
        assert_eq!(max.term_counts, Some(vec![3, 7, 2]));
    }

    #[test]
    fn test_partial_column_dropped() {
        let counted = TermsResultSet::from_terms(["a"]).with_counts(vec![4]).unwrap();
        let plain = TermsResultSet::from_terms(["b"]);
        let result = OrTermsQuery::union(&[counted, plain], CountsStrategy::Sum).unwrap();
        assert_eq!(result.term_strings, vec!["a", "b"]);
        assert!(result.term_counts.is_none());
    }

    #[test]
    fn test_originals_merged_per_source() {
        let first = TermsResultSet::from_terms(["Paris"])
            .with_original_term_strings(vec![vec![vec!["q1".to_string()], vec![]]])
            .unwrap();
        let second = TermsResultSet::from_terms(["Paris"])
            .with_original_term_strings(vec![vec![vec![], vec!["x9".to_string()]]])
            .unwrap();
        let result = OrTermsQuery::union(&[first, second], CountsStrategy::First).unwrap();
        assert_eq!(
            result.original_term_strings,
            Some(vec![vec![vec!["q1".to_string()], vec!["x9".to_string()]]])
        );
    }

    proptest! {
        #[test]
        fn prop_or_is_union(
            sets in prop::collection::vec(prop::collection::btree_set("[a-f]{1,2}", 0..20), 0..5)
        ) {
            let results: Vec<TermsResultSet> = sets
                .iter()
                .map(|s| TermsResultSet::from_terms(s.iter().cloned()))
                .collect();
            let combined = OrTermsQuery::union(&results, CountsStrategy::First).unwrap();

            let expected: BTreeSet<String> = sets.iter().flatten().cloned().collect();
            prop_assert_eq!(combined.term_strings, expected.into_iter().collect::<Vec<_>>());
        }
    }
}
