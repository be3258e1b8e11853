//! Intersection of terms results.

use crate::engine::QueryEngine;
use crate::error::Result;
use crate::terms::counts::CountsStrategy;
use crate::terms::result_set::{ResultBuilder, TermsResultSet, check_sorted};
use crate::terms::{CompoundTermsQuery, TermsQuery};

/// Terms present in the results of every sub-query.
///
/// Counts of a matched term are combined with the query's
/// [`CountsStrategy`], or the engine's default when none was set. Lengths,
/// descriptions and original term strings are taken from the first
/// sub-result that has them.
#[derive(Debug)]
pub struct AndTermsQuery {
    subqueries: Vec<Box<dyn TermsQuery>>,
    strategy: Option<CountsStrategy>,
}

impl AndTermsQuery {
    /// Create an intersection of `subqueries`.
    pub fn new(subqueries: Vec<Box<dyn TermsQuery>>) -> Self {
        AndTermsQuery {
            subqueries,
            strategy: None,
        }
    }

    /// Combine counts with `strategy`.
    pub fn with_strategy(mut self, strategy: CountsStrategy) -> Self {
        self.strategy = Some(strategy);
        self
    }

    /// Intersect `results` using `strategy` for counts.
    ///
    /// The inputs must be sorted by term string. Cursors skip ahead with a
    /// binary search over the remaining terms, so no input is rescanned.
    pub fn intersect(results: &[TermsResultSet], strategy: CountsStrategy) -> Result<TermsResultSet> {
        check_sorted(results)?;
        let mut builder = ResultBuilder::new(
            results.iter().any(|r| r.term_lengths.is_some()),
            results.iter().any(|r| r.term_counts.is_some()),
            results.iter().any(|r| r.term_descriptions.is_some()),
            results.iter().any(|r| r.original_term_strings.is_some()),
        );
        if results.is_empty() || results.iter().any(TermsResultSet::is_empty) {
            return Ok(builder.finish());
        }

        let sets = results.len();
        let mut cursors = vec![0usize; sets];
        let mut candidate = results[0].term_strings[0].as_str();
        let mut agreeing = 1;
        let mut current = 1 % sets;

        loop {
            if agreeing == sets {
                emit_row(&mut builder, results, &cursors, candidate, strategy);
                for cursor in cursors.iter_mut() {
                    *cursor += 1;
                }
                if results.iter().zip(&cursors).any(|(r, &c)| c >= r.len()) {
                    break;
                }
                candidate = results[0].term_strings[cursors[0]].as_str();
                agreeing = 1;
                current = 1 % sets;
                continue;
            }

            let terms = &results[current].term_strings;
            let skip = terms[cursors[current]..].partition_point(|t| t.as_str() < candidate);
            let position = cursors[current] + skip;
            if position >= terms.len() {
                break;
            }
            cursors[current] = position;

            if terms[position] == candidate {
                agreeing += 1;
            } else {
                candidate = terms[position].as_str();
                agreeing = 1;
            }
            current = (current + 1) % sets;
        }
        Ok(builder.finish())
    }
}

fn emit_row(
    builder: &mut ResultBuilder,
    results: &[TermsResultSet],
    cursors: &[usize],
    term: &str,
    strategy: CountsStrategy,
) {
    let rows = || results.iter().zip(cursors.iter().copied());
    let length = rows().find_map(|(r, row)| r.term_lengths.as_ref().map(|l| l[row]));
    let description = rows().find_map(|(r, row)| r.term_description(row));
    let originals = rows().find_map(|(r, row)| {
        r.original_term_strings
            .as_ref()
            .map(|o| o[row].clone())
    });
    let count = strategy.combine(rows().filter_map(|(r, row)| r.term_count(row)));
    builder.push(term, length, Some(count), description, originals);
}

impl TermsQuery for AndTermsQuery {
    fn execute(&self, engine: &QueryEngine) -> Result<TermsResultSet> {
        let results = self.execute_subqueries(engine)?;
        let strategy = self
            .strategy
            .unwrap_or(engine.config().default_counts_strategy);
        Self::intersect(&results, strategy)
    }
}

impl CompoundTermsQuery for AndTermsQuery {
    fn subqueries(&self) -> &[Box<dyn TermsQuery>] {
        &self.subqueries
    }

    fn combine(&self, results: Vec<TermsResultSet>) -> Result<TermsResultSet> {
        Self::intersect(&results, self.strategy.unwrap_or_default())
    }
}
