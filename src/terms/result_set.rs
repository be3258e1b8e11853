//! Sorted sets of terms with optional per-term columns.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SemsearchError};
use crate::terms::counts::CountsStrategy;

/// The result of a terms query.
///
/// Rows are stored column-wise: `term_strings` is always present, every
/// other column is either absent or has one entry per row. Results of
/// executed queries are sorted ascending by term string.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TermsResultSet {
    /// The term strings.
    pub term_strings: Vec<String>,
    /// Length of each term in tokens.
    pub term_lengths: Option<Vec<i32>>,
    /// Number of documents containing each term; `<= 0` means unknown.
    pub term_counts: Option<Vec<i64>>,
    /// Human-readable description of each term.
    pub term_descriptions: Option<Vec<String>>,
    /// For grouped results, the raw term strings merged into each row,
    /// per source result set: `original_term_strings[row][source]`.
    pub original_term_strings: Option<Vec<Vec<Vec<String>>>>,
}

impl TermsResultSet {
    /// Create a result set with only term strings.
    pub fn new(term_strings: Vec<String>) -> Self {
        TermsResultSet {
            term_strings,
            ..Default::default()
        }
    }

    /// Create a result set from anything yielding term strings.
    pub fn from_terms<I, S>(terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(terms.into_iter().map(Into::into).collect())
    }

    /// Add the counts column.
    pub fn with_counts(mut self, counts: Vec<i64>) -> Result<Self> {
        self.check_column("term_counts", counts.len())?;
        self.term_counts = Some(counts);
        Ok(self)
    }

    /// Add the lengths column.
    pub fn with_lengths(mut self, lengths: Vec<i32>) -> Result<Self> {
        self.check_column("term_lengths", lengths.len())?;
        self.term_lengths = Some(lengths);
        Ok(self)
    }

    /// Add the descriptions column.
    pub fn with_descriptions<S: Into<String>>(mut self, descriptions: Vec<S>) -> Result<Self> {
        self.check_column("term_descriptions", descriptions.len())?;
        self.term_descriptions = Some(descriptions.into_iter().map(Into::into).collect());
        Ok(self)
    }

    /// Add the original term strings column.
    pub fn with_original_term_strings(mut self, originals: Vec<Vec<Vec<String>>>) -> Result<Self> {
        self.check_column("original_term_strings", originals.len())?;
        self.original_term_strings = Some(originals);
        Ok(self)
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.term_strings.len()
    }

    /// Check if the result set has no rows.
    pub fn is_empty(&self) -> bool {
        self.term_strings.is_empty()
    }

    /// Count of the term in `row`, if counts are present.
    pub fn term_count(&self, row: usize) -> Option<i64> {
        self.term_counts.as_ref().and_then(|c| c.get(row).copied())
    }

    /// Description of the term in `row`, if descriptions are present.
    pub fn term_description(&self, row: usize) -> Option<&str> {
        self.term_descriptions
            .as_ref()
            .and_then(|d| d.get(row))
            .map(String::as_str)
    }

    /// Check that every present column has one entry per row.
    pub fn validate(&self) -> Result<()> {
        if let Some(lengths) = &self.term_lengths {
            self.check_column("term_lengths", lengths.len())?;
        }
        if let Some(counts) = &self.term_counts {
            self.check_column("term_counts", counts.len())?;
        }
        if let Some(descriptions) = &self.term_descriptions {
            self.check_column("term_descriptions", descriptions.len())?;
        }
        if let Some(originals) = &self.original_term_strings {
            self.check_column("original_term_strings", originals.len())?;
        }
        Ok(())
    }

    /// Check that term strings are strictly ascending.
    pub fn is_sorted(&self) -> bool {
        self.term_strings.windows(2).all(|pair| pair[0] < pair[1])
    }

    /// Sort every column by term string, ascending.
    pub fn sort_by_term_string(&mut self) {
        if self.is_sorted() {
            return;
        }
        let mut order: Vec<usize> = (0..self.len()).collect();
        order.sort_by(|&a, &b| self.term_strings[a].cmp(&self.term_strings[b]));
        self.permute(&order);
    }

    /// Stable sort of every column by `compare` over row indexes.
    pub(crate) fn sort_rows_by<F>(&mut self, mut compare: F)
    where
        F: FnMut(&Self, usize, usize) -> Ordering,
    {
        let mut order: Vec<usize> = (0..self.len()).collect();
        order.sort_by(|&a, &b| compare(self, a, b));
        self.permute(&order);
    }

    /// Keep only the first `len` rows.
    pub fn truncate(&mut self, len: usize) {
        self.term_strings.truncate(len);
        if let Some(lengths) = self.term_lengths.as_mut() {
            lengths.truncate(len);
        }
        if let Some(counts) = self.term_counts.as_mut() {
            counts.truncate(len);
        }
        if let Some(descriptions) = self.term_descriptions.as_mut() {
            descriptions.truncate(len);
        }
        if let Some(originals) = self.original_term_strings.as_mut() {
            originals.truncate(len);
        }
    }

    /// Merge the rows of `sets` that share a description into one row per
    /// distinct description.
    ///
    /// The output is sorted by description and uses the description as its
    /// term string. Counts are summed when every input has counts; lengths
    /// are kept when every input has lengths. `original_term_strings[row]`
    /// has one entry per input holding the raw terms merged into the row. An
    /// input that is itself grouped contributes its original terms rather
    /// than its descriptions.
    pub fn group_by_description(sets: &[TermsResultSet]) -> Result<TermsResultSet> {
        #[derive(Default)]
        struct Group {
            counts: Vec<i64>,
            length: Option<i32>,
            originals: Vec<Vec<String>>,
        }

        let with_counts = sets.iter().all(|s| s.term_counts.is_some());
        let with_lengths = sets.iter().all(|s| s.term_lengths.is_some());

        let mut groups: BTreeMap<&str, Group> = BTreeMap::new();
        for (source, set) in sets.iter().enumerate() {
            set.validate()?;
            let descriptions = set.term_descriptions.as_ref().ok_or_else(|| {
                SemsearchError::invalid_argument(format!(
                    "result set {source} has no descriptions to group by"
                ))
            })?;

            for (row, description) in descriptions.iter().enumerate() {
                let group = groups.entry(description.as_str()).or_insert_with(|| Group {
                    originals: vec![Vec::new(); sets.len()],
                    ..Group::default()
                });
                let merged = &mut group.originals[source];
                match set.original_term_strings.as_ref() {
                    Some(originals) => merged.extend(originals[row].iter().flatten().cloned()),
                    None => merged.push(set.term_strings[row].clone()),
                }
                if let Some(count) = set.term_count(row) {
                    group.counts.push(count);
                }
                if group.length.is_none() {
                    group.length = set.term_lengths.as_ref().map(|l| l[row]);
                }
            }
        }

        let mut result = TermsResultSet::default();
        let mut counts = Vec::with_capacity(groups.len());
        let mut lengths = Vec::with_capacity(groups.len());
        let mut descriptions = Vec::with_capacity(groups.len());
        let mut originals = Vec::with_capacity(groups.len());
        for (description, group) in groups {
            result.term_strings.push(description.to_string());
            descriptions.push(description.to_string());
            counts.push(CountsStrategy::Sum.combine(group.counts));
            lengths.push(group.length.unwrap_or_default());
            originals.push(group.originals);
        }
        result.term_descriptions = Some(descriptions);
        result.original_term_strings = Some(originals);
        result.term_counts = with_counts.then_some(counts);
        result.term_lengths = with_lengths.then_some(lengths);
        Ok(result)
    }

    /// Reorder every column so that row `i` becomes old row `order[i]`.
    pub(crate) fn permute(&mut self, order: &[usize]) {
        fn apply<T: Clone>(column: &mut Vec<T>, order: &[usize]) {
            *column = order.iter().map(|&i| column[i].clone()).collect();
        }

        apply(&mut self.term_strings, order);
        if let Some(lengths) = self.term_lengths.as_mut() {
            apply(lengths, order);
        }
        if let Some(counts) = self.term_counts.as_mut() {
            apply(counts, order);
        }
        if let Some(descriptions) = self.term_descriptions.as_mut() {
            apply(descriptions, order);
        }
        if let Some(originals) = self.original_term_strings.as_mut() {
            apply(originals, order);
        }
    }

    fn check_column(&self, name: &str, len: usize) -> Result<()> {
        if len != self.term_strings.len() {
            return Err(SemsearchError::invalid_argument(format!(
                "{name} has {len} entries for {} terms",
                self.term_strings.len()
            )));
        }
        Ok(())
    }
}

/// Accumulates the rows of a combined result set.
///
/// Each column is enabled up front; values for disabled columns are
/// dropped, missing values for enabled ones are filled with defaults.
#[derive(Debug)]
pub(crate) struct ResultBuilder {
    result: TermsResultSet,
}

impl ResultBuilder {
    pub(crate) fn new(lengths: bool, counts: bool, descriptions: bool, originals: bool) -> Self {
        ResultBuilder {
            result: TermsResultSet {
                term_strings: Vec::new(),
                term_lengths: lengths.then(Vec::new),
                term_counts: counts.then(Vec::new),
                term_descriptions: descriptions.then(Vec::new),
                original_term_strings: originals.then(Vec::new),
            },
        }
    }

    pub(crate) fn push(
        &mut self,
        term: &str,
        length: Option<i32>,
        count: Option<i64>,
        description: Option<&str>,
        originals: Option<Vec<Vec<String>>>,
    ) {
        let result = &mut self.result;
        result.term_strings.push(term.to_string());
        if let Some(lengths) = result.term_lengths.as_mut() {
            lengths.push(length.unwrap_or_default());
        }
        if let Some(counts) = result.term_counts.as_mut() {
            counts.push(count.unwrap_or_default());
        }
        if let Some(descriptions) = result.term_descriptions.as_mut() {
            descriptions.push(description.unwrap_or(term).to_string());
        }
        if let Some(column) = result.original_term_strings.as_mut() {
            column.push(originals.unwrap_or_default());
        }
    }

    pub(crate) fn finish(self) -> TermsResultSet {
        self.result
    }
}

/// Fail unless every input is sorted ascending by term string.
pub(crate) fn check_sorted(sets: &[TermsResultSet]) -> Result<()> {
    for (index, set) in sets.iter().enumerate() {
        set.validate()?;
        if !set.is_sorted() {
            return Err(SemsearchError::invalid_argument(format!(
                "result set {index} is not sorted by term string"
            )));
        }
    }
    Ok(())
}
