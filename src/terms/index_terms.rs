//! Terms read from an index's term dictionary.

use ahash::AHashSet;
use regex::Regex;

use crate::engine::QueryEngine;
use crate::error::Result;
use crate::index::TermEntry;
use crate::terms::TermsQuery;
use crate::terms::result_set::TermsResultSet;

/// Which stop words an [`IndexTermsQuery`] removes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum StopWords {
    /// Keep every term.
    #[default]
    None,
    /// Remove the engine's default stop words.
    EngineDefault,
    /// Remove the given words.
    Custom(Vec<String>),
}

/// Selects terms from the dictionary of one field.
///
/// # Examples
///
/// ```
/// use semsearch::terms::IndexTermsQuery;
///
/// let query = IndexTermsQuery::new("token")
///     .prefix("sem")
///     .with_counts(true)
///     .limit(10);
/// assert_eq!(query.field(), "token");
/// ```
#[derive(Debug, Clone)]
pub struct IndexTermsQuery {
    field: String,
    prefix: Option<String>,
    pattern: Option<Regex>,
    stop_words: StopWords,
    counts: bool,
    descriptions: bool,
    limit: Option<usize>,
}

impl IndexTermsQuery {
    /// Select every term of `field`.
    pub fn new<S: Into<String>>(field: S) -> Self {
        IndexTermsQuery {
            field: field.into(),
            prefix: None,
            pattern: None,
            stop_words: StopWords::None,
            counts: false,
            descriptions: false,
            limit: None,
        }
    }

    /// Keep only terms starting with `prefix`.
    pub fn prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Keep only terms matching the regular expression `pattern`.
    pub fn pattern(mut self, pattern: &str) -> Result<Self> {
        self.pattern = Some(Regex::new(pattern)?);
        Ok(self)
    }

    /// Remove stop words from the result.
    pub fn stop_words(mut self, stop_words: StopWords) -> Self {
        self.stop_words = stop_words;
        self
    }

    /// Include document counts.
    pub fn with_counts(mut self, counts: bool) -> Self {
        self.counts = counts;
        self
    }

    /// Include term descriptions.
    pub fn with_descriptions(mut self, descriptions: bool) -> Self {
        self.descriptions = descriptions;
        self
    }

    /// Stop after `limit` terms have been selected.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// The field whose dictionary is read.
    pub fn field(&self) -> &str {
        &self.field
    }

    fn selected<'a>(
        &self,
        entries: &'a [TermEntry],
        stop_words: &AHashSet<&str>,
    ) -> Vec<&'a TermEntry> {
        // the dictionary is sorted, so prefix matches are contiguous
        let start = match &self.prefix {
            Some(prefix) => entries.partition_point(|e| e.term.as_str() < prefix.as_str()),
            None => 0,
        };

        entries[start..]
            .iter()
            .take_while(|e| {
                self.prefix
                    .as_ref()
                    .is_none_or(|prefix| e.term.starts_with(prefix.as_str()))
            })
            .filter(|e| !stop_words.contains(e.term.as_str()))
            .filter(|e| self.pattern.as_ref().is_none_or(|p| p.is_match(&e.term)))
            .take(self.limit.unwrap_or(usize::MAX))
            .collect()
    }
}

impl TermsQuery for IndexTermsQuery {
    fn execute(&self, engine: &QueryEngine) -> Result<TermsResultSet> {
        let mut entries = engine.index().dictionary(&self.field)?;
        if !entries.windows(2).all(|pair| pair[0].term <= pair[1].term) {
            entries.sort_by(|a, b| a.term.cmp(&b.term));
        }

        let stop_words: AHashSet<&str> = match &self.stop_words {
            StopWords::None => AHashSet::new(),
            StopWords::EngineDefault => engine
                .config()
                .default_stop_words
                .iter()
                .map(String::as_str)
                .collect(),
            StopWords::Custom(words) => words.iter().map(String::as_str).collect(),
        };

        let selected = self.selected(&entries, &stop_words);
        let mut result = TermsResultSet::new(selected.iter().map(|e| e.term.clone()).collect());
        if selected.iter().all(|e| e.length.is_some()) {
            result.term_lengths = Some(selected.iter().map(|e| e.length.unwrap_or_default()).collect());
        }
        if self.counts {
            result.term_counts = Some(selected.iter().map(|e| e.count).collect());
        }
        if self.descriptions {
            result.term_descriptions = Some(
                selected
                    .iter()
                    .map(|e| e.description.clone().unwrap_or_else(|| e.term.clone()))
                    .collect(),
            );
        }
        Ok(result)
    }
}
