//! Scoring implementations for ranking search results.
//!
//! A [`Scorer`] wraps a [`QueryExecutor`] and behaves like one: documents and
//! hits pass straight through, and [`Scorer::score`] rates the current
//! document. Scorers that need the hits to compute a score buffer them so
//! callers still see every hit.

use std::collections::VecDeque;
use std::fmt::Debug;
use std::sync::Arc;

use crate::error::{Result, SemsearchError};
use crate::index::IndexReader;
use crate::query::{Binding, NO_MORE_DOCUMENTS, QueryExecutor};

/// Trait for document scorers.
pub trait Scorer: QueryExecutor {
    /// Take ownership of the executor whose documents should be scored.
    fn wrap(&mut self, executor: Box<dyn QueryExecutor>) -> Result<()>;

    /// Calculate the score for the current document. Higher is better.
    fn score(&mut self) -> Result<f64>;
}

/// Factory producing a fresh scorer for every query runner.
pub type ScorerSource = Arc<dyn Fn() -> Box<dyn Scorer> + Send + Sync>;

/// Pass-through executor state shared by the scorers in this module.
#[derive(Default)]
struct Wrapped {
    executor: Option<Box<dyn QueryExecutor>>,
    buffered: VecDeque<Binding>,
    buffered_document: Option<i64>,
}

impl Wrapped {
    fn executor(&mut self) -> Result<&mut Box<dyn QueryExecutor>> {
        self.executor
            .as_mut()
            .ok_or_else(|| SemsearchError::query("scorer used before wrap()"))
    }

    fn next_document(&mut self, greater_than: i64) -> Result<i64> {
        self.buffered.clear();
        self.buffered_document = None;
        self.executor()?.next_document(greater_than)
    }

    /// Pull every hit of the current document into the buffer.
    fn buffer_hits(&mut self) -> Result<&VecDeque<Binding>> {
        let executor = self
            .executor
            .as_mut()
            .ok_or_else(|| SemsearchError::query("scorer used before wrap()"))?;
        let current = executor.latest_document();
        if self.buffered_document != Some(current) {
            while let Some(hit) = executor.next_hit()? {
                self.buffered.push_back(hit);
            }
            self.buffered_document = Some(current);
        }
        Ok(&self.buffered)
    }

    fn next_hit(&mut self) -> Result<Option<Binding>> {
        if let Some(hit) = self.buffered.pop_front() {
            return Ok(Some(hit));
        }
        self.executor()?.next_hit()
    }

    fn latest_document(&self) -> i64 {
        self.executor
            .as_ref()
            .map_or(NO_MORE_DOCUMENTS, |e| e.latest_document())
    }

    fn is_exhausted(&self) -> bool {
        self.executor.as_ref().is_none_or(|e| e.is_exhausted())
    }

    fn close(&mut self) -> Result<()> {
        self.buffered.clear();
        match self.executor.take() {
            Some(mut executor) => executor.close(),
            None => Ok(()),
        }
    }
}

impl Debug for Wrapped {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wrapped")
            .field("wrapped", &self.executor.is_some())
            .field("buffered", &self.buffered.len())
            .finish()
    }
}

macro_rules! delegate_executor {
    ($scorer:ty) => {
        impl QueryExecutor for $scorer {
            fn next_document(&mut self, greater_than: i64) -> Result<i64> {
                self.inner.next_document(greater_than)
            }

            fn next_hit(&mut self) -> Result<Option<Binding>> {
                self.inner.next_hit()
            }

            fn latest_document(&self) -> i64 {
                self.inner.latest_document()
            }

            fn is_exhausted(&self) -> bool {
                self.inner.is_exhausted()
            }

            fn close(&mut self) -> Result<()> {
                self.inner.close()
            }
        }
    };
}

/// Scores a document by the number of hits it contains.
#[derive(Debug, Default)]
pub struct HitCountScorer {
    inner: Wrapped,
}

impl HitCountScorer {
    /// Create a new hit count scorer.
    pub fn new() -> Self {
        Self::default()
    }

    /// A scorer source producing hit count scorers.
    pub fn source() -> ScorerSource {
        Arc::new(|| Box::new(HitCountScorer::new()) as Box<dyn Scorer>)
    }
}

delegate_executor!(HitCountScorer);

impl Scorer for HitCountScorer {
    fn wrap(&mut self, executor: Box<dyn QueryExecutor>) -> Result<()> {
        self.inner.close()?;
        self.inner.executor = Some(executor);
        Ok(())
    }

    fn score(&mut self) -> Result<f64> {
        Ok(self.inner.buffer_hits()?.len() as f64)
    }
}

/// BM25-style scorer: saturates the hit count and normalises by document
/// length.
#[derive(Debug)]
pub struct Bm25Scorer {
    inner: Wrapped,
    index: Arc<dyn IndexReader>,
    /// BM25 k1 parameter.
    k1: f64,
    /// BM25 b parameter.
    b: f64,
}

impl Bm25Scorer {
    /// Create a new BM25 scorer with the usual parameters (k1 = 1.2, b = 0.75).
    pub fn new(index: Arc<dyn IndexReader>) -> Self {
        Self::with_params(index, 1.2, 0.75)
    }

    /// Create a new BM25 scorer with custom parameters.
    pub fn with_params(index: Arc<dyn IndexReader>, k1: f64, b: f64) -> Self {
        Bm25Scorer {
            inner: Wrapped::default(),
            index,
            k1,
            b,
        }
    }

    /// A scorer source producing BM25 scorers over the given index.
    pub fn source(index: Arc<dyn IndexReader>) -> ScorerSource {
        Arc::new(move || Box::new(Bm25Scorer::new(Arc::clone(&index))) as Box<dyn Scorer>)
    }

    /// Get the k1 parameter.
    pub fn k1(&self) -> f64 {
        self.k1
    }

    /// Get the b parameter.
    pub fn b(&self) -> f64 {
        self.b
    }

    fn tf(&self, term_freq: f64, document_length: f64) -> f64 {
        if term_freq == 0.0 {
            return 0.0;
        }

        let avg_len = self.index.average_document_length();
        let avg_len = if avg_len > 0.0 { avg_len } else { 1.0 };
        let norm_factor = 1.0 - self.b + self.b * (document_length / avg_len);

        // TF = (tf * (k1 + 1)) / (tf + k1 * norm_factor)
        (term_freq * (self.k1 + 1.0)) / (term_freq + self.k1 * norm_factor)
    }
}

delegate_executor!(Bm25Scorer);

impl Scorer for Bm25Scorer {
    fn wrap(&mut self, executor: Box<dyn QueryExecutor>) -> Result<()> {
        self.inner.close()?;
        self.inner.executor = Some(executor);
        Ok(())
    }

    fn score(&mut self) -> Result<f64> {
        let document_id = self.inner.latest_document();
        let term_freq = self.inner.buffer_hits()?.len() as f64;
        let document_length = self.index.document_length(document_id)? as f64;
        Ok(self.tf(term_freq, document_length))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::memory::MemoryIndex;
    use crate::query::QueryNode;
    use crate::query::collect_hits;
    use crate::query::postings::{Posting, PostingsQuery};

    fn query() -> PostingsQuery {
        PostingsQuery::new(
            "test",
            vec![
                Posting::new(0, vec![(0, 1)]),
                Posting::new(1, vec![(0, 1), (2, 1), (3, 1)]),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_hit_count_scorer_passes_hits_through() {
        let index = MemoryIndex::new();
        let mut scorer = HitCountScorer::new();
        scorer.wrap(query().executor(&index).unwrap()).unwrap();

        assert_eq!(scorer.next_document(-1).unwrap(), 0);
        assert_eq!(scorer.score().unwrap(), 1.0);
        assert_eq!(scorer.next_document(-1).unwrap(), 1);
        assert_eq!(scorer.score().unwrap(), 3.0);
        // scoring twice does not lose or duplicate hits
        assert_eq!(scorer.score().unwrap(), 3.0);
        assert_eq!(collect_hits(&mut scorer).unwrap().len(), 3);
        assert_eq!(scorer.next_document(-1).unwrap(), NO_MORE_DOCUMENTS);
    }

    #[test]
    fn test_unwrapped_scorer_fails() {
        let mut scorer = HitCountScorer::new();
        assert!(scorer.next_document(-1).is_err());
        assert!(scorer.is_exhausted());
    }

    #[test]
    fn test_bm25_saturates() {
        let mut index = MemoryIndex::new();
        index.add_document("doc0", "a", "x y z");
        index.add_document("doc1", "b", "x x x");
        let index: Arc<dyn IndexReader> = Arc::new(index);

        let mut scorer = Bm25Scorer::new(Arc::clone(&index));
        scorer.wrap(query().executor(index.as_ref()).unwrap()).unwrap();

        scorer.next_document(-1).unwrap();
        let one_hit = scorer.score().unwrap();
        scorer.next_document(-1).unwrap();
        let three_hits = scorer.score().unwrap();

        assert!(three_hits > one_hit);
        assert!(three_hits < scorer.k1() + 1.0);
    }
}
