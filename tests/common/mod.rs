#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use semsearch::error::{Result, SemsearchError};
use semsearch::prelude::*;
use semsearch::query::NO_MORE_DOCUMENTS;

/// An index whose documents contain `term` a varying number of times.
///
/// Document `i` repeats `term` `repeats[i]` times, followed by filler.
pub fn repeated_term_index(term: &str, repeats: &[usize]) -> MemoryIndex {
    let mut index = MemoryIndex::new();
    for (i, &count) in repeats.iter().enumerate() {
        let mut tokens = vec![term; count];
        tokens.extend(["filler", "text"]);
        index.add_document(&format!("mem://doc/{i}"), &format!("Document {i}"), &tokens.join(" "));
    }
    index
}

/// Poll `condition` until it holds or two seconds pass.
pub fn eventually<F: Fn() -> bool>(condition: F) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}

/// A query over fixed document IDs that counts hit enumerations per
/// document across every executor it creates.
#[derive(Debug)]
pub struct CountingQuery {
    documents: Arc<Vec<i64>>,
    rewind_documents: Option<Arc<Vec<i64>>>,
    hits_per_document: usize,
    fail_after: Option<usize>,
    delay: Duration,
    enumerations: Arc<Mutex<HashMap<i64, usize>>>,
    executors: AtomicUsize,
}

impl CountingQuery {
    pub fn new(documents: Vec<i64>, hits_per_document: usize) -> Self {
        CountingQuery {
            documents: Arc::new(documents),
            rewind_documents: None,
            hits_per_document,
            fail_after: None,
            delay: Duration::ZERO,
            enumerations: Arc::new(Mutex::new(HashMap::new())),
            executors: AtomicUsize::new(0),
        }
    }

    /// Executors created after the first one return `documents` instead.
    pub fn with_rewind_documents(mut self, documents: Vec<i64>) -> Self {
        self.rewind_documents = Some(Arc::new(documents));
        self
    }

    /// The first executor fails after returning `documents` documents.
    pub fn failing_after(mut self, documents: usize) -> Self {
        self.fail_after = Some(documents);
        self
    }

    /// Every executor sleeps for `delay` before each document it returns.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn enumerations(&self) -> HashMap<i64, usize> {
        self.enumerations.lock().clone()
    }

    pub fn executors_created(&self) -> usize {
        self.executors.load(Ordering::SeqCst)
    }
}

impl QueryNode for CountingQuery {
    fn executor(&self, _index: &dyn IndexReader) -> Result<Box<dyn QueryExecutor>> {
        let created = self.executors.fetch_add(1, Ordering::SeqCst);
        let documents = match &self.rewind_documents {
            Some(rewind) if created > 0 => Arc::clone(rewind),
            _ => Arc::clone(&self.documents),
        };
        Ok(Box::new(CountingExecutor {
            documents,
            position: None,
            hits_per_document: self.hits_per_document,
            next_hit: 0,
            started: false,
            exhausted: false,
            fail_after: if created == 0 { self.fail_after } else { None },
            returned: 0,
            delay: self.delay,
            enumerations: Arc::clone(&self.enumerations),
        }))
    }

    fn description(&self) -> String {
        format!("counting({} documents)", self.documents.len())
    }
}

struct CountingExecutor {
    documents: Arc<Vec<i64>>,
    position: Option<usize>,
    hits_per_document: usize,
    next_hit: usize,
    started: bool,
    exhausted: bool,
    fail_after: Option<usize>,
    returned: usize,
    delay: Duration,
    enumerations: Arc<Mutex<HashMap<i64, usize>>>,
}

impl CountingExecutor {
    fn current(&self) -> Option<i64> {
        if self.exhausted {
            return None;
        }
        self.position.map(|p| self.documents[p])
    }
}

impl QueryExecutor for CountingExecutor {
    fn next_document(&mut self, greater_than: i64) -> Result<i64> {
        if self.fail_after == Some(self.returned) {
            return Err(SemsearchError::index("posting list is corrupt"));
        }
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
        let start = self.position.map_or(0, |p| p + 1);
        let found = self.documents[start.min(self.documents.len())..]
            .iter()
            .position(|&d| d > greater_than)
            .map(|offset| start + offset);

        self.next_hit = 0;
        self.started = false;
        match found {
            Some(position) => {
                self.position = Some(position);
                self.returned += 1;
                Ok(self.documents[position])
            }
            None => {
                self.exhausted = true;
                self.position = Some(self.documents.len());
                Ok(NO_MORE_DOCUMENTS)
            }
        }
    }

    fn next_hit(&mut self) -> Result<Option<Binding>> {
        let Some(document_id) = self.current() else {
            return Ok(None);
        };
        if !self.started {
            self.started = true;
            *self.enumerations.lock().entry(document_id).or_insert(0) += 1;
        }
        if self.next_hit >= self.hits_per_document {
            return Ok(None);
        }
        let hit = Binding::new(document_id, self.next_hit, 1);
        self.next_hit += 1;
        Ok(Some(hit))
    }

    fn latest_document(&self) -> i64 {
        self.current().unwrap_or(NO_MORE_DOCUMENTS)
    }

    fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Scores documents from a fixed table without consuming their hits.
pub struct TableScorer {
    scores: Arc<HashMap<i64, f64>>,
    executor: Option<Box<dyn QueryExecutor>>,
}

impl TableScorer {
    pub fn source(scores: HashMap<i64, f64>) -> ScorerSource {
        let scores = Arc::new(scores);
        Arc::new(move || {
            Box::new(TableScorer {
                scores: Arc::clone(&scores),
                executor: None,
            }) as Box<dyn Scorer>
        })
    }

    fn executor(&mut self) -> Result<&mut Box<dyn QueryExecutor>> {
        self.executor
            .as_mut()
            .ok_or_else(|| SemsearchError::query("scorer not wrapped"))
    }
}

impl QueryExecutor for TableScorer {
    fn next_document(&mut self, greater_than: i64) -> Result<i64> {
        self.executor()?.next_document(greater_than)
    }

    fn next_hit(&mut self) -> Result<Option<Binding>> {
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
        match self.executor.take() {
            Some(mut executor) => executor.close(),
            None => Ok(()),
        }
    }
}

impl Scorer for TableScorer {
    fn wrap(&mut self, executor: Box<dyn QueryExecutor>) -> Result<()> {
        self.executor = Some(executor);
        Ok(())
    }

    fn score(&mut self) -> Result<f64> {
        let document_id = self.latest_document();
        Ok(self.scores.get(&document_id).copied().unwrap_or(0.0))
    }
}

/// A ranking engine over an empty index whose scores come from `scores`.
pub fn table_engine(scores: HashMap<i64, f64>, block_size: usize) -> Arc<QueryEngine> {
    QueryEngine::builder(Arc::new(MemoryIndex::new()))
        .config(EngineConfig::new().with_document_block_size(block_size))
        .scorer_source(TableScorer::source(scores))
        .build()
        .unwrap()
}

/// Resolve every rank of `runner` and return `(document_id, score)` pairs.
pub fn ranked(runner: &dyn QueryRunner) -> Vec<(i64, f64)> {
    let count = runner.documents_count_sync().unwrap();
    (0..count)
        .map(|rank| {
            (
                runner.document_id(rank).unwrap(),
                runner.document_score(rank).unwrap(),
            )
        })
        .collect()
}
