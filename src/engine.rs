//! Query engines: the entry point for running queries against an index.
//!
//! A [`QueryEngine`] binds an index reader to the configuration, scorer and
//! renderer used by the runners it creates, and keeps track of those runners
//! so that closing the engine stops all of their background work. A
//! [`FederatedEngine`] presents several engines as one.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use ahash::AHashMap;
use parking_lot::Mutex;
use tracing::debug;
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::error::{Result, SemsearchError};
use crate::index::IndexReader;
use crate::query::QueryNode;
use crate::query::scorer::ScorerSource;
use crate::render::{DocumentRenderer, HighlightRenderer};
use crate::runner::QueryRunner;
use crate::runner::federated::FederatedQueryRunner;
use crate::runner::ranking::{RankingQueryRunner, RunnerShared};
use crate::terms::{CompoundTermsQuery, CountsStrategy, OrTermsQuery, TermsQuery, TermsResultSet};

const LOG_TARGET: &str = "semsearch::engine";

/// Builder for [`QueryEngine`].
pub struct QueryEngineBuilder {
    index: Arc<dyn IndexReader>,
    config: EngineConfig,
    scorer_source: Option<ScorerSource>,
    renderer: Option<Arc<dyn DocumentRenderer>>,
}

impl QueryEngineBuilder {
    /// Set the engine configuration.
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Rank results with scorers produced by `source`.
    pub fn scorer_source(mut self, source: ScorerSource) -> Self {
        self.scorer_source = Some(source);
        self
    }

    /// Render documents with `renderer` instead of the default highlighter.
    pub fn renderer(mut self, renderer: Arc<dyn DocumentRenderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    /// Validate the configuration and build the engine.
    pub fn build(self) -> Result<Arc<QueryEngine>> {
        self.config.validate()?;
        Ok(Arc::new(QueryEngine {
            index: self.index,
            config: self.config,
            scorer_source: self.scorer_source,
            renderer: self
                .renderer
                .unwrap_or_else(|| Arc::new(HighlightRenderer::default()) as Arc<dyn DocumentRenderer>),
            runners: Mutex::new(AHashMap::new()),
            closed: AtomicBool::new(false),
        }))
    }
}

/// Runs queries and terms queries against one index.
pub struct QueryEngine {
    index: Arc<dyn IndexReader>,
    config: EngineConfig,
    scorer_source: Option<ScorerSource>,
    renderer: Arc<dyn DocumentRenderer>,
    /// Live runners, detached when they close.
    runners: Mutex<AHashMap<Uuid, Weak<RunnerShared>>>,
    closed: AtomicBool,
}

impl QueryEngine {
    /// Start building an engine over `index`.
    pub fn builder(index: Arc<dyn IndexReader>) -> QueryEngineBuilder {
        QueryEngineBuilder {
            index,
            config: EngineConfig::default(),
            scorer_source: None,
            renderer: None,
        }
    }

    /// Create a non-ranking engine with the given configuration.
    pub fn new(index: Arc<dyn IndexReader>, config: EngineConfig) -> Result<Arc<Self>> {
        Self::builder(index).config(config).build()
    }

    /// The index this engine queries.
    pub fn index(&self) -> &Arc<dyn IndexReader> {
        &self.index
    }

    /// The engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The renderer used by [`QueryRunner::render_document`].
    pub fn renderer(&self) -> &dyn DocumentRenderer {
        self.renderer.as_ref()
    }

    /// Check whether runners created by this engine rank their results.
    pub fn is_ranking(&self) -> bool {
        self.scorer_source.is_some()
    }

    /// Start a runner for `query`.
    ///
    /// The runner ranks its results by score when the engine has a scorer
    /// source, and reports them in document order otherwise.
    pub fn query_runner(self: &Arc<Self>, query: Arc<dyn QueryNode>) -> Result<RankingQueryRunner> {
        self.ensure_open()?;
        let executor = query.executor(self.index.as_ref())?;
        let scorer = self.scorer_source.as_ref().map(|source| source());
        let runner = RankingQueryRunner::start(Arc::clone(self), query, executor, scorer)?;

        // close() may have drained the registry before this runner joined it
        if self.is_closed() {
            runner.close()?;
            return Err(SemsearchError::closed("query engine is closed"));
        }
        Ok(runner)
    }

    /// Execute a terms query against this engine's index.
    pub fn execute_terms(&self, query: &dyn TermsQuery) -> Result<TermsResultSet> {
        self.ensure_open()?;
        query.execute(self)
    }

    /// Number of runners created by this engine that are still open.
    pub fn active_runners(&self) -> usize {
        self.runners
            .lock()
            .values()
            .filter(|runner| runner.strong_count() > 0)
            .count()
    }

    /// Close every live runner and refuse new queries. Closing twice is a
    /// no-op.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let runners: Vec<Weak<RunnerShared>> =
            self.runners.lock().drain().map(|(_, runner)| runner).collect();
        debug!(target: LOG_TARGET, runners = runners.len(), "closing query engine");
        for runner in runners {
            if let Some(runner) = runner.upgrade() {
                runner.close();
            }
        }
    }

    /// Check if the engine has been closed.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub(crate) fn register_runner(&self, runner: &Arc<RunnerShared>) {
        self.runners
            .lock()
            .insert(runner.id(), Arc::downgrade(runner));
        debug!(target: LOG_TARGET, runner = %runner.id(), "registered query runner");
    }

    pub(crate) fn release_runner(&self, id: &Uuid) {
        if self.runners.lock().remove(id).is_some() {
            debug!(target: LOG_TARGET, runner = %id, "released query runner");
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(SemsearchError::closed("query engine is closed"));
        }
        Ok(())
    }
}

impl std::fmt::Debug for QueryEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryEngine")
            .field("index", &self.index)
            .field("config", &self.config)
            .field("ranking", &self.is_ranking())
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Presents several engines, one per sub-index, as one logical engine.
#[derive(Debug)]
pub struct FederatedEngine {
    engines: Vec<Arc<QueryEngine>>,
}

impl FederatedEngine {
    /// Create a federated engine over `engines`, in federation order.
    pub fn new(engines: Vec<Arc<QueryEngine>>) -> Result<Self> {
        if engines.is_empty() {
            return Err(SemsearchError::invalid_argument(
                "a federated engine needs at least one sub-engine",
            ));
        }
        Ok(FederatedEngine { engines })
    }

    /// The sub-engines, in federation order.
    pub fn engines(&self) -> &[Arc<QueryEngine>] {
        &self.engines
    }

    /// Start one runner per sub-engine and merge them.
    pub fn query_runner(&self, query: Arc<dyn QueryNode>) -> Result<FederatedQueryRunner> {
        let mut runners: Vec<Box<dyn QueryRunner>> = Vec::with_capacity(self.engines.len());
        for engine in &self.engines {
            // runners already started close when dropped on error
            runners.push(Box::new(engine.query_runner(Arc::clone(&query))?));
        }
        FederatedQueryRunner::new(runners)
    }

    /// Execute a terms query on every sub-engine and merge the results.
    ///
    /// Results are grouped by description when every sub-result carries
    /// descriptions, since term strings of opaque fields differ between
    /// indexes. Otherwise they are merged by term string, summing counts.
    pub fn execute_terms(&self, query: &dyn TermsQuery) -> Result<TermsResultSet> {
        let results = self
            .engines
            .iter()
            .map(|engine| engine.execute_terms(query))
            .collect::<Result<Vec<_>>>()?;

        if results.iter().all(|r| r.term_descriptions.is_some()) {
            TermsResultSet::group_by_description(&results)
        } else {
            OrTermsQuery::new(Vec::new())
                .with_strategy(CountsStrategy::Sum)
                .combine(results)
        }
    }

    /// Close every sub-engine.
    pub fn close(&self) {
        for engine in &self.engines {
            engine.close();
        }
    }
}
