//! Query runner over a single index.
//!
//! Each runner owns one background worker thread fed by a FIFO task queue.
//! The worker is the only writer of the result state: it enumerates the
//! matching documents, extends the ranked order one block at a time and
//! collects hits. Caller threads read finished state under a lock, or queue
//! work and block on its [`TaskFuture`] until the worker has produced it.
//!
//! The first queued task enumerates every matching document. In ranking
//! mode the documents are scored as they arrive and ranking starts once all
//! scores are known; otherwise rank equals arrival order and the hits of the
//! first block are collected during enumeration so callers can start
//! consuming immediately.

use std::fmt::Write;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender, unbounded};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::engine::QueryEngine;
use crate::error::{Result, SemsearchError};
use crate::index::DocumentData;
use crate::query::scorer::Scorer;
use crate::query::{Binding, NO_MORE_DOCUMENTS, QueryExecutor, QueryNode, collect_hits};
use crate::runner::future::TaskFuture;
use crate::runner::interval::{IntervalMap, RankInterval};
use crate::runner::{QueryRunner, UNKNOWN_COUNT, check_rank, ranker};

/// Score reported for every document by a runner without a scorer.
pub const DEFAULT_SCORE: f64 = 1.0;

const LOG_TARGET: &str = "semsearch::runner";

/// Hits of one document as far as the runner knows them.
#[derive(Debug, Clone, Default)]
enum DocumentHits {
    #[default]
    Pending,
    Collected(Arc<[Binding]>),
    /// The executor did not return the document when its hits were collected.
    Missing(Arc<str>),
}

impl DocumentHits {
    fn is_pending(&self) -> bool {
        matches!(self, DocumentHits::Pending)
    }
}

/// Result state, indexed by document index (arrival order).
#[derive(Debug, Default)]
struct ResultState {
    document_ids: Vec<i64>,
    /// Present only when ranking.
    document_scores: Option<Vec<f64>>,
    /// Settled at most once per document.
    document_hits: Vec<DocumentHits>,
    /// Rank to document index. Present only when ranking; append-only.
    documents_order: Option<Vec<usize>>,
    all_documents_collected: bool,
}

impl ResultState {
    fn current_count(&self) -> i64 {
        self.document_ids.len() as i64
    }

    /// Number of ranks whose document is known.
    fn resolved_ranks(&self) -> usize {
        match &self.documents_order {
            Some(order) => order.len(),
            None => self.document_ids.len(),
        }
    }

    fn document_index(&self, rank: usize) -> Option<usize> {
        match &self.documents_order {
            Some(order) => order.get(rank).copied(),
            None => (rank < self.document_ids.len()).then_some(rank),
        }
    }
}

enum RunnerTask {
    CollectDocumentIds { done: TaskFuture },
    Rank { rank: usize, done: TaskFuture },
    CollectHits { interval: RankInterval, done: TaskFuture },
    Shutdown,
}

impl RunnerTask {
    fn future(&self) -> Option<&TaskFuture> {
        match self {
            RunnerTask::CollectDocumentIds { done }
            | RunnerTask::Rank { done, .. }
            | RunnerTask::CollectHits { done, .. } => Some(done),
            RunnerTask::Shutdown => None,
        }
    }
}

/// State shared between a runner handle, its worker and its engine.
pub(crate) struct RunnerShared {
    id: Uuid,
    engine: Arc<QueryEngine>,
    query: Arc<dyn QueryNode>,
    block_size: usize,
    ranking: bool,
    state: RwLock<ResultState>,
    /// Queued and finished hit collection, by rank.
    hit_collectors: Mutex<IntervalMap>,
    document_ids_collected: TaskFuture,
    /// Hits of the first block, collected during enumeration (non-ranking).
    first_block: Option<TaskFuture>,
    /// `None` once closed; every accepted task precedes the shutdown sentinel.
    queue: Mutex<Option<Sender<RunnerTask>>>,
    closed: AtomicBool,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl RunnerShared {
    pub(crate) fn id(&self) -> Uuid {
        self.id
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn submit(&self, task: RunnerTask) {
        let queue = self.queue.lock();
        let rejected = match queue.as_ref() {
            Some(sender) => sender.send(task).err().map(|e| e.into_inner()),
            None => Some(task),
        };
        if let Some(task) = rejected {
            if let Some(done) = task.future() {
                done.abandon();
            }
        }
    }

    /// The task collecting the hits of `rank`, queuing one if needed.
    fn hits_future(&self, rank: usize) -> TaskFuture {
        let mut collectors = self.hit_collectors.lock();
        if let Some(future) = collectors.covering(rank) {
            return future.clone();
        }

        let limit = self.state.read().resolved_ranks();
        let desired_end = (rank + self.block_size).min(limit).max(rank + 1);
        let interval = collectors.gap_from(rank, desired_end);
        let done = TaskFuture::new();
        collectors.insert(interval, done.clone());
        self.submit(RunnerTask::CollectHits {
            interval,
            done: done.clone(),
        });
        done
    }

    /// Queue hit collection for every rank of `[start, end)` not yet queued.
    fn schedule_hits(&self, start: usize, end: usize) {
        let mut collectors = self.hit_collectors.lock();
        for gap in collectors.uncovered(start, end) {
            let mut chunk_start = gap.start;
            while chunk_start < gap.end {
                let chunk = RankInterval::new(chunk_start, (chunk_start + self.block_size).min(gap.end));
                let done = TaskFuture::new();
                collectors.insert(chunk, done.clone());
                self.submit(RunnerTask::CollectHits {
                    interval: chunk,
                    done,
                });
                chunk_start = chunk.end;
            }
        }
    }

    pub(crate) fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        debug!(target: LOG_TARGET, runner = %self.id, "closing query runner");

        self.engine.release_runner(&self.id);
        self.document_ids_collected.abandon();
        if let Some(first_block) = &self.first_block {
            first_block.abandon();
        }
        self.hit_collectors.lock().abandon_all();

        if let Some(sender) = self.queue.lock().take() {
            let _ = sender.send(RunnerTask::Shutdown);
        }

        let handle = self.worker.lock().take();
        if let Some(handle) = handle {
            // a worker closing its own runner cannot wait for itself
            if handle.thread().id() != thread::current().id() && handle.join().is_err() {
                warn!(target: LOG_TARGET, runner = %self.id, "worker thread panicked");
            }
        }
    }
}

/// Background worker; owns the query executor and scorer.
struct Worker {
    shared: Arc<RunnerShared>,
    tasks: Receiver<RunnerTask>,
    executor: Option<Box<dyn QueryExecutor>>,
    scorer: Option<Box<dyn Scorer>>,
}

impl Worker {
    fn run(mut self) {
        while let Ok(task) = self.tasks.recv() {
            if matches!(task, RunnerTask::Shutdown) {
                break;
            }
            self.execute(task);
        }
        self.release();
        debug!(target: LOG_TARGET, runner = %self.shared.id, "worker stopped");
    }

    fn execute(&mut self, task: RunnerTask) {
        let Some(done) = task.future().cloned() else {
            return;
        };
        if self.shared.is_closed() {
            done.abandon();
            return;
        }

        let result = panic::catch_unwind(AssertUnwindSafe(|| self.run_task(task)))
            .unwrap_or_else(|payload| {
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "(non-string panic)".to_string());
                Err(SemsearchError::background(format!("task panicked: {message}")))
            });

        match result {
            Ok(()) => done.complete(),
            Err(_) if self.shared.is_closed() => done.abandon(),
            // logged where detected; the runner stays usable
            Err(SemsearchError::Consistency(message)) => done.fail(message),
            Err(e) => {
                error!(
                    target: LOG_TARGET,
                    runner = %self.shared.id,
                    error = %e,
                    "background task failed, closing runner"
                );
                done.fail(e.to_string());
                self.shared.close();
            }
        }
    }

    fn run_task(&mut self, task: RunnerTask) -> Result<()> {
        match task {
            RunnerTask::CollectDocumentIds { .. } => self.collect_document_ids(),
            RunnerTask::Rank { rank, .. } => self.rank_documents(rank),
            RunnerTask::CollectHits { interval, .. } => self.collect_hits(interval),
            RunnerTask::Shutdown => Ok(()),
        }
    }

    fn executor_mut(&mut self) -> Result<&mut Box<dyn QueryExecutor>> {
        self.executor
            .as_mut()
            .ok_or_else(|| SemsearchError::consistency("query executor not available"))
    }

    fn interrupted() -> SemsearchError {
        SemsearchError::closed("query runner closed while working")
    }

    fn collect_document_ids(&mut self) -> Result<()> {
        let shared = Arc::clone(&self.shared);
        let index = Arc::clone(shared.engine.index());

        if let Some(scorer) = self.scorer.as_mut() {
            let executor = self
                .executor
                .take()
                .ok_or_else(|| SemsearchError::consistency("no query executor to score"))?;
            scorer.wrap(executor)?;
        }

        loop {
            if shared.is_closed() {
                return Err(Self::interrupted());
            }

            let document_id = match self.scorer.as_mut() {
                Some(scorer) => scorer.next_document(NO_MORE_DOCUMENTS)?,
                None => self.executor_mut()?.next_document(NO_MORE_DOCUMENTS)?,
            };
            if document_id < 0 {
                break;
            }
            if index.is_deleted(document_id) {
                continue;
            }

            if let Some(scorer) = self.scorer.as_mut() {
                let score = scorer.score()?;
                let mut state = shared.state.write();
                state.document_ids.push(document_id);
                if let Some(scores) = state.document_scores.as_mut() {
                    scores.push(score);
                }
                state.document_hits.push(DocumentHits::Pending);
            } else {
                let position = shared.state.read().document_ids.len();
                let hits = if position < shared.block_size {
                    DocumentHits::Collected(Arc::from(collect_hits(self.executor_mut()?.as_mut())?))
                } else {
                    DocumentHits::Pending
                };
                {
                    let mut state = shared.state.write();
                    state.document_ids.push(document_id);
                    state.document_hits.push(hits);
                }
                if position + 1 == shared.block_size {
                    if let Some(first_block) = &shared.first_block {
                        first_block.complete();
                    }
                }
            }
        }

        let count = {
            let mut state = shared.state.write();
            state.all_documents_collected = true;
            state.document_ids.len()
        };
        if let Some(first_block) = &shared.first_block {
            first_block.complete();
        }
        debug!(target: LOG_TARGET, runner = %shared.id, count, "all documents collected");

        if shared.ranking {
            self.rank_documents(shared.block_size - 1)?;
        }
        Ok(())
    }

    /// Extend the ranked order so that `rank` is resolved, then queue hit
    /// collection for the newly ranked range.
    fn rank_documents(&mut self, rank: usize) -> Result<()> {
        let shared = Arc::clone(&self.shared);
        let (start, window) = {
            let state = shared.state.read();
            let (Some(order), Some(scores)) = (&state.documents_order, &state.document_scores)
            else {
                return Err(SemsearchError::consistency(
                    "ranking requested from a runner without a scorer",
                ));
            };
            if rank < order.len() {
                return Ok(());
            }
            if !state.all_documents_collected {
                return Err(SemsearchError::consistency(
                    "ranking requested before all documents were collected",
                ));
            }

            let start = order.len();
            let mut end = start + shared.block_size;
            while end <= rank {
                end += shared.block_size;
            }
            (
                start,
                ranker::next_window(&state.document_ids, scores, order, end),
            )
        };
        if window.is_empty() {
            return Ok(());
        }

        let end = {
            let mut state = shared.state.write();
            let order = state.documents_order.get_or_insert_with(Vec::new);
            order.extend(window);
            order.len()
        };
        debug!(target: LOG_TARGET, runner = %shared.id, start, end, "ranked documents");

        shared.schedule_hits(start, end);
        Ok(())
    }

    fn collect_hits(&mut self, interval: RankInterval) -> Result<()> {
        let shared = Arc::clone(&self.shared);
        let mut targets: Vec<(usize, i64)> = {
            let state = shared.state.read();
            (interval.start..interval.end)
                .filter_map(|rank| state.document_index(rank))
                .filter(|&index| state.document_hits[index].is_pending())
                .map(|index| (index, state.document_ids[index]))
                .collect()
        };
        // executors only move forward
        targets.sort_unstable_by_key(|&(_, document_id)| document_id);

        let Some(&(_, first_document)) = targets.first() else {
            return Ok(());
        };
        let rewind = self
            .executor
            .as_ref()
            .is_none_or(|e| e.is_exhausted() || e.latest_document() >= first_document);
        if rewind {
            self.rewind()?;
        }

        for (index, document_id) in targets {
            if shared.is_closed() {
                return Err(Self::interrupted());
            }

            let executor = self.executor_mut()?;
            // a previous mismatch may have left the executor on this document
            let latest = executor.latest_document();
            let found = if !executor.is_exhausted() && latest >= document_id {
                latest
            } else {
                executor.next_document(document_id - 1)?
            };

            let hits = if found == document_id {
                DocumentHits::Collected(Arc::from(collect_hits(executor.as_mut())?))
            } else {
                if shared.is_closed() {
                    return Err(Self::interrupted());
                }
                let message = format!(
                    "expected document {document_id} at index {index}, executor returned {found}"
                );
                error!(target: LOG_TARGET, runner = %shared.id, "{message}");
                DocumentHits::Missing(Arc::from(message))
            };

            let mut state = shared.state.write();
            if state.document_hits[index].is_pending() {
                state.document_hits[index] = hits;
            }
        }
        debug!(
            target: LOG_TARGET,
            runner = %shared.id,
            start = interval.start,
            ranks = interval.len(),
            "collected hits"
        );
        Ok(())
    }

    /// Replace the executor with a fresh one positioned before the first
    /// document.
    fn rewind(&mut self) -> Result<()> {
        if let Some(mut stale) = self.executor.take() {
            if let Err(e) = stale.close() {
                warn!(target: LOG_TARGET, runner = %self.shared.id, error = %e, "failed to close query executor");
            }
        }
        debug!(target: LOG_TARGET, runner = %self.shared.id, "rewinding query executor");
        let executor = self
            .shared
            .query
            .executor(self.shared.engine.index().as_ref())?;
        self.executor = Some(executor);
        Ok(())
    }

    fn release(&mut self) {
        if let Some(mut scorer) = self.scorer.take() {
            if let Err(e) = scorer.close() {
                warn!(target: LOG_TARGET, runner = %self.shared.id, error = %e, "failed to close scorer");
            }
        }
        if let Some(mut executor) = self.executor.take() {
            if let Err(e) = executor.close() {
                warn!(target: LOG_TARGET, runner = %self.shared.id, error = %e, "failed to close query executor");
            }
        }
    }
}

/// Runs a query on one index and exposes its results by rank.
///
/// With a scorer, documents are ranked by descending score, ties broken by
/// descending document ID. Without one, rank equals arrival order (ascending
/// document ID) and every document scores [`DEFAULT_SCORE`].
pub struct RankingQueryRunner {
    shared: Arc<RunnerShared>,
}

impl RankingQueryRunner {
    /// Start a runner; called by [`QueryEngine::query_runner`].
    pub(crate) fn start(
        engine: Arc<QueryEngine>,
        query: Arc<dyn QueryNode>,
        executor: Box<dyn QueryExecutor>,
        scorer: Option<Box<dyn Scorer>>,
    ) -> Result<Self> {
        let block_size = engine.config().document_block_size.max(1);
        let ranking = scorer.is_some();
        let id = Uuid::new_v4();
        let (sender, receiver) = unbounded();

        let first_block = (!ranking).then(TaskFuture::new);
        let mut collectors = IntervalMap::new();
        if let Some(first_block) = &first_block {
            collectors.insert(RankInterval::new(0, block_size), first_block.clone());
        }

        let state = ResultState {
            document_scores: ranking.then(Vec::new),
            documents_order: ranking.then(Vec::new),
            ..ResultState::default()
        };

        let shared = Arc::new(RunnerShared {
            id,
            engine,
            query,
            block_size,
            ranking,
            state: RwLock::new(state),
            hit_collectors: Mutex::new(collectors),
            document_ids_collected: TaskFuture::new(),
            first_block,
            queue: Mutex::new(Some(sender)),
            closed: AtomicBool::new(false),
            worker: Mutex::new(None),
        });

        shared.engine.register_runner(&shared);

        let worker = Worker {
            shared: Arc::clone(&shared),
            tasks: receiver,
            executor: Some(executor),
            scorer,
        };
        let spawned = thread::Builder::new()
            .name(format!("ranking-runner-{}", id.simple()))
            .spawn(move || worker.run());
        let handle = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                shared.close();
                return Err(e.into());
            }
        };
        *shared.worker.lock() = Some(handle);

        shared.submit(RunnerTask::CollectDocumentIds {
            done: shared.document_ids_collected.clone(),
        });
        debug!(
            target: LOG_TARGET,
            runner = %id,
            ranking,
            block_size,
            query = %shared.query.description(),
            "started query runner"
        );
        Ok(RankingQueryRunner { shared })
    }

    /// Unique ID of this runner.
    pub fn id(&self) -> Uuid {
        self.shared.id
    }

    /// Check whether documents are ranked by a scorer.
    pub fn is_ranking(&self) -> bool {
        self.shared.ranking
    }

    /// The query this runner executes.
    pub fn query(&self) -> &Arc<dyn QueryNode> {
        &self.shared.query
    }

    fn ensure_open(&self) -> Result<()> {
        if self.shared.is_closed() {
            return Err(SemsearchError::closed("query runner is closed"));
        }
        Ok(())
    }

    fn checked_rank(&self, rank: i64) -> Result<usize> {
        self.ensure_open()?;
        let current = self.shared.state.read().current_count();
        check_rank(rank, current)
    }

    /// Document index of `rank`, blocking until the rank is resolved.
    fn document_index(&self, rank: usize) -> Result<usize> {
        if let Some(index) = self.shared.state.read().document_index(rank) {
            return Ok(index);
        }

        let done = TaskFuture::new();
        self.shared.submit(RunnerTask::Rank {
            rank,
            done: done.clone(),
        });
        done.wait()?;

        self.shared
            .state
            .read()
            .document_index(rank)
            .ok_or_else(|| SemsearchError::consistency(format!("rank {rank} was not ranked")))
    }

    /// Hits of `index` if they are settled, or the reason they never will be.
    fn cached_hits(&self, index: usize) -> Option<Result<Vec<Binding>>> {
        match &self.shared.state.read().document_hits[index] {
            DocumentHits::Pending => None,
            DocumentHits::Collected(hits) => Some(Ok(hits.to_vec())),
            DocumentHits::Missing(message) => {
                Some(Err(SemsearchError::consistency(message.to_string())))
            }
        }
    }

    fn document_data(&self, rank: i64) -> Result<DocumentData> {
        let document_id = self.document_id(rank)?;
        self.shared.engine.index().document(document_id)
    }
}

impl QueryRunner for RankingQueryRunner {
    fn documents_count(&self) -> Result<i64> {
        self.ensure_open()?;
        let state = self.shared.state.read();
        Ok(if state.all_documents_collected {
            state.current_count()
        } else {
            UNKNOWN_COUNT
        })
    }

    fn documents_count_sync(&self) -> Result<i64> {
        // a failed enumeration reports its cause even once the runner closed
        self.shared.document_ids_collected.wait()?;
        self.ensure_open()?;
        Ok(self.shared.state.read().current_count())
    }

    fn documents_current_count(&self) -> Result<i64> {
        self.ensure_open()?;
        Ok(self.shared.state.read().current_count())
    }

    fn document_id(&self, rank: i64) -> Result<i64> {
        let rank = self.checked_rank(rank)?;
        let index = self.document_index(rank)?;
        Ok(self.shared.state.read().document_ids[index])
    }

    fn document_score(&self, rank: i64) -> Result<f64> {
        let rank = self.checked_rank(rank)?;
        if !self.shared.ranking {
            return Ok(DEFAULT_SCORE);
        }
        let index = self.document_index(rank)?;
        let state = self.shared.state.read();
        Ok(state
            .document_scores
            .as_ref()
            .map_or(DEFAULT_SCORE, |scores| scores[index]))
    }

    fn document_hits(&self, rank: i64) -> Result<Vec<Binding>> {
        let rank = self.checked_rank(rank)?;
        let index = self.document_index(rank)?;
        if let Some(hits) = self.cached_hits(index) {
            return hits;
        }

        self.shared.hits_future(rank).wait()?;
        self.cached_hits(index).unwrap_or_else(|| {
            Err(SemsearchError::consistency(format!(
                "hits for rank {rank} were not collected"
            )))
        })
    }

    fn document_text(
        &self,
        rank: i64,
        term_position: usize,
        length: usize,
    ) -> Result<Vec<String>> {
        let document = self.document_data(rank)?;
        Ok(document.token_span(term_position, length).to_vec())
    }

    fn document_uri(&self, rank: i64) -> Result<String> {
        Ok(self.document_data(rank)?.uri)
    }

    fn document_title(&self, rank: i64) -> Result<String> {
        Ok(self.document_data(rank)?.title)
    }

    fn document_metadata_field(
        &self,
        rank: i64,
        field: &str,
    ) -> Result<Option<serde_json::Value>> {
        Ok(self.document_data(rank)?.metadata.remove(field))
    }

    fn render_document(&self, rank: i64, out: &mut dyn Write) -> Result<()> {
        let hits = self.document_hits(rank)?;
        let document = self.document_data(rank)?;
        self.shared.engine.renderer().render(&document, &hits, out)
    }

    fn close(&self) -> Result<()> {
        self.shared.close();
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }
}

impl Drop for RankingQueryRunner {
    fn drop(&mut self) {
        self.shared.close();
    }
}

impl std::fmt::Debug for RankingQueryRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.state.read();
        f.debug_struct("RankingQueryRunner")
            .field("id", &self.shared.id)
            .field("ranking", &self.shared.ranking)
            .field("documents", &state.document_ids.len())
            .field("all_documents_collected", &state.all_documents_collected)
            .field("closed", &self.shared.is_closed())
            .finish()
    }
}
