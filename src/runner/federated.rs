//! Merging of several ranked runners into one result list.
//!
//! Each sub-runner ranks the documents of its own index. The federated
//! runner resolves its global ranks lazily by repeatedly taking the best
//! scoring head among the sub-runners. Resolved ranks are recorded and never
//! recomputed.

use std::fmt::Write;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::error::{Result, SemsearchError};
use crate::query::Binding;
use crate::runner::{QueryRunner, UNKNOWN_COUNT, check_rank};

const LOG_TARGET: &str = "semsearch::federated";

/// Federated document ID of document `sub_document_id` from sub-runner
/// `runner_index` out of `runners`.
pub fn federated_document_id(sub_document_id: i64, runner_index: usize, runners: usize) -> i64 {
    sub_document_id * runners as i64 + runner_index as i64
}

/// Split a federated document ID into `(runner_index, sub_document_id)`.
pub fn split_federated_document_id(document_id: i64, runners: usize) -> (usize, i64) {
    let runners = runners as i64;
    ((document_id % runners) as usize, document_id / runners)
}

#[derive(Debug, Default)]
struct MergeState {
    /// Next unconsumed local rank per sub-runner, `None` once exhausted.
    /// Initialized once every sub-runner count is known.
    cursors: Option<Vec<Option<i64>>>,
    counts: Vec<i64>,
    rank_to_runner: Vec<usize>,
    rank_to_sub_rank: Vec<i64>,
    previous_runner: Option<usize>,
}

/// Presents several query runners, each over its own index, as one.
///
/// Global ranks interleave the sub-runners by descending score. Among
/// sub-runners whose heads tie, the one following the previously chosen
/// sub-runner wins, so ties are spread across sources.
pub struct FederatedQueryRunner {
    runners: Vec<Box<dyn QueryRunner>>,
    merge: Mutex<MergeState>,
    closed: AtomicBool,
}

impl FederatedQueryRunner {
    /// Create a runner merging `runners`. Takes ownership of the
    /// sub-runners and closes them on [`close`](QueryRunner::close).
    pub fn new(runners: Vec<Box<dyn QueryRunner>>) -> Result<Self> {
        if runners.is_empty() {
            return Err(SemsearchError::invalid_argument(
                "a federated runner needs at least one sub-runner",
            ));
        }
        debug!(target: LOG_TARGET, runners = runners.len(), "created federated runner");
        Ok(FederatedQueryRunner {
            runners,
            merge: Mutex::new(MergeState::default()),
            closed: AtomicBool::new(false),
        })
    }

    /// Number of sub-runners.
    pub fn runner_count(&self) -> usize {
        self.runners.len()
    }

    /// The sub-runners, in federation order.
    pub fn runners(&self) -> &[Box<dyn QueryRunner>] {
        &self.runners
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(SemsearchError::closed("federated runner is closed"));
        }
        Ok(())
    }

    /// Sub-runner and local rank of global `rank`, resolving it if needed.
    fn locate(&self, rank: i64) -> Result<(usize, i64)> {
        self.ensure_open()?;
        let rank = check_rank(rank, self.documents_current_count()?)?;

        let mut merge = self.merge.lock();
        if merge.cursors.is_none() {
            let counts = self
                .runners
                .iter()
                .map(|runner| runner.documents_count_sync())
                .collect::<Result<Vec<_>>>()?;
            merge.cursors = Some(
                counts
                    .iter()
                    .map(|&count| (count > 0).then_some(0))
                    .collect(),
            );
            merge.counts = counts;
        }

        while merge.rank_to_runner.len() <= rank {
            self.resolve_next(&mut merge)?;
        }
        Ok((merge.rank_to_runner[rank], merge.rank_to_sub_rank[rank]))
    }

    fn resolve_next(&self, merge: &mut MergeState) -> Result<()> {
        let runners = self.runners.len();
        let start = merge.previous_runner.map_or(0, |previous| (previous + 1) % runners);
        let cursors = merge
            .cursors
            .as_ref()
            .ok_or_else(|| SemsearchError::consistency("merge cursors not initialized"))?;

        let mut best: Option<(usize, i64, f64)> = None;
        for offset in 0..runners {
            let runner_index = (start + offset) % runners;
            let Some(sub_rank) = cursors[runner_index] else {
                continue;
            };
            let score = self.runners[runner_index].document_score(sub_rank)?;
            if best.is_none_or(|(_, _, best_score)| score > best_score) {
                best = Some((runner_index, sub_rank, score));
            }
        }

        let Some((runner_index, sub_rank, _)) = best else {
            return Err(SemsearchError::consistency(format!(
                "all sub-runners exhausted after {} ranks",
                merge.rank_to_runner.len()
            )));
        };

        let next = sub_rank + 1;
        let exhausted = next >= merge.counts[runner_index];
        if let Some(cursors) = merge.cursors.as_mut() {
            cursors[runner_index] = (!exhausted).then_some(next);
        }
        merge.rank_to_runner.push(runner_index);
        merge.rank_to_sub_rank.push(sub_rank);
        merge.previous_runner = Some(runner_index);
        Ok(())
    }
}

impl QueryRunner for FederatedQueryRunner {
    fn documents_count(&self) -> Result<i64> {
        self.ensure_open()?;
        let mut total = 0;
        for runner in &self.runners {
            let count = runner.documents_count()?;
            if count < 0 {
                return Ok(UNKNOWN_COUNT);
            }
            total += count;
        }
        Ok(total)
    }

    fn documents_count_sync(&self) -> Result<i64> {
        self.ensure_open()?;
        self.runners
            .iter()
            .map(|runner| runner.documents_count_sync())
            .sum()
    }

    fn documents_current_count(&self) -> Result<i64> {
        self.ensure_open()?;
        self.runners
            .iter()
            .map(|runner| runner.documents_current_count())
            .sum()
    }

    fn document_id(&self, rank: i64) -> Result<i64> {
        let (runner_index, sub_rank) = self.locate(rank)?;
        let sub_document_id = self.runners[runner_index].document_id(sub_rank)?;
        Ok(federated_document_id(
            sub_document_id,
            runner_index,
            self.runners.len(),
        ))
    }

    fn document_score(&self, rank: i64) -> Result<f64> {
        let (runner_index, sub_rank) = self.locate(rank)?;
        self.runners[runner_index].document_score(sub_rank)
    }

    fn document_hits(&self, rank: i64) -> Result<Vec<Binding>> {
        let (runner_index, sub_rank) = self.locate(rank)?;
        let runners = self.runners.len();
        let hits = self.runners[runner_index]
            .document_hits(sub_rank)?
            .into_iter()
            .map(|hit| Binding {
                document_id: federated_document_id(hit.document_id, runner_index, runners),
                ..hit
            })
            .collect();
        Ok(hits)
    }

    fn document_text(
        &self,
        rank: i64,
        term_position: usize,
        length: usize,
    ) -> Result<Vec<String>> {
        let (runner_index, sub_rank) = self.locate(rank)?;
        self.runners[runner_index].document_text(sub_rank, term_position, length)
    }

    fn document_uri(&self, rank: i64) -> Result<String> {
        let (runner_index, sub_rank) = self.locate(rank)?;
        self.runners[runner_index].document_uri(sub_rank)
    }

    fn document_title(&self, rank: i64) -> Result<String> {
        let (runner_index, sub_rank) = self.locate(rank)?;
        self.runners[runner_index].document_title(sub_rank)
    }

    fn document_metadata_field(
        &self,
        rank: i64,
        field: &str,
    ) -> Result<Option<serde_json::Value>> {
        let (runner_index, sub_rank) = self.locate(rank)?;
        self.runners[runner_index].document_metadata_field(sub_rank, field)
    }

    fn render_document(&self, rank: i64, out: &mut dyn Write) -> Result<()> {
        let (runner_index, sub_rank) = self.locate(rank)?;
        self.runners[runner_index].render_document(sub_rank, out)
    }

    fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        for (runner_index, runner) in self.runners.iter().enumerate() {
            if let Err(e) = runner.close() {
                warn!(target: LOG_TARGET, runner_index, error = %e, "failed to close sub-runner");
            }
        }
        debug!(target: LOG_TARGET, "closed federated runner");
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for FederatedQueryRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FederatedQueryRunner")
            .field("runners", &self.runners.len())
            .field("resolved", &self.merge.lock().rank_to_runner.len())
            .field("closed", &self.closed.load(Ordering::Acquire))
            .finish()
    }
}

impl Drop for FederatedQueryRunner {
    fn drop(&mut self) {
        let _ = QueryRunner::close(self);
    }
}
