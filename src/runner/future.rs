//! Completion handles for work queued on a runner's background worker.

use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use crate::error::{Result, SemsearchError};

#[derive(Debug, Clone)]
enum Outcome {
    Done,
    Failed(String),
    Closed,
}

#[derive(Debug, Default)]
struct State {
    outcome: Mutex<Option<Outcome>>,
    ready: Condvar,
}

/// Result-or-error handle for one background task.
///
/// The worker settles the handle exactly once; any number of caller threads
/// may block on it. A failure is reported to every waiter, as
/// [`SemsearchError::Background`] or [`SemsearchError::Closed`].
#[derive(Debug, Clone, Default)]
pub(crate) struct TaskFuture {
    state: Arc<State>,
}

impl TaskFuture {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Mark the task as successfully finished.
    pub(crate) fn complete(&self) {
        self.settle(Outcome::Done);
    }

    /// Mark the task as failed with the given message.
    pub(crate) fn fail<S: Into<String>>(&self, message: S) {
        self.settle(Outcome::Failed(message.into()));
    }

    /// Mark the task as abandoned because its runner closed.
    pub(crate) fn abandon(&self) {
        self.settle(Outcome::Closed);
    }

    /// Check if the task has been settled.
    #[cfg(test)]
    pub(crate) fn is_done(&self) -> bool {
        self.state.outcome.lock().is_some()
    }

    /// Block until the task is settled.
    pub(crate) fn wait(&self) -> Result<()> {
        let mut outcome = self.state.outcome.lock();
        while outcome.is_none() {
            self.state.ready.wait(&mut outcome);
        }
        match outcome.as_ref() {
            Some(Outcome::Done) => Ok(()),
            Some(Outcome::Failed(message)) => Err(SemsearchError::background(message.clone())),
            Some(Outcome::Closed) | None => Err(SemsearchError::closed(
                "runner closed before the task finished",
            )),
        }
    }

    // First settlement wins.
    fn settle(&self, value: Outcome) {
        let mut outcome = self.state.outcome.lock();
        if outcome.is_none() {
            *outcome = Some(value);
            self.state.ready.notify_all();
        }
    }
}
