//! External reordering hook.
//!
//! A hook receives a batch in FIFO order at release time and may return a
//! permutation of its order ids. Any failure (an error, a panic, a result
//! that is not a permutation, or a call that overruns its wall-clock budget)
//! degrades the release to FIFO.
//!
//! With a budget the hook runs on a worker thread and the tick waits at most
//! the budget for its answer. A late answer is dropped; the worker is not
//! interrupted.

use std::collections::HashSet;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use super::{QueueEntry, QueueStage};
use crate::error::HookError;
use crate::models::OrderId;

/// Reorders a batch at release time.
pub trait ReorderHook: Send + Sync {
    /// Returns the order ids of `entries` in the desired release order.
    fn reorder(&self, stage: QueueStage, entries: &[QueueEntry]) -> Result<Vec<OrderId>, HookError>;
}

impl<F> ReorderHook for F
where
    F: Fn(QueueStage, &[QueueEntry]) -> Result<Vec<OrderId>, HookError> + Send + Sync,
{
    fn reorder(&self, stage: QueueStage, entries: &[QueueEntry]) -> Result<Vec<OrderId>, HookError> {
        self(stage, entries)
    }
}

/// Calls `hook` and checks its answer. On success returns the entry indices
/// in release order.
pub(crate) fn run_hook(
    hook: &Arc<dyn ReorderHook>,
    stage: QueueStage,
    entries: &[QueueEntry],
    budget: Option<Duration>,
) -> Result<Vec<usize>, HookError> {
    let answer = match budget {
        None => call(hook.as_ref(), stage, entries)?,
        Some(budget) => call_bounded(Arc::clone(hook), stage, entries, budget)?,
    };
    permutation_indices(entries, &answer)
}

fn call(hook: &dyn ReorderHook, stage: QueueStage, entries: &[QueueEntry]) -> Result<Vec<OrderId>, HookError> {
    catch_unwind(AssertUnwindSafe(|| hook.reorder(stage, entries))).map_err(|_| HookError::Panicked)?
}

fn call_bounded(
    hook: Arc<dyn ReorderHook>,
    stage: QueueStage,
    entries: &[QueueEntry],
    budget: Duration,
) -> Result<Vec<OrderId>, HookError> {
    let (tx, rx) = mpsc::channel();
    let batch = entries.to_vec();
    thread::Builder::new()
        .name(format!("reorder-{stage}"))
        .spawn(move || {
            // The receiver is gone when the answer is late.
            let _ = tx.send(call(hook.as_ref(), stage, &batch));
        })
        .map_err(|err| HookError::Failed(err.to_string()))?;

    match rx.recv_timeout(budget) {
        Ok(answer) => answer,
        Err(RecvTimeoutError::Timeout) => Err(HookError::TimedOut {
            budget_ms: budget.as_millis() as u64,
        }),
        Err(RecvTimeoutError::Disconnected) => Err(HookError::Panicked),
    }
}

fn permutation_indices(entries: &[QueueEntry], ids: &[OrderId]) -> Result<Vec<usize>, HookError> {
    if ids.len() != entries.len() {
        return Err(HookError::NotAPermutation);
    }
    let mut seen = HashSet::with_capacity(ids.len());
    ids.iter()
        .map(|id| {
            if !seen.insert(id.as_str()) {
                return Err(HookError::NotAPermutation);
            }
            entries
                .iter()
                .position(|e| &e.order_id == id)
                .ok_or(HookError::NotAPermutation)
        })
        .collect()
}
