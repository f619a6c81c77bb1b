//! Wait-time batch queue.
//!
//! Orders accumulate in a batch window that opens when the first order
//! enters an empty queue. Once the configured delay has elapsed since the
//! window opened, every waiting order is released together, in FIFO order
//! or in the order returned by the reordering hook.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use super::hook::{run_hook, ReorderHook};
use super::{QueueEntry, QueueStage};
use crate::error::{HookError, QueueError};

/// Result of a release check.
#[derive(Debug, Clone, PartialEq)]
pub enum ReleaseOutcome {
    /// No window is open and nothing is waiting.
    Idle,
    /// A window is open; `remaining` minutes until release.
    Waiting { remaining: f64 },
    /// The window was open on an empty queue and has been closed.
    NothingToRelease,
    /// A batch was released.
    Released(BatchRelease),
}

/// One released batch.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchRelease {
    pub stage: QueueStage,
    pub released_at: f64,
    /// Entries in release order, marked released.
    pub entries: Vec<QueueEntry>,
    /// Number of positions that differ from FIFO order.
    pub reorder_diff: usize,
    /// Set when a hook was configured but its answer was discarded.
    pub hook_error: Option<HookError>,
}

impl BatchRelease {
    /// Released order ids in release order.
    pub fn order_ids(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.order_id.as_str())
    }
}

/// FIFO buffer with a release delay and an optional reordering hook.
#[derive(Clone)]
pub struct BatchQueue {
    stage: QueueStage,
    delay: f64,
    entries: Vec<QueueEntry>,
    window_start: Option<f64>,
    hook: Option<Arc<dyn ReorderHook>>,
    hook_budget: Option<Duration>,
    next_sequence: u64,
}

impl BatchQueue {
    /// Creates an empty queue with the given release delay (minutes).
    pub fn new(stage: QueueStage, delay: f64) -> Self {
        Self {
            stage,
            delay: delay.max(0.0),
            entries: Vec::new(),
            window_start: None,
            hook: None,
            hook_budget: None,
            next_sequence: 0,
        }
    }

    /// Installs a reordering hook.
    pub fn with_hook(mut self, hook: Arc<dyn ReorderHook>) -> Self {
        self.hook = Some(hook);
        self
    }

    /// Sets the wall-clock budget for a single hook call.
    pub fn with_hook_budget(mut self, budget: Duration) -> Self {
        self.hook_budget = Some(budget);
        self
    }

    pub(crate) fn set_hook(&mut self, hook: Option<Arc<dyn ReorderHook>>) {
        self.hook = hook;
    }

    pub fn stage(&self) -> QueueStage {
        self.stage
    }

    pub fn delay(&self) -> f64 {
        self.delay
    }

    /// Orders waiting for release, in FIFO order.
    pub fn entries(&self) -> &[QueueEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Start of the open batch window, if any.
    pub fn window_start(&self) -> Option<f64> {
        self.window_start
    }

    pub fn contains(&self, order_id: &str) -> bool {
        self.entries.iter().any(|e| e.order_id == order_id)
    }

    /// Appends an order. The first order entering an empty queue opens the
    /// batch window at `now` (no window is used when the delay is zero).
    pub fn enqueue(&mut self, order_id: &str, now: f64) -> Result<(), QueueError> {
        if self.contains(order_id) {
            return Err(QueueError::DuplicateEntry {
                order_id: order_id.to_string(),
                stage: self.stage,
            });
        }
        if self.entries.is_empty() && self.delay > 0.0 && self.window_start.is_none() {
            self.window_start = Some(now);
        }
        let entry = QueueEntry::new(order_id, now, now + self.delay, self.next_sequence);
        self.next_sequence += 1;
        self.entries.push(entry);
        Ok(())
    }

    /// Checks the batch window and releases the batch when it is due.
    pub fn check_and_release(&mut self, now: f64) -> ReleaseOutcome {
        if self.delay <= 0.0 {
            if self.entries.is_empty() {
                return ReleaseOutcome::Idle;
            }
            return ReleaseOutcome::Released(self.release(now));
        }

        let Some(start) = self.window_start else {
            return ReleaseOutcome::Idle;
        };
        if self.entries.is_empty() {
            self.window_start = None;
            return ReleaseOutcome::NothingToRelease;
        }

        let release_at = start + self.delay;
        if now + 1e-9 < release_at {
            return ReleaseOutcome::Waiting {
                remaining: release_at - now,
            };
        }
        ReleaseOutcome::Released(self.release(now))
    }

    fn release(&mut self, now: f64) -> BatchRelease {
        let fifo = std::mem::take(&mut self.entries);
        self.window_start = None;

        let (order, hook_error): (Vec<usize>, Option<HookError>) = match &self.hook {
            None => ((0..fifo.len()).collect(), None),
            Some(hook) => match run_hook(hook, self.stage, &fifo, self.hook_budget) {
                Ok(order) => (order, None),
                Err(err) => {
                    warn!(stage = %self.stage, error = %err, "reordering hook failed, releasing in FIFO order");
                    ((0..fifo.len()).collect(), Some(err))
                }
            },
        };

        let reorder_diff = order
            .iter()
            .enumerate()
            .filter(|&(pos, &idx)| pos != idx)
            .count();
        let entries: Vec<QueueEntry> = order
            .into_iter()
            .map(|idx| {
                let mut entry = fifo[idx].clone();
                entry.released = true;
                entry.released_at = Some(now);
                entry
            })
            .collect();

        debug!(
            stage = %self.stage,
            released = entries.len(),
            reorder_diff,
            time = now,
            "batch released"
        );

        BatchRelease {
            stage: self.stage,
            released_at: now,
            entries,
            reorder_diff,
            hook_error,
        }
    }
}

impl fmt::Debug for BatchQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchQueue")
            .field("stage", &self.stage)
            .field("delay", &self.delay)
            .field("entries", &self.entries)
            .field("window_start", &self.window_start)
            .field("hook", &self.hook.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::OrderId;

    fn filled(delay: f64, ids: &[&str]) -> BatchQueue {
        let mut q = BatchQueue::new(QueueStage::PreInspection, delay);
        for id in ids {
            q.enqueue(id, 0.0).unwrap();
        }
        q
    }

    fn released_ids(outcome: ReleaseOutcome) -> Vec<String> {
        match outcome {
            ReleaseOutcome::Released(batch) => batch.order_ids().map(String::from).collect(),
            other => panic!("expected release, got {other:?}"),
        }
    }

    #[test]
    fn test_zero_delay_releases_immediately() {
        let mut q = filled(0.0, &["a", "b"]);
        assert!(q.window_start().is_none());
        assert_eq!(released_ids(q.check_and_release(0.0)), vec!["a", "b"]);
        assert!(q.is_empty());
        assert_eq!(q.check_and_release(1.0), ReleaseOutcome::Idle);
    }

    #[test]
    fn test_batch_window() {
        let mut q = filled(10.0, &["a", "b", "c"]);
        assert_eq!(q.window_start(), Some(0.0));

        match q.check_and_release(9.0) {
            ReleaseOutcome::Waiting { remaining } => assert!((remaining - 1.0).abs() < 1e-9),
            other => panic!("expected waiting, got {other:?}"),
        }
        assert_eq!(q.len(), 3);

        assert_eq!(released_ids(q.check_and_release(10.0)), vec!["a", "b", "c"]);
        assert!(q.window_start().is_none());
    }

    #[test]
    fn test_late_joiners_ride_the_open_window() {
        let mut q = filled(10.0, &["a"]);
        q.enqueue("b", 6.0).unwrap();
        assert_eq!(q.window_start(), Some(0.0));
        assert_eq!(released_ids(q.check_and_release(10.0)), vec!["a", "b"]);

        q.enqueue("c", 12.0).unwrap();
        assert_eq!(q.window_start(), Some(12.0));
        assert!(matches!(q.check_and_release(21.0), ReleaseOutcome::Waiting { .. }));
    }

    #[test]
    fn test_duplicate_enqueue_rejected() {
        let mut q = filled(5.0, &["a"]);
        assert_eq!(
            q.enqueue("a", 1.0),
            Err(QueueError::DuplicateEntry {
                order_id: "a".into(),
                stage: QueueStage::PreInspection,
            })
        );
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn test_empty_window_closes() {
        let mut q = BatchQueue::new(QueueStage::PreAcceptance, 5.0);
        q.window_start = Some(0.0);
        assert_eq!(q.check_and_release(1.0), ReleaseOutcome::NothingToRelease);
        assert!(q.window_start().is_none());
        assert_eq!(q.check_and_release(2.0), ReleaseOutcome::Idle);
    }

    #[test]
    fn test_hook_reorders_and_counts_diff() {
        let reverse = |_: QueueStage, entries: &[QueueEntry]| -> Result<Vec<OrderId>, HookError> {
            Ok(entries.iter().rev().map(|e| e.order_id.clone()).collect())
        };
        let mut q = filled(10.0, &["a", "b", "c"]).with_hook(Arc::new(reverse));
        match q.check_and_release(10.0) {
            ReleaseOutcome::Released(batch) => {
                assert_eq!(batch.order_ids().collect::<Vec<_>>(), vec!["c", "b", "a"]);
                assert_eq!(batch.reorder_diff, 2);
                assert!(batch.hook_error.is_none());
                assert!(batch.entries.iter().all(|e| e.released && e.released_at == Some(10.0)));
            }
            other => panic!("expected release, got {other:?}"),
        }
    }

    #[test]
    fn test_hook_failure_falls_back_to_fifo() {
        let failing = |_: QueueStage, _: &[QueueEntry]| -> Result<Vec<OrderId>, HookError> {
            Err(HookError::Failed("no answer".into()))
        };
        let mut q = filled(0.0, &["a", "b"]).with_hook(Arc::new(failing));
        match q.check_and_release(0.0) {
            ReleaseOutcome::Released(batch) => {
                assert_eq!(batch.order_ids().collect::<Vec<_>>(), vec!["a", "b"]);
                assert_eq!(batch.reorder_diff, 0);
                assert_eq!(batch.hook_error, Some(HookError::Failed("no answer".into())));
            }
            other => panic!("expected release, got {other:?}"),
        }
    }
}
