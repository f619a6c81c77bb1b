//! Per-tick results.

use thiserror::Error;

use crate::error::{HookError, SimulationError, SlotError};
use crate::models::{OperationKey, OrderId};
use crate::queue::QueueStage;
use crate::validation::ValidationError;

/// A non-fatal problem met during a tick. The tick always completes.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimulationIssue {
    /// A reordering hook failed; the batch was released in FIFO order.
    #[error("{stage} release fell back to FIFO: {error}")]
    HookFallback { stage: QueueStage, error: HookError },

    /// An order's input was repaired at intake.
    #[error("order {order_id}: {finding}")]
    Intake {
        order_id: OrderId,
        finding: ValidationError,
    },

    /// A slot claim or release was rejected.
    #[error("order {order_id}: {error}")]
    Slot { order_id: OrderId, error: SlotError },

    /// A finished operation was not at the head of its bundle.
    #[error("order {order_id}: operation {operation} finished out of sequence")]
    OutOfSequence {
        order_id: OrderId,
        operation: OperationKey,
    },

    /// Routing between phases failed.
    #[error(transparent)]
    Dispatch(#[from] SimulationError),
}

/// One released batch, as seen by the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct ReleaseSummary {
    pub stage: QueueStage,
    pub order_ids: Vec<OrderId>,
    /// Positions that differ from FIFO order.
    pub reorder_diff: usize,
}

/// What happened during one tick.
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    /// Clock after the tick.
    pub time: f64,
    pub delta: f64,
    /// Orders that arrived and entered the pre-acceptance queue.
    pub admitted: Vec<OrderId>,
    pub releases: Vec<ReleaseSummary>,
    /// Orders that finished quality this tick.
    pub completed: Vec<OrderId>,
    /// Index of the first event-log entry written by this tick; pass it to
    /// [`EventLog::since`](crate::models::EventLog::since).
    pub event_cursor: usize,
    /// Number of event-log entries written by this tick.
    pub events: usize,
    pub issues: Vec<SimulationIssue>,
}

impl TickReport {
    pub(crate) fn new(time: f64, delta: f64, event_cursor: usize) -> Self {
        Self {
            time,
            delta,
            admitted: Vec::new(),
            releases: Vec::new(),
            completed: Vec::new(),
            event_cursor,
            events: 0,
            issues: Vec::new(),
        }
    }

    pub(crate) fn note(&mut self, result: Result<(), SimulationError>) {
        if let Err(err) = result {
            self.issues.push(SimulationIssue::Dispatch(err));
        }
    }

    /// Whether the tick met any problem.
    pub fn has_issues(&self) -> bool {
        !self.issues.is_empty()
    }
}
