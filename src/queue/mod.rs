//! Intake batch queues.
//!
//! Three queues sit in front of the line: before acceptance, before
//! inspection, and after inspection (feeding disassembly). Each holds
//! orders for a configured delay and releases them as one batch.

mod batch;
mod hook;

pub use batch::{BatchQueue, BatchRelease, ReleaseOutcome};
pub use hook::ReorderHook;

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::{OrderId, Phase};

/// Which intake queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueStage {
    PreAcceptance,
    PreInspection,
    PostInspection,
}

impl QueueStage {
    /// All stages in line order.
    pub const ALL: [QueueStage; 3] = [
        QueueStage::PreAcceptance,
        QueueStage::PreInspection,
        QueueStage::PostInspection,
    ];

    /// Phase an order is in while waiting in this queue.
    pub fn phase(self) -> Phase {
        match self {
            QueueStage::PreAcceptance => Phase::IntakeQueue,
            QueueStage::PreInspection => Phase::InspectionQueue,
            QueueStage::PostInspection => Phase::DisassemblyQueue,
        }
    }
}

impl fmt::Display for QueueStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueueStage::PreAcceptance => f.write_str("pre-acceptance"),
            QueueStage::PreInspection => f.write_str("pre-inspection"),
            QueueStage::PostInspection => f.write_str("post-inspection"),
        }
    }
}

/// One order waiting in a batch queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueEntry {
    pub order_id: OrderId,
    pub enqueued_at: f64,
    /// Enqueue time plus the queue delay. Informational; the batch window
    /// decides the actual release.
    pub release_at: f64,
    pub released: bool,
    pub released_at: Option<f64>,
    /// FIFO position within the queue's lifetime.
    pub sequence: u64,
}

impl QueueEntry {
    /// Creates an unreleased entry.
    pub fn new(order_id: impl Into<OrderId>, enqueued_at: f64, release_at: f64, sequence: u64) -> Self {
        Self {
            order_id: order_id.into(),
            enqueued_at,
            release_at,
            released: false,
            released_at: None,
            sequence,
        }
    }
}
