//! Scheduling context for dispatching rule evaluation.

use crate::models::Order;

/// Runtime state passed to dispatching rules.
///
/// All times are in minutes relative to the simulation epoch (t=0).
#[derive(Debug, Clone, Copy, Default)]
pub struct SchedulingContext {
    /// Current simulation time (minutes).
    pub now: f64,
    /// Per-selection random seed. Rules that draw randomness derive their
    /// draws from this value only, which keeps selection reproducible.
    pub seed: u64,
}

impl SchedulingContext {
    /// Creates a context at the given time.
    pub fn at_time(now: f64) -> Self {
        Self { now, seed: 0 }
    }

    /// Sets the selection seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

/// A waiting order as seen by a dispatching rule.
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    pub order: &'a Order,
    /// When the order joined the waiting list (minutes).
    pub enqueued_at: f64,
    /// Monotonic enqueue counter; the final tie-breaker.
    pub sequence: u64,
}
