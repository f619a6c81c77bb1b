//! Built-in dispatching rules.
//!
//! # Categories
//!
//! - **Queue**: FIFO
//! - **Time-based**: SJF, LJF
//! - **Due-date**: EDD (arrival time as due-date proxy)
//! - **Priority**: PRIORITY (caller-supplied predicate)
//! - **Stochastic**: RANDOM
//!
//! # Score Convention
//! All rules return lower scores for higher priority candidates.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fmt;
use std::sync::Arc;

use super::{Candidate, DispatchingRule, RuleScore, SchedulingContext};
use crate::models::Order;

// ======================== Queue rules ========================

/// First In First Out.
///
/// Prioritizes candidates by the time they joined the waiting list.
#[derive(Debug, Clone, Copy)]
pub struct Fifo;

impl DispatchingRule for Fifo {
    fn name(&self) -> &'static str {
        "FIFO"
    }

    fn evaluate(&self, candidate: &Candidate<'_>, _context: &SchedulingContext) -> RuleScore {
        candidate.enqueued_at
    }

    fn description(&self) -> &'static str {
        "First In First Out"
    }
}

// ======================== Time-based rules ========================

/// Shortest Job First.
///
/// Compares the summed expected remaining durations of each order.
///
/// # Reference
/// Smith (1956), optimal for minimizing mean flow time on a single machine.
#[derive(Debug, Clone, Copy)]
pub struct Sjf;

impl DispatchingRule for Sjf {
    fn name(&self) -> &'static str {
        "SJF"
    }

    fn evaluate(&self, candidate: &Candidate<'_>, _context: &SchedulingContext) -> RuleScore {
        candidate.order.expected_remaining()
    }

    fn description(&self) -> &'static str {
        "Shortest Job First"
    }
}

/// Longest Job First.
#[derive(Debug, Clone, Copy)]
pub struct Ljf;

impl DispatchingRule for Ljf {
    fn name(&self) -> &'static str {
        "LJF"
    }

    fn evaluate(&self, candidate: &Candidate<'_>, _context: &SchedulingContext) -> RuleScore {
        -candidate.order.expected_remaining()
    }

    fn description(&self) -> &'static str {
        "Longest Job First"
    }
}

// ======================== Due-date rules ========================

/// Earliest Due Date.
///
/// Orders carry no explicit due date; arrival time stands in for it.
///
/// # Reference
/// Jackson (1955), optimal for minimizing maximum lateness on a single machine.
#[derive(Debug, Clone, Copy)]
pub struct Edd;

impl DispatchingRule for Edd {
    fn name(&self) -> &'static str {
        "EDD"
    }

    fn evaluate(&self, candidate: &Candidate<'_>, _context: &SchedulingContext) -> RuleScore {
        candidate.order.arrival_time
    }

    fn description(&self) -> &'static str {
        "Earliest Due Date"
    }
}

// ======================== Priority rule ========================

/// Predicate-based priority.
///
/// Candidates matching the predicate score 0, all others 1. Combine with a
/// [`Fifo`] tie-breaker for the FIFO fallback.
#[derive(Clone)]
pub struct Priority {
    predicate: Arc<dyn Fn(&Order) -> bool + Send + Sync>,
}

impl Priority {
    /// Creates a priority rule from a caller-supplied predicate.
    pub fn new<F>(predicate: F) -> Self
    where
        F: Fn(&Order) -> bool + Send + Sync + 'static,
    {
        Self {
            predicate: Arc::new(predicate),
        }
    }
}

impl Default for Priority {
    /// Matches orders with a positive priority.
    fn default() -> Self {
        Self::new(|order| order.priority > 0)
    }
}

impl fmt::Debug for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Priority")
    }
}

impl DispatchingRule for Priority {
    fn name(&self) -> &'static str {
        "PRIORITY"
    }

    fn evaluate(&self, candidate: &Candidate<'_>, _context: &SchedulingContext) -> RuleScore {
        if (self.predicate)(candidate.order) {
            0.0
        } else {
            1.0
        }
    }

    fn description(&self) -> &'static str {
        "Predicate Priority"
    }
}

// ======================== Stochastic rule ========================

/// Uniform random selection.
///
/// Each candidate gets an independent uniform draw derived from the context
/// seed and its enqueue sequence; the smallest draw wins. The same seed
/// always yields the same choice.
#[derive(Debug, Clone, Copy)]
pub struct Random;

impl DispatchingRule for Random {
    fn name(&self) -> &'static str {
        "RANDOM"
    }

    fn evaluate(&self, candidate: &Candidate<'_>, context: &SchedulingContext) -> RuleScore {
        let mixed = context
            .seed
            .wrapping_add(candidate.sequence.wrapping_mul(0x9E37_79B9_7F4A_7C15));
        StdRng::seed_from_u64(mixed).random::<f64>()
    }

    fn description(&self) -> &'static str {
        "Uniform Random"
    }
}
