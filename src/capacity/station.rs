//! Single-capacity main-phase station (acceptance, inspection, quality).
//!
//! # Tick
//!
//! 1. If occupied, reduce the occupant's remaining time by the delta.
//! 2. On reaching zero, emit the `_END` record and free the station.
//! 3. If free, pull the next candidate from the waiting list with the
//!    station's [`RuleEngine`] and emit the `_START` record.
//!
//! The occupant's duration is the one resolved at intake and stored in the
//! order's [`PhaseRecord`](crate::models::PhaseRecord); it is never
//! re-rolled.
//!
//! # Reference
//! Pinedo (2016), "Scheduling", Ch. 4: Priority Dispatching

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::debug;

use crate::dispatching::{Candidate, RuleEngine, SchedulingContext};
use crate::models::{EventLog, Order, OrderId, Phase};
use crate::EPSILON;

/// An order waiting for the station.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WaitingEntry {
    pub order_id: OrderId,
    pub enqueued_at: f64,
    pub sequence: u64,
}

/// The order currently being processed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Occupancy {
    pub order_id: OrderId,
    pub started_at: f64,
    pub duration: f64,
    pub remaining: f64,
}

/// What happened at a station during one tick.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StationTick {
    /// Order whose processing ended this tick.
    pub finished: Option<OrderId>,
    /// Order that started processing this tick.
    pub started: Option<OrderId>,
}

/// Capacity-1 station with a policy-ordered waiting list.
#[derive(Debug, Clone)]
pub struct MainPhaseStation {
    phase: Phase,
    engine: RuleEngine,
    waiting: Vec<WaitingEntry>,
    occupant: Option<Occupancy>,
    next_sequence: u64,
}

impl MainPhaseStation {
    /// Creates an empty station for `phase`.
    pub fn new(phase: Phase, engine: RuleEngine) -> Self {
        Self {
            phase,
            engine,
            waiting: Vec::new(),
            occupant: None,
            next_sequence: 0,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn engine(&self) -> &RuleEngine {
        &self.engine
    }

    /// Swaps the scheduling policy. Takes effect at the next pull.
    pub fn set_engine(&mut self, engine: RuleEngine) {
        self.engine = engine;
    }

    pub fn occupant(&self) -> Option<&Occupancy> {
        self.occupant.as_ref()
    }

    pub fn waiting(&self) -> &[WaitingEntry] {
        &self.waiting
    }

    pub fn is_busy(&self) -> bool {
        self.occupant.is_some()
    }

    /// Whether the order is waiting at or occupying the station.
    pub fn holds(&self, order_id: &str) -> bool {
        self.is_processing(order_id) || self.waiting.iter().any(|w| w.order_id == order_id)
    }

    /// Whether the order is the current occupant.
    pub fn is_processing(&self, order_id: &str) -> bool {
        self.occupant
            .as_ref()
            .is_some_and(|o| o.order_id == order_id)
    }

    /// Adds an order to the waiting list. Returns `false` when the order is
    /// already held by the station.
    pub fn enqueue(&mut self, order_id: &str, now: f64) -> bool {
        if self.holds(order_id) {
            return false;
        }
        self.waiting.push(WaitingEntry {
            order_id: order_id.to_string(),
            enqueued_at: now,
            sequence: self.next_sequence,
        });
        self.next_sequence += 1;
        true
    }

    /// Advances the station by `delta` minutes. `ctx.now` is the clock after
    /// it advanced.
    pub fn tick(
        &mut self,
        delta: f64,
        ctx: &SchedulingContext,
        orders: &mut BTreeMap<OrderId, Order>,
        log: &mut EventLog,
    ) -> StationTick {
        let mut outcome = StationTick::default();

        let due = match self.occupant.as_mut() {
            Some(occupant) => {
                occupant.remaining -= delta;
                occupant.remaining <= EPSILON
            }
            None => false,
        };
        if due {
            if let Some(done) = self.occupant.take() {
                outcome.finished = Some(self.finish(done, ctx.now, orders, log));
            }
        }

        if self.occupant.is_none() {
            outcome.started = self.pull(ctx, orders, log);
        }
        outcome
    }

    fn finish(
        &mut self,
        done: Occupancy,
        now: f64,
        orders: &mut BTreeMap<OrderId, Order>,
        log: &mut EventLog,
    ) -> OrderId {
        log.end(now, &done.order_id, self.phase, self.phase.activity_name(), None);
        if let Some(order) = orders.get_mut(&done.order_id) {
            let record = order.record_mut(self.phase);
            record.actual = now - done.started_at;
            record.completed = true;
        }
        debug!(phase = %self.phase, order_id = %done.order_id, time = now, "station finished");
        done.order_id
    }

    /// Selects and starts the next waiting order. Cancelled and unknown
    /// orders are never candidates.
    fn pull(
        &mut self,
        ctx: &SchedulingContext,
        orders: &mut BTreeMap<OrderId, Order>,
        log: &mut EventLog,
    ) -> Option<OrderId> {
        let (positions, candidates): (Vec<usize>, Vec<Candidate<'_>>) = self
            .waiting
            .iter()
            .enumerate()
            .filter_map(|(pos, w)| {
                let order = orders.get(&w.order_id).filter(|o| !o.is_cancelled())?;
                Some((
                    pos,
                    Candidate {
                        order,
                        enqueued_at: w.enqueued_at,
                        sequence: w.sequence,
                    },
                ))
            })
            .unzip();

        let chosen = self.engine.select(&candidates, ctx)?;
        let entry = self.waiting.remove(positions[chosen]);

        let order = orders.get_mut(&entry.order_id)?;
        let record = order.record_mut(self.phase);
        let duration = record.expected.max(0.0);
        record.start = Some(ctx.now);

        log.start(ctx.now, &entry.order_id, self.phase, self.phase.activity_name(), None);
        debug!(
            phase = %self.phase,
            order_id = %entry.order_id,
            duration,
            time = ctx.now,
            "station started"
        );

        self.occupant = Some(Occupancy {
            order_id: entry.order_id.clone(),
            started_at: ctx.now,
            duration,
            remaining: duration,
        });
        Some(entry.order_id)
    }
}
