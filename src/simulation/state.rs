//! Simulation state owned by the dispatcher.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;

use super::Clock;
use crate::capacity::{AssignmentTable, MainPhaseStation, SlotPool};
use crate::config::SimulationConfig;
use crate::dispatching::RuleEngine;
use crate::models::{EventLog, Order, OrderId, Phase, PhaseFamily};
use crate::queue::{BatchQueue, QueueStage, ReorderHook};

use super::SimulationIssue;

/// Single-capacity phases in line order.
pub const MAIN_PHASES: [Phase; 3] = [Phase::Acceptance, Phase::Inspection, Phase::Quality];

fn station_index(phase: Phase) -> usize {
    match phase {
        Phase::Inspection => 1,
        Phase::Quality => 2,
        _ => 0,
    }
}

fn queue_index(stage: QueueStage) -> usize {
    match stage {
        QueueStage::PreAcceptance => 0,
        QueueStage::PreInspection => 1,
        QueueStage::PostInspection => 2,
    }
}

fn family_index(family: PhaseFamily) -> usize {
    match family {
        PhaseFamily::Disassembly => 0,
        PhaseFamily::Reassembly => 1,
    }
}

/// A slot whose busy flag and assignment count disagree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvariantViolation {
    pub family: PhaseFamily,
    pub slot: usize,
    pub busy: bool,
    /// Active assignments referencing the slot.
    pub references: usize,
}

/// Everything a run mutates. Only the dispatcher writes to it.
#[derive(Debug)]
pub struct SimulationState {
    pub(crate) config: SimulationConfig,
    pub(crate) clock: Clock,
    pub(crate) orders: BTreeMap<OrderId, Order>,
    /// Future arrivals, sorted by arrival time, stable in submission order.
    pub(crate) scheduled: Vec<Order>,
    /// Ids of purged orders; still reserved.
    pub(crate) retired: BTreeSet<OrderId>,
    pub(crate) queues: [BatchQueue; 3],
    pub(crate) stations: [MainPhaseStation; 3],
    pub(crate) pools: [SlotPool; 2],
    pub(crate) assignments: AssignmentTable,
    /// Orders working through each family's bundle, in entry order.
    pub(crate) pending: [Vec<OrderId>; 2],
    pub(crate) log: EventLog,
    pub(crate) rng: StdRng,
    /// Issues raised outside a tick, delivered with the next report.
    pub(crate) deferred: Vec<SimulationIssue>,
}

impl SimulationState {
    /// Builds empty state from a validated configuration.
    pub(crate) fn new(config: SimulationConfig) -> Self {
        let budget = Duration::from_millis(config.reorder_timeout_ms);
        let queues = QueueStage::ALL.map(|stage| {
            BatchQueue::new(stage, config.queue_delays.for_stage(stage)).with_hook_budget(budget)
        });
        let stations =
            MAIN_PHASES.map(|phase| MainPhaseStation::new(phase, config.policies.for_phase(phase).engine()));
        let pools = PhaseFamily::ALL
            .map(|family| config.pool(family).build(family, config.changeover_minutes));

        Self {
            clock: Clock::new(),
            orders: BTreeMap::new(),
            scheduled: Vec::new(),
            retired: BTreeSet::new(),
            queues,
            stations,
            pools,
            assignments: AssignmentTable::new(),
            pending: [Vec::new(), Vec::new()],
            log: EventLog::new(),
            rng: StdRng::seed_from_u64(config.seed),
            deferred: Vec::new(),
            config,
        }
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn now(&self) -> f64 {
        self.clock.now()
    }

    /// Orders that have arrived, keyed by id.
    pub fn orders(&self) -> &BTreeMap<OrderId, Order> {
        &self.orders
    }

    pub fn order(&self, order_id: &str) -> Option<&Order> {
        self.orders
            .get(order_id)
            .or_else(|| self.scheduled.iter().find(|o| o.id == order_id))
    }

    /// Orders submitted with a future arrival time.
    pub fn scheduled(&self) -> &[Order] {
        &self.scheduled
    }

    pub fn log(&self) -> &EventLog {
        &self.log
    }

    pub fn queue(&self, stage: QueueStage) -> &BatchQueue {
        &self.queues[queue_index(stage)]
    }

    pub(crate) fn queue_mut(&mut self, stage: QueueStage) -> &mut BatchQueue {
        &mut self.queues[queue_index(stage)]
    }

    /// The station of a main phase. Non-main phases map to acceptance.
    pub fn station(&self, phase: Phase) -> &MainPhaseStation {
        &self.stations[station_index(phase)]
    }

    pub(crate) fn station_mut(&mut self, phase: Phase) -> &mut MainPhaseStation {
        &mut self.stations[station_index(phase)]
    }

    pub fn pool(&self, family: PhaseFamily) -> &SlotPool {
        &self.pools[family_index(family)]
    }

    pub(crate) fn pool_mut(&mut self, family: PhaseFamily) -> &mut SlotPool {
        &mut self.pools[family_index(family)]
    }

    pub fn assignments(&self) -> &AssignmentTable {
        &self.assignments
    }

    /// Orders in a family's phase, in entry order.
    pub fn pending(&self, family: PhaseFamily) -> &[OrderId] {
        &self.pending[family_index(family)]
    }

    pub(crate) fn pending_mut(&mut self, family: PhaseFamily) -> &mut Vec<OrderId> {
        &mut self.pending[family_index(family)]
    }

    pub(crate) fn set_hook(&mut self, stage: QueueStage, hook: Option<Arc<dyn ReorderHook>>) {
        self.queue_mut(stage).set_hook(hook);
    }

    pub(crate) fn set_engine(&mut self, phase: Phase, engine: RuleEngine) {
        self.station_mut(phase).set_engine(engine);
    }

    /// Whether an id is taken by an arrived, scheduled or purged order.
    pub(crate) fn is_known(&self, order_id: &str) -> bool {
        self.orders.contains_key(order_id)
            || self.retired.contains(order_id)
            || self.scheduled.iter().any(|o| o.id == order_id)
    }

    /// Whether the order is occupying a station or a slot right now.
    pub fn is_processing(&self, order_id: &str) -> bool {
        self.stations.iter().any(|s| s.is_processing(order_id))
            || self.assignments.has_order(order_id)
    }

    /// Slots where busy state and assignment count disagree: a busy slot
    /// without exactly one assignment, or an idle slot with any.
    pub fn invariant_violations(&self) -> Vec<InvariantViolation> {
        let mut violations = Vec::new();
        for pool in &self.pools {
            for slot in pool.slots() {
                let references = self.assignments.references(pool.family(), slot.index);
                let busy = slot.is_busy();
                if (busy && references != 1) || (!busy && references != 0) {
                    violations.push(InvariantViolation {
                        family: pool.family(),
                        slot: slot.index,
                        busy,
                        references,
                    });
                }
            }
        }
        violations
    }

    /// Capacity per processing phase, for utilization.
    pub fn capacities(&self) -> BTreeMap<Phase, usize> {
        let mut capacities: BTreeMap<Phase, usize> = MAIN_PHASES.iter().map(|&p| (p, 1)).collect();
        for pool in &self.pools {
            capacities.insert(Phase::from(pool.family()), pool.len());
        }
        capacities
    }
}
