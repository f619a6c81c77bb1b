//! Point-in-time view of queues, stations and slots for status displays.

use serde::Serialize;

use super::state::MAIN_PHASES;
use super::SimulationState;
use crate::capacity::{Occupancy, SlotStatus};
use crate::models::{OrderId, Phase, PhaseFamily};
use crate::queue::QueueStage;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueueSnapshot {
    pub stage: QueueStage,
    pub depth: usize,
    pub delay: f64,
    pub window_start: Option<f64>,
    pub order_ids: Vec<OrderId>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StationSnapshot {
    pub phase: Phase,
    pub occupant: Option<Occupancy>,
    pub waiting: Vec<OrderId>,
    /// Rule names of the active policy.
    pub policy: Vec<&'static str>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PoolSnapshot {
    pub family: PhaseFamily,
    pub busy: usize,
    pub slots: Vec<SlotStatus>,
    /// Orders in this phase, running or waiting for a slot.
    pub pending: Vec<OrderId>,
}

/// Order counts by state.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OrderCounts {
    /// Submitted but not yet arrived.
    pub scheduled: usize,
    pub in_progress: usize,
    pub completed: usize,
    pub cancelled: usize,
}

/// Serializable status of the whole line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationSnapshot {
    pub time: f64,
    pub queues: Vec<QueueSnapshot>,
    pub stations: Vec<StationSnapshot>,
    pub pools: Vec<PoolSnapshot>,
    pub orders: OrderCounts,
    pub events: usize,
}

impl SimulationSnapshot {
    pub(crate) fn capture(state: &SimulationState) -> Self {
        let queues = QueueStage::ALL
            .iter()
            .map(|&stage| {
                let queue = state.queue(stage);
                QueueSnapshot {
                    stage,
                    depth: queue.len(),
                    delay: queue.delay(),
                    window_start: queue.window_start(),
                    order_ids: queue.entries().iter().map(|e| e.order_id.clone()).collect(),
                }
            })
            .collect();

        let stations = MAIN_PHASES
            .iter()
            .map(|&phase| {
                let station = state.station(phase);
                StationSnapshot {
                    phase,
                    occupant: station.occupant().cloned(),
                    waiting: station.waiting().iter().map(|w| w.order_id.clone()).collect(),
                    policy: station.engine().rule_names(),
                }
            })
            .collect();

        let pools = PhaseFamily::ALL
            .iter()
            .map(|&family| {
                let pool = state.pool(family);
                PoolSnapshot {
                    family,
                    busy: pool.busy_count(),
                    slots: pool.status(),
                    pending: state.pending(family).to_vec(),
                }
            })
            .collect();

        let mut orders = OrderCounts {
            scheduled: state.scheduled().len(),
            ..OrderCounts::default()
        };
        for order in state.orders().values() {
            if order.is_completed() {
                orders.completed += 1;
            } else if order.is_cancelled() {
                orders.cancelled += 1;
            } else {
                orders.in_progress += 1;
            }
        }

        Self {
            time: state.now(),
            queues,
            stations,
            pools,
            orders,
            events: state.log().len(),
        }
    }

    pub fn queue(&self, stage: QueueStage) -> Option<&QueueSnapshot> {
        self.queues.iter().find(|q| q.stage == stage)
    }

    pub fn station(&self, phase: Phase) -> Option<&StationSnapshot> {
        self.stations.iter().find(|s| s.phase == phase)
    }

    pub fn pool(&self, family: PhaseFamily) -> Option<&PoolSnapshot> {
        self.pools.iter().find(|p| p.family == family)
    }
}
