//! Line performance indicators.
//!
//! # Metrics
//!
//! | Metric | Definition |
//! |--------|-----------|
//! | Makespan | Latest completion time among completed orders |
//! | Mean lead time | Mean(last segment end) over completed orders |
//! | Mean waiting time | Mean(lead − processing) over completed orders |
//! | Utilization | Busy time / (elapsed × capacity), per phase |
//!
//! # Reference
//! Pinedo (2016), "Scheduling", Ch. 1.2: Performance Measures

use std::collections::BTreeMap;

use serde::Serialize;

use super::{busy_time_by_phase, order_metrics};
use crate::models::{EventLog, Phase};

/// Utilization of one phase.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhaseUtilization {
    pub phase: Phase,
    /// Units of capacity (1 for main-phase stations, slot count for pools).
    pub capacity: usize,
    /// Summed segment time (minutes).
    pub busy: f64,
    /// `busy / (elapsed × capacity)`, 0 when either factor is 0.
    pub utilization: f64,
}

impl PhaseUtilization {
    /// Computes utilization for every phase in `capacities`.
    pub fn calculate(
        log: &EventLog,
        elapsed: f64,
        capacities: &BTreeMap<Phase, usize>,
    ) -> Vec<PhaseUtilization> {
        let busy = busy_time_by_phase(log);
        capacities
            .iter()
            .map(|(&phase, &capacity)| {
                let busy = busy.get(&phase).copied().unwrap_or(0.0);
                let denominator = elapsed * capacity as f64;
                let utilization = if denominator > 0.0 {
                    busy / denominator
                } else {
                    0.0
                };
                PhaseUtilization {
                    phase,
                    capacity,
                    busy,
                    utilization,
                }
            })
            .collect()
    }
}

/// Aggregate line indicators. All time values are in minutes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineKpi {
    pub completed: usize,
    /// Orders with at least one closed segment that have not completed.
    pub in_progress: usize,
    pub makespan: f64,
    pub mean_lead_time: f64,
    pub mean_processing_time: f64,
    pub mean_waiting_time: f64,
    pub utilization: Vec<PhaseUtilization>,
    /// Mean utilization over phases with capacity.
    pub avg_utilization: f64,
}

impl LineKpi {
    /// Computes indicators from the log.
    ///
    /// # Arguments
    /// * `log` - The event log.
    /// * `elapsed` - Simulated time covered by the log (minutes).
    /// * `capacities` - Capacity per phase for utilization.
    pub fn calculate(log: &EventLog, elapsed: f64, capacities: &BTreeMap<Phase, usize>) -> Self {
        let metrics = order_metrics(log);
        let mut completed = 0usize;
        let mut makespan: f64 = 0.0;
        let mut lead = 0.0;
        let mut processing = 0.0;
        let mut waiting = 0.0;

        for m in metrics.values() {
            if let Some(done) = m.completion_time {
                completed += 1;
                makespan = makespan.max(done);
                lead += m.lead_time;
                processing += m.processing_time;
                waiting += m.waiting_time;
            }
        }

        let mean = |total: f64| {
            if completed == 0 {
                0.0
            } else {
                total / completed as f64
            }
        };

        let utilization = PhaseUtilization::calculate(log, elapsed, capacities);
        let with_capacity: Vec<f64> = utilization
            .iter()
            .filter(|u| u.capacity > 0)
            .map(|u| u.utilization)
            .collect();
        let avg_utilization = if with_capacity.is_empty() {
            0.0
        } else {
            with_capacity.iter().sum::<f64>() / with_capacity.len() as f64
        };

        Self {
            completed,
            in_progress: metrics.len() - completed,
            makespan,
            mean_lead_time: mean(lead),
            mean_processing_time: mean(processing),
            mean_waiting_time: mean(waiting),
            utilization,
            avg_utilization,
        }
    }

    /// Utilization of one phase, if it was part of the calculation.
    pub fn utilization_of(&self, phase: Phase) -> Option<f64> {
        self.utilization
            .iter()
            .find(|u| u.phase == phase)
            .map(|u| u.utilization)
    }
}
