//! Per-tick dispatcher.
//!
//! # Tick order
//!
//! 0. Accrue waiting time for queued orders, advance the clock, admit
//!    arrivals into the pre-acceptance queue.
//! 1. For each batch queue, check and release; route released orders.
//! 2. Advance each main-phase station; route finished orders.
//! 3. For disassembly, then reassembly: progress active assignments and
//!    complete the ones that reached zero, then scan the pending list and
//!    start the head operation of every order that is not already running.
//!
//! Orders routed into a queue during step 2 or 3 are released no earlier
//! than step 1 of the next tick.

use std::collections::BTreeSet;

use rand::Rng;
use tracing::{debug, info};

use super::state::MAIN_PHASES;
use super::{ReleaseSummary, SimulationIssue, SimulationState, TickReport};
use crate::capacity::ActiveAssignment;
use crate::dispatching::SchedulingContext;
use crate::error::{OrderError, SimulationError};
use crate::models::{Order, OperationStep, OrderId, Phase, PhaseFamily};
use crate::queue::{QueueStage, ReleaseOutcome};
use crate::EPSILON;

impl SimulationState {
    /// Advances the whole line by `delta` minutes.
    pub(crate) fn tick(&mut self, delta: f64) -> Result<TickReport, SimulationError> {
        if !delta.is_finite() || delta <= 0.0 {
            return Err(SimulationError::InvalidDelta(delta));
        }
        self.accrue_waiting(delta);
        let now = self.clock.advance(delta)?;

        let mut report = TickReport::new(now, delta, self.log.len());
        report.issues.append(&mut self.deferred);

        self.admit_arrivals(now, &mut report);
        self.release_queues(now, &mut report);
        self.advance_stations(delta, now, &mut report);
        for family in PhaseFamily::ALL {
            self.progress_slots(family, delta, now, &mut report);
            self.assign_slots(family, now, &mut report);
        }

        report.events = self.log.len() - report.event_cursor;
        debug!(
            time = now,
            events = report.events,
            completed = report.completed.len(),
            issues = report.issues.len(),
            "tick"
        );
        Ok(report)
    }

    /// Adds `delta` to the current phase's waiting time of every live order
    /// that is neither at a station nor on a slot.
    fn accrue_waiting(&mut self, delta: f64) {
        let mut busy: BTreeSet<&str> = self
            .stations
            .iter()
            .filter_map(|s| s.occupant().map(|o| o.order_id.as_str()))
            .collect();
        busy.extend(self.assignments.iter().map(|(id, _)| id));

        for order in self.orders.values_mut() {
            if order.is_completed() || order.is_cancelled() || busy.contains(order.id.as_str()) {
                continue;
            }
            let phase = order.phase();
            order.record_mut(phase).waiting += delta;
        }
    }

    fn admit_arrivals(&mut self, now: f64, report: &mut TickReport) {
        while self
            .scheduled
            .first()
            .is_some_and(|o| o.arrival_time <= now + EPSILON)
        {
            let order = self.scheduled.remove(0);
            let id = order.id.clone();
            let result = self.admit(order, now);
            if result.is_ok() {
                report.admitted.push(id);
            }
            report.note(result);
        }
    }

    /// Puts an arrived order into the pre-acceptance queue.
    pub(crate) fn admit(&mut self, order: Order, now: f64) -> Result<(), SimulationError> {
        let id = order.id.clone();
        if self.orders.contains_key(&id) {
            return Err(OrderError::Duplicate(id).into());
        }
        self.queue_mut(QueueStage::PreAcceptance).enqueue(&id, now)?;
        debug!(order_id = %id, time = now, "order admitted");
        self.orders.insert(id, order);
        Ok(())
    }

    /// Holds an order until its arrival time.
    pub(crate) fn schedule(&mut self, order: Order) {
        let at = self
            .scheduled
            .partition_point(|o| o.arrival_time <= order.arrival_time);
        self.scheduled.insert(at, order);
    }

    fn release_queues(&mut self, now: f64, report: &mut TickReport) {
        for stage in QueueStage::ALL {
            let ReleaseOutcome::Released(batch) = self.queue_mut(stage).check_and_release(now) else {
                continue;
            };
            if let Some(error) = batch.hook_error.clone() {
                report.issues.push(SimulationIssue::HookFallback { stage, error });
            }
            let ids: Vec<OrderId> = batch.order_ids().map(String::from).collect();
            for id in &ids {
                let result = self.route_released(stage, id, now);
                report.note(result);
            }
            report.releases.push(ReleaseSummary {
                stage,
                order_ids: ids,
                reorder_diff: batch.reorder_diff,
            });
        }
    }

    fn route_released(&mut self, stage: QueueStage, id: &str, now: f64) -> Result<(), SimulationError> {
        match stage {
            QueueStage::PreAcceptance => self.enter_station(Phase::Acceptance, id, now),
            QueueStage::PreInspection => self.enter_station(Phase::Inspection, id, now),
            QueueStage::PostInspection => self.enter_slot_phases(id, now),
        }
    }

    fn advance_order(&mut self, id: &str, to: Phase) -> Result<(), SimulationError> {
        let order = self
            .orders
            .get_mut(id)
            .ok_or_else(|| OrderError::Unknown(id.to_string()))?;
        let from = order.phase();
        order.advance_to(to)?;
        debug!(order_id = %id, %from, %to, "phase change");
        Ok(())
    }

    fn enter_station(&mut self, phase: Phase, id: &str, now: f64) -> Result<(), SimulationError> {
        self.advance_order(id, phase)?;
        self.station_mut(phase).enqueue(id, now);
        Ok(())
    }

    /// Sends the order to the next family with work left, or to quality.
    fn enter_slot_phases(&mut self, id: &str, now: f64) -> Result<(), SimulationError> {
        let order = self
            .orders
            .get(id)
            .ok_or_else(|| OrderError::Unknown(id.to_string()))?;
        let next = PhaseFamily::ALL
            .into_iter()
            .filter(|&f| order.phase() < Phase::from(f))
            .find(|&f| !order.bundle(f).is_empty());

        match next {
            Some(family) => {
                self.advance_order(id, Phase::from(family))?;
                self.pending_mut(family).push(id.to_string());
                Ok(())
            }
            None => self.enter_station(Phase::Quality, id, now),
        }
    }

    fn advance_stations(&mut self, delta: f64, now: f64, report: &mut TickReport) {
        for (idx, phase) in MAIN_PHASES.into_iter().enumerate() {
            let ctx = SchedulingContext::at_time(now).with_seed(self.rng.random());
            let outcome = self.stations[idx].tick(delta, &ctx, &mut self.orders, &mut self.log);
            if let Some(id) = outcome.finished {
                let result = self.route_station_finished(phase, &id, now, report);
                report.note(result);
            }
        }
    }

    fn route_station_finished(
        &mut self,
        phase: Phase,
        id: &str,
        now: f64,
        report: &mut TickReport,
    ) -> Result<(), SimulationError> {
        match phase {
            Phase::Acceptance => {
                self.advance_order(id, Phase::InspectionQueue)?;
                self.queue_mut(QueueStage::PreInspection).enqueue(id, now)?;
            }
            Phase::Inspection => {
                self.advance_order(id, Phase::DisassemblyQueue)?;
                self.queue_mut(QueueStage::PostInspection).enqueue(id, now)?;
            }
            _ => {
                let order = self
                    .orders
                    .get_mut(id)
                    .ok_or_else(|| OrderError::Unknown(id.to_string()))?;
                order.complete(now)?;
                info!(order_id = %id, time = now, "order completed");
                report.completed.push(id.to_string());
            }
        }
        Ok(())
    }

    fn progress_slots(&mut self, family: PhaseFamily, delta: f64, now: f64, report: &mut TickReport) {
        let phase = Phase::from(family);
        for (id, key) in self.assignments.progress(family, delta) {
            let Some(done) = self.assignments.remove(&id, key) else {
                continue;
            };
            let slot = done.claim.index();
            if let Err(error) = self.pool_mut(family).release(done.claim, now) {
                report.issues.push(SimulationIssue::Slot {
                    order_id: id.clone(),
                    error,
                });
            }
            self.log
                .end(now, &id, phase, done.step.activity_name(), Some(slot));
            debug!(order_id = %id, operation = %key, slot, time = now, "operation finished");

            let result = self.finish_operation(family, &id, &done.step, done.started_at, now, report);
            report.note(result);
        }
    }

    fn finish_operation(
        &mut self,
        family: PhaseFamily,
        id: &str,
        step: &OperationStep,
        started_at: f64,
        now: f64,
        report: &mut TickReport,
    ) -> Result<(), SimulationError> {
        let phase = Phase::from(family);
        let order = self
            .orders
            .get_mut(id)
            .ok_or_else(|| OrderError::Unknown(id.to_string()))?;

        if order.bundle_mut(family).pop_completed(step.key).is_none() {
            report.issues.push(SimulationIssue::OutOfSequence {
                order_id: id.to_string(),
                operation: step.key,
            });
            return Ok(());
        }
        order.record_mut(phase).actual += now - started_at;
        if !order.bundle(family).is_empty() {
            return Ok(());
        }

        order.record_mut(phase).completed = true;
        self.pending_mut(family).retain(|p| p != id);
        self.enter_slot_phases(id, now)
    }

    fn assign_slots(&mut self, family: PhaseFamily, now: f64, report: &mut TickReport) {
        let phase = Phase::from(family);
        let waiting = self.pending(family).to_vec();
        for id in waiting {
            let Some(order) = self.orders.get(&id) else {
                continue;
            };
            if order.is_cancelled() {
                continue;
            }
            let Some(step) = order.bundle(family).front().cloned() else {
                continue;
            };
            if self.assignments.contains(&id, step.key) {
                continue;
            }
            let Some(claim) = self.pool_mut(family).pick(&step.type_key, now) else {
                continue;
            };

            let slot = claim.index();
            let activity = step.activity_name();
            let assignment = ActiveAssignment {
                claim,
                remaining: step.duration,
                started_at: now,
                step,
            };
            if let Err((error, rejected)) = self.assignments.insert(&id, assignment) {
                if let Err(release_error) = self.pool_mut(family).release(rejected.claim, now) {
                    report.issues.push(SimulationIssue::Slot {
                        order_id: id.clone(),
                        error: release_error,
                    });
                }
                report.issues.push(SimulationIssue::Slot {
                    order_id: id.clone(),
                    error,
                });
                continue;
            }

            self.log.start(now, &id, phase, activity, Some(slot));
            if let Some(order) = self.orders.get_mut(&id) {
                let record = order.record_mut(phase);
                if record.start.is_none() {
                    record.start = Some(now);
                }
            }
            debug!(order_id = %id, %phase, slot, time = now, "operation started");
        }
    }
}
