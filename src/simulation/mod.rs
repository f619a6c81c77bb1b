//! Line simulation.
//!
//! [`Simulation`] owns a [`SimulationState`] and advances it with an
//! explicit [`Simulation::tick`]. The caller decides how simulated minutes
//! map to real time.
//!
//! # Example
//!
//! ```
//! use u_reman::config::SimulationConfig;
//! use u_reman::simulation::{OrderSpec, Simulation};
//!
//! let mut sim = Simulation::builder()
//!     .with_config(SimulationConfig::default())
//!     .with_order(
//!         OrderSpec::new("O1", 0.0, &["I", "Engine", "T", "Engine", "Q"])
//!             .with_duration("Engine", 30.0),
//!     )
//!     .build()
//!     .unwrap();
//!
//! sim.run_for(200.0, 1.0).unwrap();
//! let records = sim.terminal_records();
//! assert_eq!(records.len(), 1);
//! assert_eq!(records[0].order_id, "O1");
//! ```
//!
//! # Determinism
//!
//! Given the same configuration (seed included), order feed and delta
//! sequence, a run produces an identical event log.

mod clock;
mod dispatcher;
mod intake;
mod report;
mod snapshot;
mod state;

pub use clock::Clock;
pub use intake::OrderSpec;
pub use report::{ReleaseSummary, SimulationIssue, TickReport};
pub use snapshot::{OrderCounts, PoolSnapshot, QueueSnapshot, SimulationSnapshot, StationSnapshot};
pub use state::{InvariantViolation, SimulationState, MAIN_PHASES};

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::info;

use crate::config::SimulationConfig;
use crate::dispatching::{rules, PolicyKind, RuleEngine};
use crate::error::{OrderError, SimulationError};
use crate::metrics::{self, LineKpi, OrderMetrics, TerminalRecord};
use crate::models::{EventLog, Order, OrderId, Phase, PhaseFamily};
use crate::queue::{QueueStage, ReorderHook};
use crate::validation::{ensure_servable, ValidationError};
use crate::EPSILON;

/// Builder for [`Simulation`].
#[derive(Default)]
pub struct SimulationBuilder {
    config: SimulationConfig,
    orders: Vec<OrderSpec>,
    hooks: Vec<(QueueStage, Arc<dyn ReorderHook>)>,
    engines: Vec<(Phase, RuleEngine)>,
    priority: Option<rules::Priority>,
}

impl SimulationBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the configuration.
    pub fn with_config(mut self, config: SimulationConfig) -> Self {
        self.config = config;
        self
    }

    /// Adds one order to the initial feed.
    pub fn with_order(mut self, order: OrderSpec) -> Self {
        self.orders.push(order);
        self
    }

    /// Adds orders to the initial feed.
    pub fn with_orders(mut self, orders: impl IntoIterator<Item = OrderSpec>) -> Self {
        self.orders.extend(orders);
        self
    }

    /// Installs a reordering hook on one intake queue.
    pub fn with_reorder_hook<H: ReorderHook + 'static>(mut self, stage: QueueStage, hook: H) -> Self {
        self.hooks.push((stage, Arc::new(hook)));
        self
    }

    /// Replaces a station's rule engine, overriding its configured policy.
    pub fn with_station_engine(mut self, phase: Phase, engine: RuleEngine) -> Self {
        self.engines.push((phase, engine));
        self
    }

    /// Sets the predicate used by stations configured with
    /// [`PolicyKind::Priority`]. Defaults to `priority > 0`.
    pub fn with_priority_predicate<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&Order) -> bool + Send + Sync + 'static,
    {
        self.priority = Some(rules::Priority::new(predicate));
        self
    }

    /// Validates the configuration and takes in the initial feed.
    ///
    /// # Errors
    /// - [`SimulationError::Config`] for an invalid configuration or an
    ///   order the slot pools can never serve,
    /// - [`SimulationError::Order`] for a duplicate order id,
    /// - [`SimulationError::InvalidArrival`] for a bad arrival time.
    pub fn build(self) -> Result<Simulation, SimulationError> {
        self.config.validate()?;
        let mut state = SimulationState::new(self.config);

        for (stage, hook) in self.hooks {
            state.set_hook(stage, Some(hook));
        }
        if let Some(priority) = self.priority {
            for phase in MAIN_PHASES {
                if state.config.policies.for_phase(phase) == PolicyKind::Priority {
                    let engine = RuleEngine::new()
                        .with_rule(priority.clone())
                        .with_tie_breaker(rules::Fifo);
                    state.set_engine(phase, engine);
                }
            }
        }
        for (phase, engine) in self.engines {
            state.set_engine(phase, engine);
        }

        let mut simulation = Simulation { state };
        for spec in &self.orders {
            let findings = simulation.submit(spec.clone())?;
            simulation
                .state
                .deferred
                .extend(findings.into_iter().map(|finding| SimulationIssue::Intake {
                    order_id: spec.order_id.clone(),
                    finding,
                }));
        }

        info!(
            seed = simulation.state.config.seed,
            orders = self.orders.len(),
            "simulation ready"
        );
        Ok(simulation)
    }
}

/// A remanufacturing line simulation.
#[derive(Debug)]
pub struct Simulation {
    state: SimulationState,
}

impl Simulation {
    pub fn builder() -> SimulationBuilder {
        SimulationBuilder::new()
    }

    /// Creates an empty simulation from a configuration.
    pub fn new(config: SimulationConfig) -> Result<Self, SimulationError> {
        Self::builder().with_config(config).build()
    }

    pub fn state(&self) -> &SimulationState {
        &self.state
    }

    pub fn now(&self) -> f64 {
        self.state.now()
    }

    pub fn log(&self) -> &EventLog {
        self.state.log()
    }

    pub fn order(&self, order_id: &str) -> Option<&Order> {
        self.state.order(order_id)
    }

    /// Advances the line by `delta` minutes.
    ///
    /// # Errors
    /// [`SimulationError::InvalidDelta`] for a non-positive or non-finite
    /// delta. Problems inside the tick are reported in
    /// [`TickReport::issues`] instead.
    pub fn tick(&mut self, delta: f64) -> Result<TickReport, SimulationError> {
        self.state.tick(delta)
    }

    /// Ticks in steps of `step` until `duration` minutes have passed. The
    /// last step is shortened to land exactly on the end time.
    pub fn run_for(&mut self, duration: f64, step: f64) -> Result<Vec<TickReport>, SimulationError> {
        if !step.is_finite() || step <= 0.0 {
            return Err(SimulationError::InvalidDelta(step));
        }
        let end = self.now() + duration.max(0.0);
        let mut reports = Vec::new();
        while self.now() + EPSILON < end {
            let delta = step.min(end - self.now());
            reports.push(self.tick(delta)?);
        }
        Ok(reports)
    }

    /// Takes in an order. Orders whose arrival time has passed enter the
    /// pre-acceptance queue now; later ones are held until the clock
    /// reaches them. Returns the repairs applied to the order's input.
    ///
    /// # Errors
    /// - [`OrderError::Duplicate`] when the id is already taken,
    /// - [`SimulationError::InvalidArrival`] for a negative or non-finite
    ///   arrival time,
    /// - [`ConfigError::NoSlots`](crate::error::ConfigError::NoSlots) or
    ///   [`ConfigError::UnservableOperation`](crate::error::ConfigError::UnservableOperation)
    ///   when the selected bill cannot be served.
    pub fn submit(&mut self, spec: OrderSpec) -> Result<Vec<ValidationError>, SimulationError> {
        if self.state.is_known(&spec.order_id) {
            return Err(OrderError::Duplicate(spec.order_id).into());
        }
        if !spec.arrival_time.is_finite() || spec.arrival_time < 0.0 {
            return Err(SimulationError::InvalidArrival {
                order_id: spec.order_id,
                arrival_time: spec.arrival_time,
            });
        }

        let intake = intake::resolve(&spec, &self.state.config, &mut self.state.rng);
        ensure_servable(
            &intake.order.bill,
            [
                self.state.pool(PhaseFamily::Disassembly),
                self.state.pool(PhaseFamily::Reassembly),
            ],
        )?;

        let now = self.now();
        if intake.order.arrival_time <= now + EPSILON {
            self.state.admit(intake.order, now)?;
        } else {
            self.state.schedule(intake.order);
        }
        Ok(intake.findings)
    }

    /// Stops new work for an order. Work already running is not pre-empted.
    pub fn cancel(&mut self, order_id: &str) -> Result<(), SimulationError> {
        let state = &mut self.state;
        let order = match state.orders.get_mut(order_id) {
            Some(order) => order,
            None => state
                .scheduled
                .iter_mut()
                .find(|o| o.id == order_id)
                .ok_or_else(|| OrderError::Unknown(order_id.to_string()))?,
        };
        if !order.is_completed() {
            order.cancel();
            info!(order_id, "order cancelled");
        }
        Ok(())
    }

    /// Removes completed orders from the retained set and returns their ids.
    /// The event log is left untouched and the ids stay reserved.
    pub fn purge_completed(&mut self) -> Vec<OrderId> {
        let done: Vec<OrderId> = self
            .state
            .orders
            .values()
            .filter(|o| o.is_completed())
            .map(|o| o.id.clone())
            .collect();
        for id in &done {
            self.state.orders.remove(id);
            self.state.retired.insert(id.clone());
        }
        if !done.is_empty() {
            info!(purged = done.len(), "completed orders purged");
        }
        done
    }

    /// Installs or removes the reordering hook of one intake queue.
    pub fn set_reorder_hook(&mut self, stage: QueueStage, hook: Option<Arc<dyn ReorderHook>>) {
        self.state.set_hook(stage, hook);
    }

    /// Replaces a station's rule engine.
    pub fn set_station_engine(&mut self, phase: Phase, engine: RuleEngine) {
        self.state.set_engine(phase, engine);
    }

    /// Current status of queues, stations and slots.
    pub fn snapshot(&self) -> SimulationSnapshot {
        SimulationSnapshot::capture(&self.state)
    }

    /// Terminal records of completed orders, from the event log.
    pub fn terminal_records(&self) -> Vec<TerminalRecord> {
        metrics::terminal_records(self.log())
    }

    /// Per-order metrics from the event log.
    pub fn order_metrics(&self) -> BTreeMap<OrderId, OrderMetrics> {
        metrics::order_metrics(self.log())
    }

    /// Line indicators over the elapsed run.
    pub fn kpi(&self) -> LineKpi {
        LineKpi::calculate(self.log(), self.now(), &self.state.capacities())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SlotPoolConfig;
    use crate::error::{ConfigError, HookError};
    use crate::models::EventKind;
    use crate::queue::QueueEntry;
    use crate::validation::ValidationErrorKind;

    fn make_order(id: &str, bill: &[&str]) -> OrderSpec {
        OrderSpec::new(id, 0.0, bill)
            .with_duration("Engine", 30.0)
            .with_duration("Gearbox", 10.0)
    }

    fn instant_main_phases() -> SimulationConfig {
        let mut config = SimulationConfig::default();
        config.main_phase_minutes.acceptance = 0.0;
        config.main_phase_minutes.inspection = 0.0;
        config.main_phase_minutes.quality = 0.0;
        config
    }

    fn start_time(sim: &Simulation, order_id: &str, activity: &str) -> Option<f64> {
        sim.log()
            .for_order(order_id)
            .find(|e| e.kind == EventKind::Start && e.activity == activity)
            .map(|e| e.time)
    }

    #[test]
    fn test_single_order_lifecycle() {
        let mut sim = Simulation::builder()
            .with_order(make_order("O1", &["I", "Engine", "T", "Engine", "Q"]))
            .build()
            .unwrap();
        sim.run_for(120.0, 1.0).unwrap();

        let labels: Vec<String> = sim.log().for_order("O1").map(|e| e.label()).collect();
        assert_eq!(
            labels,
            vec![
                "ACCEPTANCE_START",
                "ACCEPTANCE_END",
                "INSPECTION_START",
                "INSPECTION_END",
                "DISASSEMBLY:engine_START",
                "DISASSEMBLY:engine_END",
                "REASSEMBLY:engine_START",
                "REASSEMBLY:engine_END",
                "QUALITY_START",
                "QUALITY_END",
            ]
        );

        let order = sim.order("O1").unwrap();
        assert!(order.is_completed());
        assert_eq!(order.completed_at(), Some(109.0));

        let records = sim.terminal_records();
        assert_eq!(records.len(), 1);
        assert!((records[0].completion_time - 109.0).abs() < 1e-9);
        assert!((records[0].total_processing_time - 105.0).abs() < 1e-9);
        assert!((records[0].total_waiting_time - 4.0).abs() < 1e-9);
        assert!((order.total_waiting() - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_processing_plus_waiting_is_lead_for_every_order() {
        let mut config = SimulationConfig::default().with_seed(3);
        config.variation_percent.disassembly = 30.0;
        config.variation_percent.inspection = 30.0;
        let orders = (0..6).map(|i| {
            make_order(&format!("O{i}"), &["I", "Engine", "Gearbox", "T", "Gearbox", "Q"])
        });
        let mut sim = Simulation::builder()
            .with_config(config)
            .with_orders(orders)
            .build()
            .unwrap();
        sim.run_for(600.0, 0.5).unwrap();

        let metrics = sim.order_metrics();
        assert_eq!(sim.terminal_records().len(), 6);
        for m in metrics.values() {
            assert!((m.processing_time + m.waiting_time - m.lead_time).abs() < 1e-9);
        }
    }

    #[test]
    fn test_batch_release_with_hook() {
        let reverse = |_: QueueStage, entries: &[QueueEntry]| -> Result<Vec<OrderId>, HookError> {
            Ok(entries.iter().rev().map(|e| e.order_id.clone()).collect())
        };
        let config = SimulationConfig::default().with_queue_delay(QueueStage::PreAcceptance, 10.0);
        let mut sim = Simulation::builder()
            .with_config(config)
            .with_orders(["A", "B", "C"].map(|id| make_order(id, &["I", "Engine", "Q"])))
            .with_reorder_hook(QueueStage::PreAcceptance, reverse)
            .build()
            .unwrap();

        for _ in 0..9 {
            let report = sim.tick(1.0).unwrap();
            assert!(report.releases.is_empty());
        }
        assert_eq!(sim.state().queue(QueueStage::PreAcceptance).len(), 3);

        let report = sim.tick(1.0).unwrap();
        assert_eq!(report.releases.len(), 1);
        assert_eq!(report.releases[0].order_ids, vec!["C", "B", "A"]);
        assert_eq!(report.releases[0].reorder_diff, 2);
        assert_eq!(start_time(&sim, "C", "ACCEPTANCE"), Some(10.0));
        assert!(start_time(&sim, "A", "ACCEPTANCE").is_none());
    }

    #[test]
    fn test_failing_hook_falls_back_and_reports() {
        let failing = |_: QueueStage, _: &[QueueEntry]| -> Result<Vec<OrderId>, HookError> {
            Err(HookError::Failed("offline".into()))
        };
        let mut sim = Simulation::builder()
            .with_orders(["A", "B"].map(|id| make_order(id, &["I", "Engine", "Q"])))
            .with_reorder_hook(QueueStage::PreAcceptance, failing)
            .build()
            .unwrap();

        let report = sim.tick(1.0).unwrap();
        assert_eq!(report.releases[0].order_ids, vec!["A", "B"]);
        assert!(report.issues.iter().any(|i| matches!(
            i,
            SimulationIssue::HookFallback {
                stage: QueueStage::PreAcceptance,
                ..
            }
        )));
    }

    #[test]
    fn test_slow_hook_is_cut_off_at_budget() {
        let slow = |_: QueueStage, entries: &[QueueEntry]| -> Result<Vec<OrderId>, HookError> {
            std::thread::sleep(std::time::Duration::from_millis(1500));
            Ok(entries.iter().rev().map(|e| e.order_id.clone()).collect())
        };
        let mut config = SimulationConfig::default();
        config.reorder_timeout_ms = 50;
        let mut sim = Simulation::builder()
            .with_config(config)
            .with_orders(["A", "B"].map(|id| make_order(id, &["I", "Engine", "Q"])))
            .with_reorder_hook(QueueStage::PreAcceptance, slow)
            .build()
            .unwrap();

        let started = std::time::Instant::now();
        let report = sim.tick(1.0).unwrap();
        assert!(started.elapsed() < std::time::Duration::from_millis(1000));

        assert_eq!(report.releases[0].order_ids, vec!["A", "B"]);
        assert_eq!(report.releases[0].reorder_diff, 0);
        assert!(report.issues.contains(&SimulationIssue::HookFallback {
            stage: QueueStage::PreAcceptance,
            error: HookError::TimedOut { budget_ms: 50 },
        }));
        assert_eq!(start_time(&sim, "A", "ACCEPTANCE"), Some(1.0));
    }

    #[test]
    fn test_rigid_and_flexible_serve_same_type() {
        let config = instant_main_phases().with_pool(
            PhaseFamily::Disassembly,
            SlotPoolConfig::mixed(2, 50.0, &["Engine"]),
        );
        let mut sim = Simulation::builder()
            .with_config(config)
            .with_orders(["A", "B"].map(|id| make_order(id, &["I", "Engine", "Q"])))
            .build()
            .unwrap();
        sim.run_for(10.0, 1.0).unwrap();

        let slots: Vec<Option<usize>> = ["A", "B"]
            .iter()
            .map(|id| {
                sim.log()
                    .for_order(id)
                    .find(|e| e.phase == Phase::Disassembly)
                    .and_then(|e| e.slot)
            })
            .collect();
        assert_eq!(slots, vec![Some(0), Some(1)]);
        assert_eq!(sim.state().pool(PhaseFamily::Disassembly).busy_count(), 2);
    }

    #[test]
    fn test_flexible_slot_waits_for_changeover() {
        let config = instant_main_phases()
            .with_changeover(5.0)
            .with_pool(PhaseFamily::Disassembly, SlotPoolConfig::flexible(1));
        let mut sim = Simulation::builder()
            .with_config(config)
            .with_order(make_order("A", &["I", "Gearbox", "Q"]))
            .with_order(make_order("B", &["I", "Engine", "Q"]))
            .build()
            .unwrap();
        sim.run_for(40.0, 1.0).unwrap();

        assert_eq!(start_time(&sim, "A", "DISASSEMBLY:gearbox"), Some(5.0));
        let a_end = sim
            .log()
            .for_order("A")
            .find(|e| e.kind == EventKind::End && e.phase == Phase::Disassembly)
            .map(|e| e.time);
        assert_eq!(a_end, Some(15.0));
        assert_eq!(start_time(&sim, "B", "DISASSEMBLY:engine"), Some(20.0));
    }

    #[test]
    fn test_invariants_hold_every_tick() {
        let mut config = SimulationConfig::default()
            .with_seed(11)
            .with_changeover(3.0)
            .with_queue_delay(QueueStage::PostInspection, 7.0)
            .with_pool(PhaseFamily::Disassembly, SlotPoolConfig::mixed(3, 34.0, &["Engine", "Gearbox"]))
            .with_pool(PhaseFamily::Reassembly, SlotPoolConfig::flexible(2))
            .with_policy(Phase::Inspection, PolicyKind::Random);
        config.variation_percent.reassembly = 25.0;
        config.main_phase_minutes.inspection = 4.0;

        let bills: [&[&str]; 3] = [
            &["I", "Engine", "Gearbox", "T", "Engine", "Q"],
            &["I", "Gearbox", "T", "Gearbox", "Engine", "Q"],
            &["I", "Q"],
        ];
        let orders = (0..9).map(|i| {
            make_order(&format!("O{i}"), bills[i % bills.len()]).with_priority(i as i32 % 2)
        });
        let mut sim = Simulation::builder()
            .with_config(config)
            .with_orders(orders)
            .build()
            .unwrap();

        let mut last: BTreeMap<OrderId, Phase> = BTreeMap::new();
        for _ in 0..800 {
            let report = sim.tick(1.0).unwrap();
            assert!(report
                .issues
                .iter()
                .all(|i| matches!(i, SimulationIssue::Intake { .. })));
            assert!(sim.state().invariant_violations().is_empty());
            for (id, order) in sim.state().orders() {
                if let Some(prev) = last.insert(id.clone(), order.phase()) {
                    assert!(prev <= order.phase(), "{id} moved from {prev} to {}", order.phase());
                }
            }
        }
        assert_eq!(sim.snapshot().orders.completed, 9);
        assert!(sim.state().assignments().is_empty());
    }

    #[test]
    fn test_same_seed_same_log() {
        let run = || {
            let mut config = SimulationConfig::default()
                .with_seed(99)
                .with_policy(Phase::Acceptance, PolicyKind::Random)
                .with_policy(Phase::Quality, PolicyKind::Sjf);
            config.variation_percent.acceptance = 40.0;
            config.variation_percent.disassembly = 40.0;
            let orders = (0..5).map(|i| {
                make_order(&format!("O{i}"), &["I", "Engine", "T", "Gearbox", "Q"])
                    .with_alternative(&["I", "Gearbox", "Q"])
            });
            let mut sim = Simulation::builder()
                .with_config(config)
                .with_orders(orders)
                .build()
                .unwrap();
            sim.run_for(300.0, 1.0).unwrap();
            sim.log().entries().to_vec()
        };
        let first = run();
        assert!(!first.is_empty());
        assert_eq!(first, run());
    }

    #[test]
    fn test_future_arrival_is_held() {
        let mut sim = Simulation::new(SimulationConfig::default()).unwrap();
        let mut spec = make_order("late", &["I", "Engine", "Q"]);
        spec.arrival_time = 5.0;
        sim.submit(spec).unwrap();

        assert!(sim.state().orders().is_empty());
        assert_eq!(sim.snapshot().orders.scheduled, 1);

        for _ in 0..4 {
            assert!(sim.tick(1.0).unwrap().admitted.is_empty());
        }
        let report = sim.tick(1.0).unwrap();
        assert_eq!(report.admitted, vec!["late"]);
        assert_eq!(start_time(&sim, "late", "ACCEPTANCE"), Some(5.0));
    }

    #[test]
    fn test_submit_rejections() {
        let config = SimulationConfig::default()
            .with_pool(PhaseFamily::Disassembly, SlotPoolConfig::mixed(1, 0.0, &["Engine"]));
        let mut sim = Simulation::builder()
            .with_config(config)
            .with_order(make_order("A", &["I", "Engine", "Q"]))
            .build()
            .unwrap();

        assert_eq!(
            sim.submit(make_order("A", &["I", "Engine", "Q"])),
            Err(SimulationError::Order(OrderError::Duplicate("A".into())))
        );
        assert_eq!(
            sim.submit(make_order("B", &["I", "Gearbox", "Q"])),
            Err(SimulationError::Config(ConfigError::UnservableOperation {
                phase: PhaseFamily::Disassembly,
                type_key: "gearbox".into(),
            }))
        );
        let mut bad = make_order("C", &["I", "Engine", "Q"]);
        bad.arrival_time = -1.0;
        assert!(matches!(
            sim.submit(bad),
            Err(SimulationError::InvalidArrival { .. })
        ));
    }

    #[test]
    fn test_zero_slots_rejected_at_setup() {
        let config = SimulationConfig::default()
            .with_pool(PhaseFamily::Reassembly, SlotPoolConfig::flexible(0));
        let result = Simulation::builder()
            .with_config(config)
            .with_order(make_order("A", &["I", "Engine", "T", "Engine", "Q"]))
            .build();
        assert!(matches!(
            result,
            Err(SimulationError::Config(ConfigError::NoSlots {
                phase: PhaseFamily::Reassembly
            }))
        ));
    }

    #[test]
    fn test_order_without_operations_skips_slot_phases() {
        let mut sim = Simulation::builder()
            .with_order(make_order("bare", &["I", "Q"]))
            .build()
            .unwrap();
        let first = sim.tick(1.0).unwrap();
        assert!(first.issues.iter().any(|i| matches!(
            i,
            SimulationIssue::Intake { finding, .. } if finding.kind == ValidationErrorKind::NoOperations
        )));

        sim.run_for(100.0, 1.0).unwrap();
        assert!(sim.order("bare").unwrap().is_completed());
        assert!(sim
            .log()
            .for_order("bare")
            .all(|e| e.phase.family().is_none()));
    }

    #[test]
    fn test_cancel_stops_new_work() {
        let mut sim = Simulation::builder()
            .with_config(instant_main_phases())
            .with_order(make_order("keep", &["I", "Engine", "Q"]))
            .with_order(make_order("drop", &["I", "Engine", "Q"]))
            .build()
            .unwrap();
        sim.cancel("drop").unwrap();
        sim.run_for(60.0, 1.0).unwrap();

        assert!(sim.order("keep").unwrap().is_completed());
        let dropped = sim.order("drop").unwrap();
        assert!(dropped.is_cancelled());
        assert!(!dropped.is_completed());
        assert_eq!(sim.log().for_order("drop").count(), 0);
        assert_eq!(sim.snapshot().orders.cancelled, 1);

        assert_eq!(
            sim.cancel("ghost"),
            Err(SimulationError::Order(OrderError::Unknown("ghost".into())))
        );
    }

    #[test]
    fn test_cancel_does_not_preempt_running_work() {
        let mut sim = Simulation::builder()
            .with_config(instant_main_phases())
            .with_order(make_order("A", &["I", "Engine", "Gearbox", "Q"]))
            .build()
            .unwrap();
        // Disassembly of the engine runs from t=5 to t=35.
        sim.run_for(6.0, 1.0).unwrap();
        assert!(sim.state().is_processing("A"));
        sim.cancel("A").unwrap();
        sim.run_for(60.0, 1.0).unwrap();

        let labels: Vec<String> = sim
            .log()
            .for_order("A")
            .filter(|e| e.phase == Phase::Disassembly)
            .map(|e| e.label())
            .collect();
        assert_eq!(labels, vec!["DISASSEMBLY:engine_START", "DISASSEMBLY:engine_END"]);
        assert!(sim.state().invariant_violations().is_empty());
    }

    #[test]
    fn test_purge_completed_keeps_log_and_reserves_id() {
        let mut sim = Simulation::builder()
            .with_config(instant_main_phases())
            .with_order(make_order("A", &["I", "Gearbox", "Q"]))
            .build()
            .unwrap();
        sim.run_for(30.0, 1.0).unwrap();
        let events = sim.log().len();

        assert_eq!(sim.purge_completed(), vec!["A"]);
        assert!(sim.order("A").is_none());
        assert_eq!(sim.log().len(), events);
        assert_eq!(sim.terminal_records().len(), 1);
        assert!(matches!(
            sim.submit(make_order("A", &["I", "Gearbox", "Q"])),
            Err(SimulationError::Order(OrderError::Duplicate(_)))
        ));
    }

    #[test]
    fn test_priority_predicate() {
        let config = SimulationConfig::default().with_policy(Phase::Acceptance, PolicyKind::Priority);
        let mut sim = Simulation::builder()
            .with_config(config)
            .with_orders(["A", "B", "VIP"].map(|id| make_order(id, &["I", "Engine", "Q"])))
            .with_priority_predicate(|order| order.id.starts_with("VIP"))
            .build()
            .unwrap();
        sim.tick(1.0).unwrap();
        assert_eq!(start_time(&sim, "VIP", "ACCEPTANCE"), Some(1.0));
    }

    #[test]
    fn test_waiting_accrues_per_phase() {
        let config = SimulationConfig::default().with_queue_delay(QueueStage::PreAcceptance, 4.0);
        let mut sim = Simulation::builder()
            .with_config(config)
            .with_orders(["A", "B"].map(|id| make_order(id, &["I", "Engine", "Q"])))
            .build()
            .unwrap();
        sim.run_for(6.0, 1.0).unwrap();

        // Released at 4; A occupies acceptance from 4, B waits at the station.
        let a = sim.order("A").unwrap();
        let b = sim.order("B").unwrap();
        assert!((a.record(Phase::IntakeQueue).unwrap().waiting - 4.0).abs() < 1e-9);
        assert!((b.record(Phase::Acceptance).unwrap().waiting - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_snapshot_and_kpi() {
        let mut sim = Simulation::builder()
            .with_config(instant_main_phases())
            .with_orders(["A", "B"].map(|id| make_order(id, &["I", "Engine", "Q"])))
            .build()
            .unwrap();
        sim.run_for(8.0, 1.0).unwrap();

        let snapshot = sim.snapshot();
        let pool = snapshot.pool(PhaseFamily::Disassembly).unwrap();
        assert_eq!(pool.busy, 2);
        assert_eq!(pool.pending, vec!["A", "B"]);
        assert_eq!(snapshot.station(Phase::Acceptance).unwrap().policy, vec!["FIFO"]);
        assert!(serde_json::to_string(&snapshot).is_ok());

        sim.run_for(60.0, 1.0).unwrap();
        let kpi = sim.kpi();
        assert_eq!(kpi.completed, 2);
        assert!(kpi.utilization_of(Phase::Disassembly).unwrap() > 0.0);
    }

    #[test]
    fn test_event_stream_by_cursor() {
        let mut sim = Simulation::builder()
            .with_order(make_order("A", &["I", "Engine", "Q"]))
            .build()
            .unwrap();

        let first = sim.tick(1.0).unwrap();
        assert_eq!(first.event_cursor, 0);
        assert_eq!(first.events, 1);
        let new = sim.log().since(first.event_cursor);
        assert_eq!(new[0].label(), "ACCEPTANCE_START");

        let quiet = sim.tick(1.0).unwrap();
        assert_eq!(quiet.events, 0);
        assert!(sim.log().since(quiet.event_cursor).is_empty());

        let json = sim.log().to_json().unwrap();
        assert!(json.contains("\"ACCEPTANCE\""));
        assert!(json.contains("\"START\""));
    }

    #[test]
    fn test_invalid_delta() {
        let mut sim = Simulation::new(SimulationConfig::default()).unwrap();
        assert_eq!(sim.tick(0.0), Err(SimulationError::InvalidDelta(0.0)));
        assert!(sim.run_for(10.0, -1.0).is_err());
        assert_eq!(sim.now(), 0.0);
    }
}
