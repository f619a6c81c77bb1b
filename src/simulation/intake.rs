//! Order intake: from an order-feed record to a resolved [`Order`].
//!
//! Intake is the only place randomness touches an order. The bill is chosen
//! among valid alternatives and every duration is rolled here, once, in a
//! fixed order (acceptance, inspection, disassembly steps, reassembly steps,
//! quality), so a run is reproducible from its seed.

use std::collections::BTreeMap;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::SimulationConfig;
use crate::models::{normalize_type_key, BillOfProcess, Bundle, Order, OrderId, Phase, PhaseFamily};
use crate::validation::{bill_findings, ValidationError, ValidationErrorKind};

/// One record of the order feed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrderSpec {
    pub order_id: OrderId,
    /// Minutes since simulation start.
    pub arrival_time: f64,
    /// Primary bill of process tokens.
    pub bill_of_process: Vec<String>,
    /// Alternative bills; one valid candidate is drawn at intake.
    pub alternatives: Vec<Vec<String>>,
    /// Base minutes per operation type. Keys `acceptance`, `inspection` and
    /// `quality` override the main-phase defaults.
    pub base_durations_by_type: BTreeMap<String, f64>,
    pub priority: i32,
}

impl OrderSpec {
    /// Creates a spec with a primary bill.
    pub fn new<S: AsRef<str>>(order_id: impl Into<OrderId>, arrival_time: f64, bill: &[S]) -> Self {
        Self {
            order_id: order_id.into(),
            arrival_time,
            bill_of_process: bill.iter().map(|t| t.as_ref().to_string()).collect(),
            ..Self::default()
        }
    }

    /// Adds an alternative bill.
    pub fn with_alternative<S: AsRef<str>>(mut self, bill: &[S]) -> Self {
        self.alternatives
            .push(bill.iter().map(|t| t.as_ref().to_string()).collect());
        self
    }

    /// Sets the base duration of an operation type.
    pub fn with_duration(mut self, type_label: &str, minutes: f64) -> Self {
        self.base_durations_by_type
            .insert(type_label.to_string(), minutes);
        self
    }

    /// Sets the priority.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// The primary bill followed by every alternative.
    pub fn candidates(&self) -> Vec<Vec<String>> {
        std::iter::once(self.bill_of_process.clone())
            .chain(self.alternatives.iter().cloned())
            .collect()
    }

    /// Base duration for a type, matching keys after normalization.
    pub fn base_duration(&self, type_label: &str) -> Option<f64> {
        let key = normalize_type_key(type_label);
        self.base_durations_by_type
            .iter()
            .find(|(k, _)| normalize_type_key(k) == key)
            .map(|(_, &minutes)| minutes)
    }
}

/// A resolved order plus every repair applied on the way in.
#[derive(Debug, Clone)]
pub(crate) struct Intake {
    pub order: Order,
    pub findings: Vec<ValidationError>,
}

/// Rolls `base × (1 + u)` with `u` uniform in `[-v, +v]`, `v = percent / 100`,
/// clamped at zero.
pub(crate) fn vary<R: Rng + ?Sized>(base: f64, percent: f64, rng: &mut R) -> f64 {
    let v = percent / 100.0;
    if v <= 0.0 || base <= 0.0 {
        return base.max(0.0);
    }
    let u = rng.random_range(-v..=v);
    (base * (1.0 + u)).max(0.0)
}

/// Builds an order from its spec. Never fails: data problems are repaired
/// and reported in [`Intake::findings`].
pub(crate) fn resolve<R: Rng + ?Sized>(
    spec: &OrderSpec,
    config: &SimulationConfig,
    rng: &mut R,
) -> Intake {
    let id = spec.order_id.as_str();
    let candidates = spec.candidates();
    let parsed = match BillOfProcess::select(&candidates, &mut *rng) {
        Some(selection) => selection.parsed,
        None => BillOfProcess::parse(&spec.bill_of_process),
    };

    let mut findings = bill_findings(id, &parsed.corrections);
    let bill = parsed.bill;
    let variation = &config.variation_percent;

    let main_phase = |phase: Phase, key: &str, rng: &mut R| {
        let base = spec
            .base_duration(key)
            .unwrap_or_else(|| config.main_phase_minutes.for_phase(phase));
        vary(base, variation.for_phase(phase), rng)
    };
    let acceptance = main_phase(Phase::Acceptance, "acceptance", &mut *rng);
    let inspection = main_phase(Phase::Inspection, "inspection", &mut *rng);

    let mut order = Order::new(id, spec.arrival_time, bill.clone())
        .with_priority(spec.priority)
        .with_expected(Phase::Acceptance, acceptance)
        .with_expected(Phase::Inspection, inspection);

    for family in PhaseFamily::ALL {
        let phase = Phase::from(family);
        let mut bundle = Bundle::new(family);
        for label in bill.operations(family) {
            let base = match spec.base_duration(label) {
                Some(minutes) => minutes,
                None => {
                    findings.push(ValidationError::new(
                        ValidationErrorKind::UnknownOperationType,
                        format!(
                            "Order '{id}': operation type '{}' has no base duration, using {} min",
                            normalize_type_key(label),
                            config.default_operation_minutes
                        ),
                    ));
                    config.default_operation_minutes
                }
            };
            bundle.push(label, vary(base, variation.for_phase(phase), &mut *rng));
        }
        let total = bundle.remaining_duration();
        order = order.with_bundle(bundle).with_expected(phase, total);
    }

    let quality = main_phase(Phase::Quality, "quality", &mut *rng);
    order = order.with_expected(Phase::Quality, quality);

    for finding in &findings {
        warn!(order_id = %id, kind = ?finding.kind, "{}", finding.message);
    }

    Intake { order, findings }
}
