//! Order model.
//!
//! An order is one unit moving through the line. It is created once at
//! intake, mutated only by the dispatcher, and moves strictly forward
//! through the fixed [`Phase`] sequence.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::{BillOfProcess, Bundle, PhaseFamily};
use crate::error::OrderError;

/// Order identifier.
pub type OrderId = String;

/// Position of an order in the line. Ordering follows the line, so a
/// transition is valid only when the target compares greater.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    IntakeQueue,
    Acceptance,
    InspectionQueue,
    Inspection,
    DisassemblyQueue,
    Disassembly,
    Reassembly,
    Quality,
    Completed,
}

impl Phase {
    /// All phases in line order.
    pub const ALL: [Phase; 9] = [
        Phase::IntakeQueue,
        Phase::Acceptance,
        Phase::InspectionQueue,
        Phase::Inspection,
        Phase::DisassemblyQueue,
        Phase::Disassembly,
        Phase::Reassembly,
        Phase::Quality,
        Phase::Completed,
    ];

    /// Event-log activity name for single-capacity phases.
    pub fn activity_name(self) -> &'static str {
        match self {
            Phase::IntakeQueue => "INTAKE_QUEUE",
            Phase::Acceptance => "ACCEPTANCE",
            Phase::InspectionQueue => "INSPECTION_QUEUE",
            Phase::Inspection => "INSPECTION",
            Phase::DisassemblyQueue => "DISASSEMBLY_QUEUE",
            Phase::Disassembly => "DISASSEMBLY",
            Phase::Reassembly => "REASSEMBLY",
            Phase::Quality => "QUALITY",
            Phase::Completed => "COMPLETED",
        }
    }

    /// The slot-backed family for this phase, if any.
    pub fn family(self) -> Option<PhaseFamily> {
        match self {
            Phase::Disassembly => Some(PhaseFamily::Disassembly),
            Phase::Reassembly => Some(PhaseFamily::Reassembly),
            _ => None,
        }
    }
}

impl From<PhaseFamily> for Phase {
    fn from(family: PhaseFamily) -> Self {
        match family {
            PhaseFamily::Disassembly => Phase::Disassembly,
            PhaseFamily::Reassembly => Phase::Reassembly,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.activity_name().to_ascii_lowercase())
    }
}

/// Per-phase bookkeeping.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PhaseRecord {
    /// Resolved duration (minutes). Set once, never re-rolled.
    pub expected: f64,
    /// Time actually spent processing (minutes).
    pub actual: f64,
    /// When processing started.
    pub start: Option<f64>,
    pub completed: bool,
    /// Time spent queued while in this phase (minutes).
    pub waiting: f64,
}

/// An order in the line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    /// Arrival time (minutes). Also the due-date proxy for EDD.
    pub arrival_time: f64,
    /// Scheduling priority (higher = more important).
    pub priority: i32,
    pub bill: BillOfProcess,
    phase: Phase,
    records: BTreeMap<Phase, PhaseRecord>,
    disassembly: Bundle,
    reassembly: Bundle,
    cancelled: bool,
    completed_at: Option<f64>,
}

impl Order {
    /// Creates an order in the intake queue.
    pub fn new(id: impl Into<OrderId>, arrival_time: f64, bill: BillOfProcess) -> Self {
        Self {
            id: id.into(),
            arrival_time,
            priority: 0,
            bill,
            phase: Phase::IntakeQueue,
            records: BTreeMap::new(),
            disassembly: Bundle::new(PhaseFamily::Disassembly),
            reassembly: Bundle::new(PhaseFamily::Reassembly),
            cancelled: false,
            completed_at: None,
        }
    }

    /// Sets the priority.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Sets the resolved duration of a phase.
    pub fn with_expected(mut self, phase: Phase, minutes: f64) -> Self {
        self.records.entry(phase).or_default().expected = minutes;
        self
    }

    /// Replaces the bundle of the given family.
    pub fn with_bundle(mut self, bundle: Bundle) -> Self {
        match bundle.family {
            PhaseFamily::Disassembly => self.disassembly = bundle,
            PhaseFamily::Reassembly => self.reassembly = bundle,
        }
        self
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Moves the order to `to`. Rejects any transition that is not strictly
    /// forward.
    pub fn advance_to(&mut self, to: Phase) -> Result<(), OrderError> {
        if to <= self.phase {
            return Err(OrderError::BackwardTransition {
                order_id: self.id.clone(),
                from: self.phase,
                to,
            });
        }
        self.phase = to;
        Ok(())
    }

    /// Marks the order completed at `now`.
    pub(crate) fn complete(&mut self, now: f64) -> Result<(), OrderError> {
        self.advance_to(Phase::Completed)?;
        self.completed_at = Some(now);
        Ok(())
    }

    pub fn is_completed(&self) -> bool {
        self.phase == Phase::Completed
    }

    pub fn completed_at(&self) -> Option<f64> {
        self.completed_at
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    pub(crate) fn cancel(&mut self) {
        self.cancelled = true;
    }

    pub fn record(&self, phase: Phase) -> Option<&PhaseRecord> {
        self.records.get(&phase)
    }

    pub(crate) fn record_mut(&mut self, phase: Phase) -> &mut PhaseRecord {
        self.records.entry(phase).or_default()
    }

    /// All phase records in line order.
    pub fn records(&self) -> impl Iterator<Item = (Phase, &PhaseRecord)> {
        self.records.iter().map(|(p, r)| (*p, r))
    }

    pub fn bundle(&self, family: PhaseFamily) -> &Bundle {
        match family {
            PhaseFamily::Disassembly => &self.disassembly,
            PhaseFamily::Reassembly => &self.reassembly,
        }
    }

    pub(crate) fn bundle_mut(&mut self, family: PhaseFamily) -> &mut Bundle {
        match family {
            PhaseFamily::Disassembly => &mut self.disassembly,
            PhaseFamily::Reassembly => &mut self.reassembly,
        }
    }

    /// Sum of expected durations still ahead of the order (minutes):
    /// uncompleted single-capacity phases plus remaining bundle steps.
    pub fn expected_remaining(&self) -> f64 {
        let stations: f64 = [Phase::Acceptance, Phase::Inspection, Phase::Quality]
            .iter()
            .filter_map(|p| self.records.get(p))
            .filter(|r| !r.completed)
            .map(|r| r.expected)
            .sum();
        stations + self.disassembly.remaining_duration() + self.reassembly.remaining_duration()
    }

    /// Total queued time across all phases (minutes).
    pub fn total_waiting(&self) -> f64 {
        self.records.values().map(|r| r.waiting).sum()
    }
}
