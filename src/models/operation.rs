//! Operation step and bundle model.
//!
//! An operation step is the smallest unit of slot work: one disassembly or
//! reassembly operation of one order. Steps are grouped per phase family
//! into a [`Bundle`] that is consumed strictly from the front.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

/// The two slot-backed phase families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseFamily {
    Disassembly,
    Reassembly,
}

impl PhaseFamily {
    /// Both families in line order.
    pub const ALL: [PhaseFamily; 2] = [PhaseFamily::Disassembly, PhaseFamily::Reassembly];

    /// Activity name used in event-log records.
    pub fn activity_name(self) -> &'static str {
        match self {
            PhaseFamily::Disassembly => "DISASSEMBLY",
            PhaseFamily::Reassembly => "REASSEMBLY",
        }
    }
}

impl fmt::Display for PhaseFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PhaseFamily::Disassembly => f.write_str("disassembly"),
            PhaseFamily::Reassembly => f.write_str("reassembly"),
        }
    }
}

/// Normalizes an operation label into the key used for slot matching.
///
/// Trims, lowercases, and collapses runs of whitespace, `_` and `-` into a
/// single `-`. `" Engine  Block"` and `"engine_block"` both become
/// `"engine-block"`.
pub fn normalize_type_key(label: &str) -> String {
    let mut key = String::with_capacity(label.len());
    let mut pending_sep = false;
    for ch in label.trim().chars() {
        if ch.is_whitespace() || ch == '_' || ch == '-' {
            pending_sep = !key.is_empty();
            continue;
        }
        if pending_sep {
            key.push('-');
            pending_sep = false;
        }
        key.extend(ch.to_lowercase());
    }
    key
}

/// Identity of one operation within an order: family plus position in the
/// family's original sequence. Stable for the lifetime of the order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OperationKey {
    pub family: PhaseFamily,
    pub index: usize,
}

impl fmt::Display for OperationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.family, self.index)
    }
}

/// One resolved operation. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationStep {
    /// Display label as written in the bill of process.
    pub label: String,
    /// Normalized key used for slot matching.
    pub type_key: String,
    /// Resolved duration in minutes (base × variation factor).
    pub duration: f64,
    /// Identity within the order.
    pub key: OperationKey,
}

impl OperationStep {
    /// Creates a step; the type key is derived from the label.
    pub fn new(label: impl Into<String>, duration: f64, key: OperationKey) -> Self {
        let label = label.into();
        Self {
            type_key: normalize_type_key(&label),
            label,
            duration,
            key,
        }
    }

    /// Activity name for event-log records, e.g. `DISASSEMBLY:engine`.
    pub fn activity_name(&self) -> String {
        format!("{}:{}", self.key.family.activity_name(), self.type_key)
    }
}

/// Remaining operations of one order for one phase family.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bundle {
    pub family: PhaseFamily,
    steps: VecDeque<OperationStep>,
}

impl Bundle {
    /// Creates an empty bundle.
    pub fn new(family: PhaseFamily) -> Self {
        Self {
            family,
            steps: VecDeque::new(),
        }
    }

    /// Appends a step with the next sequence index.
    pub fn with_step(mut self, label: impl Into<String>, duration: f64) -> Self {
        self.push(label, duration);
        self
    }

    /// Appends a step with the next sequence index.
    pub fn push(&mut self, label: impl Into<String>, duration: f64) {
        let index = self.steps.back().map(|s| s.key.index + 1).unwrap_or(0);
        let key = OperationKey {
            family: self.family,
            index,
        };
        self.steps.push_back(OperationStep::new(label, duration, key));
    }

    /// The next operation to run.
    pub fn front(&self) -> Option<&OperationStep> {
        self.steps.front()
    }

    /// Removes the head step, but only if it is the operation identified by
    /// `key`. A mismatch leaves the bundle untouched.
    pub fn pop_completed(&mut self, key: OperationKey) -> Option<OperationStep> {
        match self.steps.front() {
            Some(step) if step.key == key => self.steps.pop_front(),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Iterates remaining steps in execution order.
    pub fn iter(&self) -> impl Iterator<Item = &OperationStep> {
        self.steps.iter()
    }

    /// Sum of remaining step durations (minutes).
    pub fn remaining_duration(&self) -> f64 {
        self.steps.iter().map(|s| s.duration).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_type_key() {
        assert_eq!(normalize_type_key("Engine"), "engine");
        assert_eq!(normalize_type_key("  Engine  Block "), "engine-block");
        assert_eq!(normalize_type_key("engine__block"), "engine-block");
        assert_eq!(normalize_type_key("-Gear-Box-"), "gear-box");
        assert_eq!(normalize_type_key(""), "");
    }

    #[test]
    fn test_bundle_sequence_indices() {
        let bundle = Bundle::new(PhaseFamily::Disassembly)
            .with_step("Engine", 30.0)
            .with_step("Gearbox", 20.0)
            .with_step("Engine", 10.0);

        let keys: Vec<usize> = bundle.iter().map(|s| s.key.index).collect();
        assert_eq!(keys, vec![0, 1, 2]);
        assert_eq!(bundle.len(), 3);
        assert!((bundle.remaining_duration() - 60.0).abs() < 1e-9);
    }

    #[test]
    fn test_pop_completed_only_pops_head() {
        let mut bundle = Bundle::new(PhaseFamily::Reassembly)
            .with_step("Housing", 5.0)
            .with_step("Seal", 5.0);

        let second = bundle.iter().nth(1).unwrap().key;
        assert!(bundle.pop_completed(second).is_none());
        assert_eq!(bundle.len(), 2);

        let first = bundle.front().unwrap().key;
        let popped = bundle.pop_completed(first).unwrap();
        assert_eq!(popped.type_key, "housing");
        assert_eq!(bundle.front().unwrap().type_key, "seal");
    }

    #[test]
    fn test_activity_name() {
        let step = OperationStep::new(
            "Engine Block",
            1.0,
            OperationKey {
                family: PhaseFamily::Disassembly,
                index: 0,
            },
        );
        assert_eq!(step.activity_name(), "DISASSEMBLY:engine-block");
        assert_eq!(step.key.to_string(), "disassembly#0");
    }
}
