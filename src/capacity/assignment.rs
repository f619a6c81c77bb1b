//! Active slot assignments.
//!
//! Maps (order, operation) to the slot claim serving it. Insertion rejects
//! an operation that already holds a slot, and every claim lives in exactly
//! one entry, which keeps busy slots and assignments in one-to-one
//! correspondence.

use std::collections::BTreeMap;

use super::SlotClaim;
use crate::error::SlotError;
use crate::models::{OperationKey, OperationStep, OrderId, PhaseFamily};
use crate::EPSILON;

/// One operation running on one slot.
#[derive(Debug)]
pub struct ActiveAssignment {
    pub claim: SlotClaim,
    pub step: OperationStep,
    pub started_at: f64,
    /// Minutes left.
    pub remaining: f64,
}

/// Table of running operations keyed by (order, operation).
#[derive(Debug, Default)]
pub struct AssignmentTable {
    active: BTreeMap<(OrderId, OperationKey), ActiveAssignment>,
}

impl AssignmentTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, order_id: &str, key: OperationKey) -> bool {
        self.active.contains_key(&(order_id.to_string(), key))
    }

    /// Whether the order has any running operation.
    pub fn has_order(&self, order_id: &str) -> bool {
        self.active.keys().any(|(id, _)| id == order_id)
    }

    /// Registers a running operation.
    ///
    /// On rejection the claim is handed back so the caller can release it.
    pub fn insert(
        &mut self,
        order_id: &str,
        assignment: ActiveAssignment,
    ) -> Result<(), (SlotError, ActiveAssignment)> {
        let key = (order_id.to_string(), assignment.step.key);
        if self.active.contains_key(&key) {
            let err = SlotError::DoubleClaim {
                order_id: order_id.to_string(),
                operation: assignment.step.key.to_string(),
            };
            return Err((err, assignment));
        }
        self.active.insert(key, assignment);
        Ok(())
    }

    /// Removes a running operation and returns it with its claim.
    pub fn remove(&mut self, order_id: &str, key: OperationKey) -> Option<ActiveAssignment> {
        self.active.remove(&(order_id.to_string(), key))
    }

    /// Advances every assignment of `family` by `delta` and returns the
    /// (order, operation) pairs that reached zero, in key order.
    pub fn progress(&mut self, family: PhaseFamily, delta: f64) -> Vec<(OrderId, OperationKey)> {
        let mut finished = Vec::new();
        for ((order_id, key), assignment) in self.active.iter_mut() {
            if key.family != family {
                continue;
            }
            assignment.remaining -= delta;
            if assignment.remaining <= EPSILON {
                finished.push((order_id.clone(), *key));
            }
        }
        finished
    }

    /// Number of assignments referencing the given slot.
    pub fn references(&self, family: PhaseFamily, slot: usize) -> usize {
        self.active
            .values()
            .filter(|a| a.claim.family() == family && a.claim.index() == slot)
            .count()
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    /// Running operations in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ActiveAssignment)> {
        self.active.iter().map(|((id, _), a)| (id.as_str(), a))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capacity::SlotPool;
    use crate::models::{Bundle, Slot};

    fn step(family: PhaseFamily, label: &str, duration: f64) -> OperationStep {
        Bundle::new(family).with_step(label, duration).front().unwrap().clone()
    }

    #[test]
    fn test_insert_rejects_double_claim() {
        let mut pool = SlotPool::new(
            PhaseFamily::Disassembly,
            vec![Slot::flexible(0), Slot::flexible(1)],
            0.0,
        );
        let mut table = AssignmentTable::new();
        let s = step(PhaseFamily::Disassembly, "Engine", 10.0);

        let first = ActiveAssignment {
            claim: pool.pick(&s.label, 0.0).unwrap(),
            step: s.clone(),
            started_at: 0.0,
            remaining: 10.0,
        };
        table.insert("O1", first).unwrap();
        assert!(table.contains("O1", s.key));

        let second = ActiveAssignment {
            claim: pool.pick(&s.label, 0.0).unwrap(),
            step: s.clone(),
            started_at: 0.0,
            remaining: 10.0,
        };
        let (err, rejected) = table.insert("O1", second).unwrap_err();
        assert!(matches!(err, SlotError::DoubleClaim { .. }));
        pool.release(rejected.claim, 0.0).unwrap();

        assert_eq!(table.len(), 1);
        assert_eq!(pool.busy_count(), 1);
        assert_eq!(table.references(PhaseFamily::Disassembly, 0), 1);
        assert_eq!(table.references(PhaseFamily::Disassembly, 1), 0);
    }

    #[test]
    fn test_progress_only_touches_family() {
        let mut dis = SlotPool::new(PhaseFamily::Disassembly, vec![Slot::flexible(0)], 0.0);
        let mut re = SlotPool::new(PhaseFamily::Reassembly, vec![Slot::flexible(0)], 0.0);
        let mut table = AssignmentTable::new();

        let d = step(PhaseFamily::Disassembly, "Engine", 5.0);
        let r = step(PhaseFamily::Reassembly, "Engine", 5.0);
        table
            .insert(
                "O1",
                ActiveAssignment {
                    claim: dis.pick("Engine", 0.0).unwrap(),
                    step: d.clone(),
                    started_at: 0.0,
                    remaining: 5.0,
                },
            )
            .unwrap();
        table
            .insert(
                "O2",
                ActiveAssignment {
                    claim: re.pick("Engine", 0.0).unwrap(),
                    step: r,
                    started_at: 0.0,
                    remaining: 5.0,
                },
            )
            .unwrap();

        assert!(table.progress(PhaseFamily::Disassembly, 3.0).is_empty());
        let done = table.progress(PhaseFamily::Disassembly, 2.0);
        assert_eq!(done, vec![("O1".to_string(), d.key)]);

        let finished = table.remove("O1", d.key).unwrap();
        dis.release(finished.claim, 5.0).unwrap();
        assert!(table.has_order("O2"));
        assert!(!table.has_order("O1"));
    }
}
