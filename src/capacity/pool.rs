//! Slot pool for one disassembly or reassembly phase.
//!
//! # Matching
//!
//! `pick` scans slots in index order and claims the first one that:
//! 1. is idle, and
//! 2. if rigid, is specialized to the requested type key, or
//! 3. if flexible, is unassigned or already set up for the type, or
//! 4. if flexible and set up for another type, has been idle for at least
//!    the changeover time.
//!
//! A successful pick returns a [`SlotClaim`]. The claim is the only way to
//! release the slot, and releasing consumes it, so a slot can be released
//! at most once per claim.

use serde::Serialize;

use crate::error::SlotError;
use crate::models::{normalize_type_key, PhaseFamily, Slot};

/// Proof of one occupancy of one slot. Not `Clone`: whoever holds it owns
/// the occupancy and must hand it back to [`SlotPool::release`].
#[derive(Debug, PartialEq, Eq)]
pub struct SlotClaim {
    family: PhaseFamily,
    index: usize,
    generation: u64,
}

impl SlotClaim {
    pub fn family(&self) -> PhaseFamily {
        self.family
    }

    pub fn index(&self) -> usize {
        self.index
    }
}

/// Read-only view of one slot for status displays.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlotStatus {
    pub index: usize,
    pub busy: bool,
    /// Rigid specialization; `None` for flexible slots.
    pub specialization: Option<String>,
    pub current_type: Option<String>,
    pub idle_since: Option<f64>,
}

/// Fixed-size array of slots with a shared changeover time.
#[derive(Debug, Clone)]
pub struct SlotPool {
    family: PhaseFamily,
    slots: Vec<Slot>,
    changeover: f64,
}

impl SlotPool {
    /// Creates a pool from explicit slots. Slot indices are rewritten to
    /// match their position.
    pub fn new(family: PhaseFamily, slots: Vec<Slot>, changeover: f64) -> Self {
        let slots = slots
            .into_iter()
            .enumerate()
            .map(|(index, mut slot)| {
                slot.index = index;
                slot
            })
            .collect();
        Self {
            family,
            slots,
            changeover: changeover.max(0.0),
        }
    }

    /// Creates a pool with `rigid_types.len()`-cycled rigid slots at the low
    /// indices followed by `flexible` flexible slots.
    pub fn with_layout(
        family: PhaseFamily,
        slot_count: usize,
        flexible: usize,
        rigid_types: &[String],
        changeover: f64,
    ) -> Self {
        let flexible = flexible.min(slot_count);
        let rigid = slot_count - flexible;
        let types: Vec<&str> = rigid_types
            .iter()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .collect();
        let mut slots = Vec::with_capacity(slot_count);
        for i in 0..rigid {
            match types.get(i % types.len().max(1)) {
                Some(spec) => slots.push(Slot::rigid(i, spec)),
                None => slots.push(Slot::flexible(i)),
            }
        }
        for i in rigid..slot_count {
            slots.push(Slot::flexible(i));
        }
        Self::new(family, slots, changeover)
    }

    pub fn family(&self) -> PhaseFamily {
        self.family
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn changeover(&self) -> f64 {
        self.changeover
    }

    pub fn busy_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_busy()).count()
    }

    /// Whether any slot could ever take the type, ignoring current state.
    pub fn can_serve(&self, label: &str) -> bool {
        let key = normalize_type_key(label);
        self.slots
            .iter()
            .any(|s| s.specialization().map_or(true, |spec| spec == key))
    }

    /// Claims the first slot able to take `label` at `now`, or `None` when
    /// no slot qualifies this tick.
    pub fn pick(&mut self, label: &str, now: f64) -> Option<SlotClaim> {
        let key = normalize_type_key(label);
        let index = self
            .slots
            .iter()
            .position(|s| s.check(&key, now, self.changeover).is_ok())?;
        self.occupy(index, &key).ok()
    }

    /// Claims a specific slot. Rejects busy slots and slots that cannot take
    /// the type at `now`.
    pub fn claim(&mut self, index: usize, label: &str, now: f64) -> Result<SlotClaim, SlotError> {
        let key = normalize_type_key(label);
        let slot = self.slots.get(index).ok_or(SlotError::OutOfRange { index })?;
        if slot.is_busy() {
            return Err(SlotError::AlreadyBusy { index });
        }
        if slot.check(&key, now, self.changeover).is_err() {
            return Err(SlotError::StaleClaim { index });
        }
        self.occupy(index, &key)
    }

    fn occupy(&mut self, index: usize, key: &str) -> Result<SlotClaim, SlotError> {
        let slot = self
            .slots
            .get_mut(index)
            .ok_or(SlotError::OutOfRange { index })?;
        let generation = slot.occupy(key)?;
        Ok(SlotClaim {
            family: self.family,
            index,
            generation,
        })
    }

    /// Ends the occupancy behind `claim` and marks the slot idle since `now`.
    pub fn release(&mut self, claim: SlotClaim, now: f64) -> Result<(), SlotError> {
        if claim.family != self.family {
            return Err(SlotError::StaleClaim { index: claim.index });
        }
        let slot = self
            .slots
            .get_mut(claim.index)
            .ok_or(SlotError::OutOfRange { index: claim.index })?;
        slot.vacate(claim.generation, now)
    }

    /// Status of every slot, in index order.
    pub fn status(&self) -> Vec<SlotStatus> {
        self.slots
            .iter()
            .map(|s| SlotStatus {
                index: s.index,
                busy: s.is_busy(),
                specialization: s.specialization().map(String::from),
                current_type: s.current_type().map(String::from),
                idle_since: s.idle_since(),
            })
            .collect()
    }
}
