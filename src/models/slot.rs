//! Slot model.
//!
//! A slot is one unit of parallel capacity inside a disassembly or
//! reassembly phase. Rigid slots are permanently specialized to one
//! operation type; flexible slots serve any type but pay a changeover
//! (minimum idle time) before switching to a different one.
//!
//! State changes go through [`Slot::occupy`] and [`Slot::vacate`], which
//! reject claiming a busy slot and releasing an idle one. Each successful
//! occupy bumps a generation counter so a release can be tied to exactly
//! the occupancy it ends.

use serde::{Deserialize, Serialize};

use super::normalize_type_key;
use crate::error::SlotError;

/// Slot specialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SlotKind {
    /// Serves only `specialization` (a normalized type key).
    Rigid { specialization: String },
    /// Serves any type, subject to changeover.
    Flexible,
}

/// Why a slot cannot take an operation right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotRefusal {
    Busy,
    WrongSpecialization,
    /// Flexible slot holds another type and has not been idle long enough.
    Changeover,
}

/// One unit of capacity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slot {
    /// Position within its pool.
    pub index: usize,
    pub kind: SlotKind,
    busy: bool,
    /// Type key of the current or most recent operation.
    current_type: Option<String>,
    /// When the slot last became idle. `None` while busy or never used.
    idle_since: Option<f64>,
    generation: u64,
}

impl Slot {
    /// Creates an idle rigid slot.
    pub fn rigid(index: usize, specialization: &str) -> Self {
        let key = normalize_type_key(specialization);
        Self {
            index,
            kind: SlotKind::Rigid {
                specialization: key.clone(),
            },
            busy: false,
            current_type: Some(key),
            idle_since: None,
            generation: 0,
        }
    }

    /// Creates an idle, unassigned flexible slot.
    pub fn flexible(index: usize) -> Self {
        Self {
            index,
            kind: SlotKind::Flexible,
            busy: false,
            current_type: None,
            idle_since: None,
            generation: 0,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn is_rigid(&self) -> bool {
        matches!(self.kind, SlotKind::Rigid { .. })
    }

    /// Rigid specialization, if any.
    pub fn specialization(&self) -> Option<&str> {
        match &self.kind {
            SlotKind::Rigid { specialization } => Some(specialization),
            SlotKind::Flexible => None,
        }
    }

    pub fn current_type(&self) -> Option<&str> {
        self.current_type.as_deref()
    }

    pub fn idle_since(&self) -> Option<f64> {
        if self.busy {
            None
        } else {
            self.idle_since
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Checks whether this slot may take an operation of `type_key` at
    /// `now`. `type_key` must already be normalized.
    ///
    /// A flexible slot that is unassigned or already holds `type_key` is
    /// taken immediately. Otherwise it must have been idle for at least
    /// `changeover` minutes; an unset idle-since counts as idle since `now`.
    pub fn check(&self, type_key: &str, now: f64, changeover: f64) -> Result<(), SlotRefusal> {
        if self.busy {
            return Err(SlotRefusal::Busy);
        }
        match &self.kind {
            SlotKind::Rigid { specialization } => {
                if specialization == type_key {
                    Ok(())
                } else {
                    Err(SlotRefusal::WrongSpecialization)
                }
            }
            SlotKind::Flexible => match self.current_type.as_deref() {
                None => Ok(()),
                Some(current) if current == type_key => Ok(()),
                Some(_) => {
                    let idle = now - self.idle_since.unwrap_or(now);
                    if idle + f64::EPSILON >= changeover {
                        Ok(())
                    } else {
                        Err(SlotRefusal::Changeover)
                    }
                }
            },
        }
    }

    /// Marks the slot busy with `type_key`. Returns the new generation.
    pub(crate) fn occupy(&mut self, type_key: &str) -> Result<u64, SlotError> {
        if self.busy {
            return Err(SlotError::AlreadyBusy { index: self.index });
        }
        self.busy = true;
        self.idle_since = None;
        if !self.is_rigid() {
            self.current_type = Some(type_key.to_string());
        }
        self.generation += 1;
        Ok(self.generation)
    }

    /// Ends the occupancy identified by `generation`.
    pub(crate) fn vacate(&mut self, generation: u64, now: f64) -> Result<(), SlotError> {
        if !self.busy {
            return Err(SlotError::AlreadyIdle { index: self.index });
        }
        if generation != self.generation {
            return Err(SlotError::StaleClaim { index: self.index });
        }
        self.busy = false;
        self.idle_since = Some(now);
        Ok(())
    }
}
