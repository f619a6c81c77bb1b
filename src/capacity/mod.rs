//! Capacity: single-capacity stations and slot pools.
//!
//! - [`MainPhaseStation`]: acceptance, inspection and quality; one order at
//!   a time, waiting list ordered by a [`RuleEngine`](crate::dispatching::RuleEngine).
//! - [`SlotPool`]: parallel rigid/flexible slots for disassembly and
//!   reassembly, claimed through [`SlotClaim`] values.
//! - [`AssignmentTable`]: the running (order, operation) → slot map.

mod assignment;
mod pool;
mod station;

pub use assignment::{ActiveAssignment, AssignmentTable};
pub use pool::{SlotClaim, SlotPool, SlotStatus};
pub use station::{MainPhaseStation, Occupancy, StationTick, WaitingEntry};
