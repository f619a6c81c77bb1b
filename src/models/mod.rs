//! Line domain models.
//!
//! Data types for orders, their bills of process and operation steps, the
//! capacity slots that serve them, and the event log that records the work.
//!
//! # Domain Mappings
//!
//! | u-reman | Job-shop term |
//! |---------|---------------|
//! | Order | Job |
//! | OperationStep | Operation |
//! | Slot | Machine (one unit of a parallel stage) |
//! | EventLog | Realized schedule |

mod bill;
mod event;
mod operation;
mod order;
mod slot;

pub use bill::{BillCorrection, BillOfProcess, BillSelection, ParsedBill, ProcessToken};
pub use event::{EventEntry, EventKind, EventLog};
pub use operation::{normalize_type_key, Bundle, OperationKey, OperationStep, PhaseFamily};
pub use order::{Order, OrderId, Phase, PhaseRecord};
pub use slot::{Slot, SlotKind, SlotRefusal};
