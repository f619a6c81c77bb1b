//! Error types.
//!
//! Fatal problems (bad configuration, unknown orders) are returned as
//! `Result` errors. Problems that occur inside a tick are never propagated
//! out of the tick loop; they are reported as [`SimulationIssue`](crate::simulation::SimulationIssue)
//! values in the tick report instead.

use thiserror::Error;

use crate::models::{Phase, PhaseFamily};
use crate::queue::QueueStage;

/// Configuration rejected at setup. The simulation does not start.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("phase {phase} has required operations but zero slots configured")]
    NoSlots { phase: PhaseFamily },

    #[error("phase {phase} cannot serve operation type '{type_key}': no flexible slot and no matching rigid slot")]
    UnservableOperation { phase: PhaseFamily, type_key: String },

    #[error("flexible share for {phase} must be within 0..=100, got {value}")]
    InvalidShare { phase: PhaseFamily, value: f64 },

    #[error("phase {phase} has {rigid} rigid slot(s) but rigid_types is empty or has a blank entry")]
    MissingRigidTypes { phase: PhaseFamily, rigid: usize },

    #[error("{field} must be a non-negative finite number, got {value}")]
    InvalidValue { field: &'static str, value: f64 },

    #[error("failed to parse configuration: {0}")]
    Parse(String),
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::Parse(err.to_string())
    }
}

/// Rejected slot state transition.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SlotError {
    #[error("slot {index} does not exist")]
    OutOfRange { index: usize },

    #[error("slot {index} is already busy")]
    AlreadyBusy { index: usize },

    #[error("slot {index} is already idle")]
    AlreadyIdle { index: usize },

    #[error("claim on slot {index} belongs to another pool or an earlier occupancy")]
    StaleClaim { index: usize },

    #[error("operation {operation} of order {order_id} already holds a slot")]
    DoubleClaim { order_id: String, operation: String },
}

/// Rejected batch-queue operation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    #[error("order {order_id} is already waiting in the {stage} queue")]
    DuplicateEntry { order_id: String, stage: QueueStage },
}

/// Rejected order lifecycle operation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OrderError {
    #[error("order {0} already exists")]
    Duplicate(String),

    #[error("order {0} is unknown")]
    Unknown(String),

    #[error("order {order_id} cannot move backwards from {from} to {to}")]
    BackwardTransition {
        order_id: String,
        from: Phase,
        to: Phase,
    },
}

/// Failure reported by an external reordering hook.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HookError {
    #[error("reordering hook failed: {0}")]
    Failed(String),

    #[error("reordering hook panicked")]
    Panicked,

    #[error("reordering hook exceeded its {budget_ms} ms budget")]
    TimedOut { budget_ms: u64 },

    #[error("reordering hook returned an order set that is not a permutation of the batch")]
    NotAPermutation,
}

/// Umbrella error for the public simulation API.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimulationError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Slot(#[from] SlotError),

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error(transparent)]
    Order(#[from] OrderError),

    #[error("tick delta must be a positive finite number of minutes, got {0}")]
    InvalidDelta(f64),

    #[error("order {order_id} has invalid arrival time {arrival_time}")]
    InvalidArrival { order_id: String, arrival_time: f64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_subject() {
        let err = SlotError::AlreadyBusy { index: 3 };
        assert_eq!(err.to_string(), "slot 3 is already busy");

        let err = ConfigError::NoSlots {
            phase: PhaseFamily::Reassembly,
        };
        assert!(err.to_string().contains("reassembly"));
    }

    #[test]
    fn test_umbrella_conversion() {
        fn claim() -> Result<(), SimulationError> {
            Err(SlotError::AlreadyIdle { index: 0 })?
        }
        assert!(matches!(
            claim(),
            Err(SimulationError::Slot(SlotError::AlreadyIdle { index: 0 }))
        ));
    }

    #[test]
    fn test_config_parse_error_from_json() {
        let err: ConfigError = serde_json::from_str::<u32>("not json").unwrap_err().into();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
