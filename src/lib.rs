//! Queue-and-slot scheduling core for remanufacturing lines.
//!
//! Orders move through a fixed line: intake queue, acceptance, inspection,
//! disassembly, reassembly and quality. Acceptance, inspection and quality
//! are single-capacity stations with pluggable dispatching policies.
//! Disassembly and reassembly run on pools of parallel slots, each slot
//! either rigid (one operation type) or flexible (any type, after a
//! changeover). Batch queues with a release delay and an optional external
//! reordering hook sit between the phases.
//!
//! # Modules
//!
//! - **`models`**: Domain types: `Order`, `Phase`, `BillOfProcess`, `Bundle`,
//!   `Slot`, `EventLog`
//! - **`queue`**: Batch queues with release windows and reordering hooks
//! - **`capacity`**: Slot pools, active assignments and main-phase stations
//! - **`dispatching`**: Station selection rules (FIFO, SJF, LJF, PRIORITY,
//!   EDD, RANDOM) and the rule engine that composes them
//! - **`simulation`**: Clock, per-tick dispatcher and the `Simulation` facade
//! - **`metrics`**: Lead, processing and waiting times folded from the log
//! - **`validation`**: Order feed and configuration checks
//! - **`config`**: Serializable run configuration
//!
//! # Determinism
//!
//! Every random draw comes from one generator seeded by the configuration.
//! The same seed, order feed and tick deltas reproduce the same event log.
//!
//! # References
//!
//! - Pinedo (2016), "Scheduling: Theory, Algorithms, and Systems"
//! - Guide (2000), "Production planning and control for remanufacturing"

pub mod capacity;
pub mod config;
pub mod dispatching;
pub mod error;
pub mod metrics;
pub mod models;
pub mod queue;
pub mod simulation;
pub mod validation;

/// Tolerance for comparing simulated minutes.
pub(crate) const EPSILON: f64 = 1e-9;
