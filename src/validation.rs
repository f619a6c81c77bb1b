//! Input validation for order feeds.
//!
//! Checks structural integrity of orders before (or while) they enter the
//! line. Detects:
//! - Duplicate order IDs
//! - Bills of process that need repair (missing markers, trailing or blank
//!   tokens, no operations at all)
//! - Operation types without a base duration
//! - Operations the configured slot pools can never serve
//!
//! Repairs are not failures: [`ValidationErrorKind::is_fatal`] tells the
//! two apart.

use std::collections::HashSet;

use crate::capacity::SlotPool;
use crate::config::SimulationConfig;
use crate::error::ConfigError;
use crate::models::{normalize_type_key, BillCorrection, BillOfProcess, PhaseFamily};
use crate::simulation::OrderSpec;

/// Validation result.
pub type ValidationResult = Result<(), Vec<ValidationError>>;

/// A validation error.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    /// Error category.
    pub kind: ValidationErrorKind,
    /// Human-readable description.
    pub message: String,
}

/// Categories of validation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationErrorKind {
    /// Two orders share the same ID.
    DuplicateId,
    /// Arrival time is negative or not finite.
    InvalidArrival,
    /// The bill had no terminal quality marker; one was appended.
    MissingTerminalMarker,
    /// The bill had no inspection marker; one was inserted.
    MissingInspectionMarker,
    /// Tokens after the quality marker were dropped.
    IgnoredTokens,
    /// Blank tokens were dropped.
    BlankTokens,
    /// The bill has no operations; the order skips disassembly and reassembly.
    NoOperations,
    /// An operation type has no base duration; the default is used.
    UnknownOperationType,
    /// A phase the order needs has zero slots.
    NoSlots,
    /// No slot of the phase can ever serve an operation type.
    UnservableOperation,
}

impl ValidationErrorKind {
    /// Whether the order cannot run at all. Non-fatal kinds are repairs that
    /// were applied.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ValidationErrorKind::DuplicateId
                | ValidationErrorKind::InvalidArrival
                | ValidationErrorKind::NoSlots
                | ValidationErrorKind::UnservableOperation
        )
    }
}

impl ValidationError {
    pub fn new(kind: ValidationErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

/// Describes the repairs applied to one order's bill.
pub fn bill_findings(order_id: &str, corrections: &[BillCorrection]) -> Vec<ValidationError> {
    corrections
        .iter()
        .map(|c| match c {
            BillCorrection::AppendedQuality => ValidationError::new(
                ValidationErrorKind::MissingTerminalMarker,
                format!("Order '{order_id}': bill has no quality marker, appended Q"),
            ),
            BillCorrection::InsertedInspection => ValidationError::new(
                ValidationErrorKind::MissingInspectionMarker,
                format!("Order '{order_id}': bill has no inspection marker, inserted I"),
            ),
            BillCorrection::IgnoredTrailing(tokens) => ValidationError::new(
                ValidationErrorKind::IgnoredTokens,
                format!(
                    "Order '{order_id}': ignored tokens after quality marker: {}",
                    tokens.join(", ")
                ),
            ),
            BillCorrection::DroppedBlank(count) => ValidationError::new(
                ValidationErrorKind::BlankTokens,
                format!("Order '{order_id}': dropped {count} blank token(s)"),
            ),
            BillCorrection::NoOperations => ValidationError::new(
                ValidationErrorKind::NoOperations,
                format!("Order '{order_id}': bill has no operations"),
            ),
        })
        .collect()
}

/// Checks that every operation of `bill` can be served by its pool.
///
/// # Errors
/// - [`ConfigError::NoSlots`] when a required family has an empty pool,
/// - [`ConfigError::UnservableOperation`] when no slot matches a type.
pub fn ensure_servable(bill: &BillOfProcess, pools: [&SlotPool; 2]) -> Result<(), ConfigError> {
    for pool in pools {
        let family = pool.family();
        if !bill.requires(family) {
            continue;
        }
        if pool.is_empty() {
            return Err(ConfigError::NoSlots { phase: family });
        }
        if let Some(label) = bill.operations(family).find(|l| !pool.can_serve(l)) {
            return Err(ConfigError::UnservableOperation {
                phase: family,
                type_key: normalize_type_key(label),
            });
        }
    }
    Ok(())
}

/// Validates an order feed against a configuration.
///
/// Checks:
/// 1. No duplicate order IDs
/// 2. Arrival times are finite and non-negative
/// 3. Every candidate bill parses without repair
/// 4. Every operation type has a base duration
/// 5. Every operation of every candidate bill is servable by the pools
///
/// # Returns
/// `Ok(())` if all checks pass, `Err(errors)` with all detected issues.
pub fn validate_orders(orders: &[OrderSpec], config: &SimulationConfig) -> ValidationResult {
    let mut errors = Vec::new();
    let disassembly = config
        .disassembly
        .build(PhaseFamily::Disassembly, config.changeover_minutes);
    let reassembly = config
        .reassembly
        .build(PhaseFamily::Reassembly, config.changeover_minutes);

    let mut ids = HashSet::new();
    for spec in orders {
        let id = spec.order_id.as_str();
        if !ids.insert(id) {
            errors.push(ValidationError::new(
                ValidationErrorKind::DuplicateId,
                format!("Duplicate order ID: {id}"),
            ));
        }

        if !spec.arrival_time.is_finite() || spec.arrival_time < 0.0 {
            errors.push(ValidationError::new(
                ValidationErrorKind::InvalidArrival,
                format!("Order '{id}' has invalid arrival time {}", spec.arrival_time),
            ));
        }

        let mut unknown = HashSet::new();
        for candidate in spec.candidates() {
            let parsed = BillOfProcess::parse(&candidate);
            errors.extend(bill_findings(id, &parsed.corrections));

            for family in PhaseFamily::ALL {
                for label in parsed.bill.operations(family) {
                    let key = normalize_type_key(label);
                    if spec.base_duration(&key).is_none() && unknown.insert(key.clone()) {
                        errors.push(ValidationError::new(
                            ValidationErrorKind::UnknownOperationType,
                            format!("Order '{id}': operation type '{key}' has no base duration"),
                        ));
                    }
                }
            }

            if let Err(err) = ensure_servable(&parsed.bill, [&disassembly, &reassembly]) {
                let kind = match err {
                    ConfigError::NoSlots { .. } => ValidationErrorKind::NoSlots,
                    _ => ValidationErrorKind::UnservableOperation,
                };
                errors.push(ValidationError::new(kind, format!("Order '{id}': {err}")));
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
