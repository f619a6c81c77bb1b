//! Dispatching rules and rule engine for single-capacity stations.
//!
//! A station asks its [`RuleEngine`] which waiting order to start next.
//! Rules are pure: they score a [`Candidate`] and never touch the waiting
//! list. Removing the chosen order is the caller's job.
//!
//! # Usage
//!
//! ```
//! use u_reman::dispatching::{rules, RuleEngine, SchedulingContext};
//!
//! let engine = RuleEngine::new()
//!     .with_rule(rules::Edd)
//!     .with_tie_breaker(rules::Sjf);
//!
//! let context = SchedulingContext::at_time(0.0);
//! assert!(engine.select(&[], &context).is_none());
//! ```
//!
//! # References
//!
//! - Pinedo (2016), "Scheduling: Theory, Algorithms, and Systems", Ch. 4
//! - Haupt (1989), "A Survey of Priority Rule-Based Scheduling"

mod context;
mod engine;
pub mod rules;

pub use context::{Candidate, SchedulingContext};
pub use engine::RuleEngine;

use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// Score returned by a dispatching rule.
///
/// Lower scores = higher priority (selected first).
pub type RuleScore = f64;

/// A dispatching rule that evaluates candidate priority.
///
/// # Score Convention
/// **Lower score = higher priority.**
pub trait DispatchingRule: Send + Sync + Debug {
    /// Rule name (e.g., "SJF", "EDD").
    fn name(&self) -> &'static str;

    /// Evaluates the priority of a candidate at the given context.
    fn evaluate(&self, candidate: &Candidate<'_>, context: &SchedulingContext) -> RuleScore;

    /// Rule description.
    fn description(&self) -> &'static str {
        self.name()
    }
}

/// Built-in station policy, selectable from configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyKind {
    /// Earliest enqueued first.
    #[default]
    Fifo,
    /// Shortest expected remaining work first.
    Sjf,
    /// Longest expected remaining work first.
    Ljf,
    /// Earliest arrival (due-date proxy) first.
    Edd,
    /// Orders with `priority > 0` first, FIFO otherwise.
    Priority,
    /// Uniform random draw.
    Random,
}

impl PolicyKind {
    /// Builds the rule engine for this policy.
    pub fn engine(self) -> RuleEngine {
        let engine = RuleEngine::new();
        match self {
            PolicyKind::Fifo => engine.with_rule(rules::Fifo),
            PolicyKind::Sjf => engine.with_rule(rules::Sjf),
            PolicyKind::Ljf => engine.with_rule(rules::Ljf),
            PolicyKind::Edd => engine.with_rule(rules::Edd),
            PolicyKind::Priority => engine
                .with_rule(rules::Priority::default())
                .with_tie_breaker(rules::Fifo),
            PolicyKind::Random => engine.with_rule(rules::Random),
        }
    }
}
