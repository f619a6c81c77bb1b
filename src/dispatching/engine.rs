//! Rule engine for multi-criteria dispatching.
//!
//! Rules are applied in sequence; a later rule is consulted only when all
//! earlier rules tie. Remaining ties go to the lowest enqueue sequence, so
//! the outcome never depends on the order of the waiting list.
//!
//! # Reference
//! Haupt (1989), "A Survey of Priority Rule-Based Scheduling"

use std::cmp::Ordering;
use std::sync::Arc;

use super::{Candidate, DispatchingRule, RuleScore, SchedulingContext};

/// A composable rule engine for candidate prioritization.
///
/// # Example
/// ```
/// use u_reman::dispatching::{rules, RuleEngine};
///
/// let engine = RuleEngine::new()
///     .with_rule(rules::Priority::default())
///     .with_tie_breaker(rules::Fifo);
/// assert_eq!(engine.rule_names(), vec!["PRIORITY", "FIFO"]);
/// ```
#[derive(Clone)]
pub struct RuleEngine {
    rules: Vec<Arc<dyn DispatchingRule>>,
    epsilon: f64,
}

impl RuleEngine {
    /// Creates an empty rule engine. With no rules every candidate ties and
    /// the lowest enqueue sequence wins.
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            epsilon: 1e-9,
        }
    }

    /// Adds a primary rule.
    pub fn with_rule<R: DispatchingRule + 'static>(mut self, rule: R) -> Self {
        self.rules.push(Arc::new(rule));
        self
    }

    /// Adds a rule consulted only when the previous rules tie.
    pub fn with_tie_breaker<R: DispatchingRule + 'static>(self, rule: R) -> Self {
        self.with_rule(rule)
    }

    /// Names of the configured rules, in evaluation order.
    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    /// Sorts candidates by priority (highest priority first).
    ///
    /// Returns indices into the candidate slice.
    pub fn sort_indices(
        &self,
        candidates: &[Candidate<'_>],
        context: &SchedulingContext,
    ) -> Vec<usize> {
        let mut indices: Vec<usize> = (0..candidates.len()).collect();
        indices.sort_by(|&a, &b| self.compare(&candidates[a], &candidates[b], context));
        indices
    }

    /// Returns the index of the highest-priority candidate, or `None` for an
    /// empty slice.
    pub fn select(&self, candidates: &[Candidate<'_>], context: &SchedulingContext) -> Option<usize> {
        (0..candidates.len())
            .min_by(|&a, &b| self.compare(&candidates[a], &candidates[b], context))
    }

    /// Scores from each rule for a single candidate.
    pub fn evaluate(&self, candidate: &Candidate<'_>, context: &SchedulingContext) -> Vec<RuleScore> {
        self.rules
            .iter()
            .map(|r| r.evaluate(candidate, context))
            .collect()
    }

    fn compare(&self, a: &Candidate<'_>, b: &Candidate<'_>, context: &SchedulingContext) -> Ordering {
        for rule in &self.rules {
            let score_a = rule.evaluate(a, context);
            let score_b = rule.evaluate(b, context);

            if (score_a - score_b).abs() > self.epsilon {
                return score_a.partial_cmp(&score_b).unwrap_or(Ordering::Equal);
            }
        }
        a.sequence.cmp(&b.sequence)
    }
}

impl Default for RuleEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RuleEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleEngine")
            .field("rules", &self.rule_names())
            .finish()
    }
}
