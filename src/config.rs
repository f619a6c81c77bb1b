//! Simulation configuration.
//!
//! Every field has a default, so a partial JSON document (or `{}`) is a
//! valid configuration.
//!
//! ```
//! use u_reman::config::SimulationConfig;
//! use u_reman::dispatching::PolicyKind;
//!
//! let config = SimulationConfig::from_json_str(r#"{
//!     "seed": 7,
//!     "queue_delays": { "pre_inspection": 10 },
//!     "disassembly": { "slot_count": 2, "flexible_share_percent": 50, "rigid_types": ["Engine"] },
//!     "policies": { "inspection": "sjf" }
//! }"#).unwrap();
//! assert_eq!(config.seed, 7);
//! assert_eq!(config.disassembly.flexible_count(), 1);
//! assert_eq!(config.policies.inspection, PolicyKind::Sjf);
//! assert_eq!(config.changeover_minutes, 5.0);
//! ```

use serde::{Deserialize, Serialize};

use crate::capacity::SlotPool;
use crate::dispatching::PolicyKind;
use crate::error::ConfigError;
use crate::models::{Phase, PhaseFamily};
use crate::queue::QueueStage;

/// Release delay per intake queue (minutes).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueDelays {
    pub pre_acceptance: f64,
    pub pre_inspection: f64,
    pub post_inspection: f64,
}

impl QueueDelays {
    pub fn for_stage(&self, stage: QueueStage) -> f64 {
        match stage {
            QueueStage::PreAcceptance => self.pre_acceptance,
            QueueStage::PreInspection => self.pre_inspection,
            QueueStage::PostInspection => self.post_inspection,
        }
    }

    fn for_stage_mut(&mut self, stage: QueueStage) -> &mut f64 {
        match stage {
            QueueStage::PreAcceptance => &mut self.pre_acceptance,
            QueueStage::PreInspection => &mut self.pre_inspection,
            QueueStage::PostInspection => &mut self.post_inspection,
        }
    }
}

/// Layout of one slot pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlotPoolConfig {
    pub slot_count: usize,
    /// Share of flexible slots, 0..=100.
    pub flexible_share_percent: f64,
    /// Specializations handed to rigid slots round-robin.
    pub rigid_types: Vec<String>,
}

impl Default for SlotPoolConfig {
    fn default() -> Self {
        Self {
            slot_count: 3,
            flexible_share_percent: 100.0,
            rigid_types: Vec::new(),
        }
    }
}

impl SlotPoolConfig {
    /// All-flexible pool of `slot_count` slots.
    pub fn flexible(slot_count: usize) -> Self {
        Self {
            slot_count,
            ..Self::default()
        }
    }

    /// Pool with the given flexible share and rigid specializations.
    pub fn mixed(slot_count: usize, flexible_share_percent: f64, rigid_types: &[&str]) -> Self {
        Self {
            slot_count,
            flexible_share_percent,
            rigid_types: rigid_types.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// `round(slot_count × share / 100)`, capped at `slot_count`.
    pub fn flexible_count(&self) -> usize {
        let share = self.flexible_share_percent.clamp(0.0, 100.0);
        let count = (self.slot_count as f64 * share / 100.0).round() as usize;
        count.min(self.slot_count)
    }

    pub fn rigid_count(&self) -> usize {
        self.slot_count - self.flexible_count()
    }

    /// Builds the pool: rigid slots first, flexible slots after.
    pub fn build(&self, family: PhaseFamily, changeover: f64) -> SlotPool {
        SlotPool::with_layout(
            family,
            self.slot_count,
            self.flexible_count(),
            &self.rigid_types,
            changeover,
        )
    }
}

/// Stochastic duration variation per phase, in percent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VariationPercent {
    pub acceptance: f64,
    pub inspection: f64,
    pub disassembly: f64,
    pub reassembly: f64,
    pub quality: f64,
}

impl VariationPercent {
    /// Variation for a processing phase; queue phases have none.
    pub fn for_phase(&self, phase: Phase) -> f64 {
        match phase {
            Phase::Acceptance => self.acceptance,
            Phase::Inspection => self.inspection,
            Phase::Disassembly => self.disassembly,
            Phase::Reassembly => self.reassembly,
            Phase::Quality => self.quality,
            _ => 0.0,
        }
    }

    fn values(&self) -> [(&'static str, f64); 5] {
        [
            ("variation_percent.acceptance", self.acceptance),
            ("variation_percent.inspection", self.inspection),
            ("variation_percent.disassembly", self.disassembly),
            ("variation_percent.reassembly", self.reassembly),
            ("variation_percent.quality", self.quality),
        ]
    }
}

/// Scheduling policy per main-phase station.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StationPolicies {
    pub acceptance: PolicyKind,
    pub inspection: PolicyKind,
    pub quality: PolicyKind,
}

impl StationPolicies {
    pub fn for_phase(&self, phase: Phase) -> PolicyKind {
        match phase {
            Phase::Inspection => self.inspection,
            Phase::Quality => self.quality,
            _ => self.acceptance,
        }
    }
}

/// Base duration per main-phase station (minutes).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MainPhaseMinutes {
    pub acceptance: f64,
    pub inspection: f64,
    pub quality: f64,
}

impl Default for MainPhaseMinutes {
    fn default() -> Self {
        Self {
            acceptance: 10.0,
            inspection: 20.0,
            quality: 15.0,
        }
    }
}

impl MainPhaseMinutes {
    pub fn for_phase(&self, phase: Phase) -> f64 {
        match phase {
            Phase::Acceptance => self.acceptance,
            Phase::Inspection => self.inspection,
            Phase::Quality => self.quality,
            _ => 0.0,
        }
    }
}

/// Top-level simulation configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Seed for duration variation, bill selection and the Random policy.
    pub seed: u64,
    pub queue_delays: QueueDelays,
    pub disassembly: SlotPoolConfig,
    pub reassembly: SlotPoolConfig,
    /// Minimum idle time before a flexible slot switches type (minutes).
    pub changeover_minutes: f64,
    pub variation_percent: VariationPercent,
    pub policies: StationPolicies,
    pub main_phase_minutes: MainPhaseMinutes,
    /// Duration for operation types with no base duration (minutes).
    pub default_operation_minutes: f64,
    /// Wall-clock budget for one reordering hook call (milliseconds).
    pub reorder_timeout_ms: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            queue_delays: QueueDelays::default(),
            disassembly: SlotPoolConfig::default(),
            reassembly: SlotPoolConfig::default(),
            changeover_minutes: 5.0,
            variation_percent: VariationPercent::default(),
            policies: StationPolicies::default(),
            main_phase_minutes: MainPhaseMinutes::default(),
            default_operation_minutes: 30.0,
            reorder_timeout_ms: 50,
        }
    }
}

impl SimulationConfig {
    /// Parses a JSON document and validates it.
    pub fn from_json_str(input: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    /// Sets the seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Sets the release delay of one intake queue.
    pub fn with_queue_delay(mut self, stage: QueueStage, minutes: f64) -> Self {
        *self.queue_delays.for_stage_mut(stage) = minutes;
        self
    }

    /// Sets the layout of one slot pool.
    pub fn with_pool(mut self, family: PhaseFamily, pool: SlotPoolConfig) -> Self {
        match family {
            PhaseFamily::Disassembly => self.disassembly = pool,
            PhaseFamily::Reassembly => self.reassembly = pool,
        }
        self
    }

    /// Sets the changeover time.
    pub fn with_changeover(mut self, minutes: f64) -> Self {
        self.changeover_minutes = minutes;
        self
    }

    /// Sets the policy of one main-phase station.
    pub fn with_policy(mut self, phase: Phase, policy: PolicyKind) -> Self {
        match phase {
            Phase::Inspection => self.policies.inspection = policy,
            Phase::Quality => self.policies.quality = policy,
            _ => self.policies.acceptance = policy,
        }
        self
    }

    pub fn pool(&self, family: PhaseFamily) -> &SlotPoolConfig {
        match family {
            PhaseFamily::Disassembly => &self.disassembly,
            PhaseFamily::Reassembly => &self.reassembly,
        }
    }

    /// Checks value ranges and pool layouts.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::InvalidValue`] for a negative or non-finite duration,
    ///   delay, or variation,
    /// - [`ConfigError::InvalidShare`] for a flexible share outside 0..=100,
    /// - [`ConfigError::MissingRigidTypes`] for rigid slots without any
    ///   specialization to assign, or with a blank one in `rigid_types`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut values = vec![
            ("queue_delays.pre_acceptance", self.queue_delays.pre_acceptance),
            ("queue_delays.pre_inspection", self.queue_delays.pre_inspection),
            ("queue_delays.post_inspection", self.queue_delays.post_inspection),
            ("changeover_minutes", self.changeover_minutes),
            ("main_phase_minutes.acceptance", self.main_phase_minutes.acceptance),
            ("main_phase_minutes.inspection", self.main_phase_minutes.inspection),
            ("main_phase_minutes.quality", self.main_phase_minutes.quality),
            ("default_operation_minutes", self.default_operation_minutes),
        ];
        values.extend(self.variation_percent.values());
        for (field, value) in values {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidValue { field, value });
            }
        }

        for family in PhaseFamily::ALL {
            let pool = self.pool(family);
            let share = pool.flexible_share_percent;
            if !(0.0..=100.0).contains(&share) {
                return Err(ConfigError::InvalidShare {
                    phase: family,
                    value: share,
                });
            }
            let rigid = pool.rigid_count();
            let blank = pool.rigid_types.iter().any(|t| t.trim().is_empty());
            if rigid > 0 && (pool.rigid_types.is_empty() || blank) {
                return Err(ConfigError::MissingRigidTypes {
                    phase: family,
                    rigid,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SimulationConfig::default();
        assert_eq!(config.seed, 42);
        assert_eq!(config.disassembly.slot_count, 3);
        assert_eq!(config.disassembly.flexible_count(), 3);
        assert!((config.main_phase_minutes.for_phase(Phase::Inspection) - 20.0).abs() < 1e-9);
        assert_eq!(config.policies.for_phase(Phase::Quality), PolicyKind::Fifo);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_json_is_default() {
        let config = SimulationConfig::from_json_str("{}").unwrap();
        assert_eq!(config, SimulationConfig::default());
    }

    #[test]
    fn test_json_round_trip() {
        let config = SimulationConfig::default()
            .with_seed(9)
            .with_queue_delay(QueueStage::PostInspection, 12.5)
            .with_pool(PhaseFamily::Reassembly, SlotPoolConfig::mixed(4, 25.0, &["Seal"]))
            .with_policy(Phase::Inspection, PolicyKind::Edd);
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(SimulationConfig::from_json_str(&json).unwrap(), config);
    }

    #[test]
    fn test_flexible_count_rounds() {
        assert_eq!(SlotPoolConfig::mixed(3, 50.0, &["a"]).flexible_count(), 2);
        assert_eq!(SlotPoolConfig::mixed(3, 0.0, &["a"]).flexible_count(), 0);
        assert_eq!(SlotPoolConfig::mixed(5, 30.0, &["a"]).rigid_count(), 3);
    }

    #[test]
    fn test_build_pool_layout() {
        let pool = SlotPoolConfig::mixed(3, 34.0, &["Engine", "Gearbox"])
            .build(PhaseFamily::Disassembly, 5.0);
        assert_eq!(pool.len(), 3);
        assert!(pool.slots()[0].is_rigid());
        assert!(pool.slots()[1].is_rigid());
        assert!(!pool.slots()[2].is_rigid());
        assert_eq!(pool.slots()[1].specialization(), Some("gearbox"));
    }

    #[test]
    fn test_rejects_negative_values() {
        let config = SimulationConfig::default().with_changeover(-1.0);
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidValue {
                field: "changeover_minutes",
                value: -1.0
            })
        );

        let config = SimulationConfig::default().with_queue_delay(QueueStage::PreAcceptance, f64::NAN);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { field: "queue_delays.pre_acceptance", .. })
        ));
    }

    #[test]
    fn test_rejects_bad_share_and_missing_rigid_types() {
        let config = SimulationConfig::default()
            .with_pool(PhaseFamily::Disassembly, SlotPoolConfig::mixed(2, 120.0, &[]));
        assert!(matches!(config.validate(), Err(ConfigError::InvalidShare { .. })));

        let config = SimulationConfig::default()
            .with_pool(PhaseFamily::Reassembly, SlotPoolConfig::mixed(2, 50.0, &[]));
        assert_eq!(
            config.validate(),
            Err(ConfigError::MissingRigidTypes {
                phase: PhaseFamily::Reassembly,
                rigid: 1
            })
        );

        let config = SimulationConfig::default().with_pool(
            PhaseFamily::Disassembly,
            SlotPoolConfig::mixed(2, 0.0, &["", "Engine"]),
        );
        assert_eq!(
            config.validate(),
            Err(ConfigError::MissingRigidTypes {
                phase: PhaseFamily::Disassembly,
                rigid: 2
            })
        );
    }

    #[test]
    fn test_parse_error() {
        assert!(matches!(
            SimulationConfig::from_json_str("{ \"seed\": \"x\" }"),
            Err(ConfigError::Parse(_))
        ));
    }
}
