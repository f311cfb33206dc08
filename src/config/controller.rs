//! # Controller Settings
//!
//! Reconciliation settings: field manager, cleanup pacing, and the backoff tiers.

use std::collections::HashMap;
use std::time::Duration;

use super::env_var_or_default;
use crate::rate::{BackoffPolicy, BackoffTier};

/// Controller configuration
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Field manager recorded on status writes
    pub field_manager: String,
    /// Fixed requeue between cleanup passes (seconds)
    pub nuke_requeue_secs: u64,
    /// Backoff curve per tier
    pub backoff: HashMap<BackoffTier, BackoffPolicy>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        use crate::constants::*;
        Self {
            field_manager: DEFAULT_FIELD_MANAGER.to_string(),
            nuke_requeue_secs: DEFAULT_NUKE_REQUEUE_SECS,
            backoff: BackoffTier::ALL
                .iter()
                .map(|tier| (*tier, tier.default_policy()))
                .collect(),
        }
    }
}

impl ControllerConfig {
    /// Load configuration from environment variables with defaults
    ///
    /// Each backoff tier reads `BACKOFF_<TIER>_BASE_MS`, `BACKOFF_<TIER>_MAX_MS`, and
    /// `BACKOFF_<TIER>_SPEED`, e.g. `BACKOFF_SLOW_BASE_MS=5000`.
    pub fn from_env() -> Self {
        use crate::constants::*;
        Self {
            field_manager: env_var_or_default("FIELD_MANAGER", DEFAULT_FIELD_MANAGER.to_string()),
            nuke_requeue_secs: env_var_or_default("NUKE_REQUEUE_SECS", DEFAULT_NUKE_REQUEUE_SECS),
            backoff: BackoffTier::ALL
                .iter()
                .map(|tier| (*tier, backoff_from_env(*tier)))
                .collect(),
        }
    }

    /// Policy of one tier, falling back to the built-in curve
    pub fn backoff(&self, tier: BackoffTier) -> BackoffPolicy {
        self.backoff
            .get(&tier)
            .copied()
            .unwrap_or_else(|| tier.default_policy())
    }

    pub fn nuke_requeue(&self) -> Duration {
        Duration::from_secs(self.nuke_requeue_secs)
    }
}

#[allow(
    clippy::cast_possible_truncation,
    reason = "Default delays are far below u64::MAX milliseconds"
)]
fn backoff_from_env(tier: BackoffTier) -> BackoffPolicy {
    let default = tier.default_policy();
    let prefix = tier.env_prefix();
    let base_ms = env_var_or_default(
        &format!("{prefix}_BASE_MS"),
        default.base_delay.as_millis() as u64,
    );
    let max_ms = env_var_or_default(
        &format!("{prefix}_MAX_MS"),
        default.max_delay.as_millis() as u64,
    );
    let speed = env_var_or_default(&format!("{prefix}_SPEED"), default.speed);
    BackoffPolicy::new(
        Duration::from_millis(base_ms),
        Duration::from_millis(max_ms),
        speed,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_builtin_tiers() {
        let config = ControllerConfig::default();
        assert_eq!(config.backoff(BackoffTier::Fast), crate::rate::FAST);
        assert_eq!(config.backoff(BackoffTier::UltraSlow), crate::rate::ULTRA_SLOW);
        assert_eq!(config.nuke_requeue(), Duration::from_secs(10));
        assert_eq!(config.field_manager, "cloud-manager");
    }

    #[test]
    fn test_missing_tier_falls_back() {
        let mut config = ControllerConfig::default();
        config.backoff.clear();
        assert_eq!(config.backoff(BackoffTier::Slow), crate::rate::SLOW);
    }
}
