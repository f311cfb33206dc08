//! # Backoff Policies
//!
//! The four named retry tiers. Built once at start-up from configuration and
//! handed to every pipeline that needs backoff.
//!
//! | Tier | Base | Max | Speed | Used for |
//! |------|------|-----|-------|----------|
//! | fast | 100ms | 10m | 2 | transient cluster API failures |
//! | medium | 1s | 10m | 2 | dependency still being processed |
//! | slow | 10s | 10m | 2 | dependency missing or failed |
//! | ultra-slow | 1m | 1h | 1 | waiting on manual or external action |

use std::time::Duration;

use super::{BackoffPolicy, ObjectRateLimiter};
use crate::config::ControllerConfig;

pub const FAST: BackoffPolicy = BackoffPolicy::new(Duration::from_millis(100), Duration::from_secs(600), 2.0);
pub const MEDIUM: BackoffPolicy = BackoffPolicy::new(Duration::from_secs(1), Duration::from_secs(600), 2.0);
pub const SLOW: BackoffPolicy = BackoffPolicy::new(Duration::from_secs(10), Duration::from_secs(600), 2.0);
pub const ULTRA_SLOW: BackoffPolicy = BackoffPolicy::new(Duration::from_secs(60), Duration::from_secs(3600), 1.0);

/// Retry urgency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackoffTier {
    Fast,
    Medium,
    Slow,
    UltraSlow,
}

impl BackoffTier {
    pub const ALL: [Self; 4] = [Self::Fast, Self::Medium, Self::Slow, Self::UltraSlow];

    /// Prefix of the tier's environment variables
    pub fn env_prefix(self) -> &'static str {
        match self {
            Self::Fast => "BACKOFF_FAST",
            Self::Medium => "BACKOFF_MEDIUM",
            Self::Slow => "BACKOFF_SLOW",
            Self::UltraSlow => "BACKOFF_ULTRA_SLOW",
        }
    }

    pub fn default_policy(self) -> BackoffPolicy {
        match self {
            Self::Fast => FAST,
            Self::Medium => MEDIUM,
            Self::Slow => SLOW,
            Self::UltraSlow => ULTRA_SLOW,
        }
    }
}

/// Registry holding one rate limiter per tier
#[derive(Debug)]
pub struct BackoffPolicies {
    fast: ObjectRateLimiter,
    medium: ObjectRateLimiter,
    slow: ObjectRateLimiter,
    ultra_slow: ObjectRateLimiter,
}

impl Default for BackoffPolicies {
    fn default() -> Self {
        Self::new(FAST, MEDIUM, SLOW, ULTRA_SLOW)
    }
}

impl BackoffPolicies {
    pub fn new(fast: BackoffPolicy, medium: BackoffPolicy, slow: BackoffPolicy, ultra_slow: BackoffPolicy) -> Self {
        Self {
            fast: ObjectRateLimiter::new(fast),
            medium: ObjectRateLimiter::new(medium),
            slow: ObjectRateLimiter::new(slow),
            ultra_slow: ObjectRateLimiter::new(ultra_slow),
        }
    }

    pub fn from_config(config: &ControllerConfig) -> Self {
        Self::new(
            config.backoff(BackoffTier::Fast),
            config.backoff(BackoffTier::Medium),
            config.backoff(BackoffTier::Slow),
            config.backoff(BackoffTier::UltraSlow),
        )
    }

    pub fn tier(&self, tier: BackoffTier) -> &ObjectRateLimiter {
        match tier {
            BackoffTier::Fast => &self.fast,
            BackoffTier::Medium => &self.medium,
            BackoffTier::Slow => &self.slow,
            BackoffTier::UltraSlow => &self.ultra_slow,
        }
    }

    /// Transient cluster API failures
    pub fn fast(&self) -> &ObjectRateLimiter {
        &self.fast
    }

    /// Dependency exists but is still being processed
    pub fn medium(&self) -> &ObjectRateLimiter {
        &self.medium
    }

    /// Dependency missing or explicitly not ready
    pub fn slow(&self) -> &ObjectRateLimiter {
        &self.slow
    }

    /// Conditions only an operator or an external system can resolve
    pub fn ultra_slow(&self) -> &ObjectRateLimiter {
        &self.ultra_slow
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ObjectKey;

    #[test]
    fn test_default_tiers_are_distinct() {
        let policies: Vec<BackoffPolicy> = BackoffTier::ALL.iter().map(|t| t.default_policy()).collect();
        for (i, a) in policies.iter().enumerate() {
            for b in &policies[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_tiers_count_independently() {
        let policies = BackoffPolicies::default();
        let key = ObjectKey::new(
            &crate::store::ObjectKind::of::<crate::crd::Network>(),
            Some("ns"),
            "net-1",
        );

        assert_eq!(policies.slow().when(&key), Duration::from_secs(10));
        assert_eq!(policies.medium().when(&key), Duration::from_secs(1));
        assert_eq!(policies.slow().when(&key), Duration::from_secs(40));
        assert_eq!(policies.tier(BackoffTier::Medium).num_requeues(&key), 1);
        assert_eq!(policies.ultra_slow().when(&key), Duration::from_secs(60));
        assert_eq!(policies.ultra_slow().when(&key), Duration::from_secs(120));
    }
}
