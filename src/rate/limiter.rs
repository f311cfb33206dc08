//! # Rate Limiter
//!
//! Per-key exponential failure backoff.
//!
//! `delay(n) = min(max, base * 2^(speed * n))` where `n` counts the `when` calls
//! since the key was last forgotten. Counters expire on their own after 1.3x the
//! policy's max delay, so keys nobody asks about again do not accumulate.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use kube::Resource;
use moka::sync::Cache;

use crate::store::ObjectKey;

/// Shape of a backoff curve
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Exponent multiplier; 2 quadruples the delay on every failure
    pub speed: f64,
}

impl BackoffPolicy {
    pub const fn new(base_delay: Duration, max_delay: Duration, speed: f64) -> Self {
        Self {
            base_delay,
            max_delay,
            speed,
        }
    }

    /// Delay after `failures` previous attempts, saturating at `max_delay`
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        reason = "Values are range-checked against max_delay before the cast back"
    )]
    pub fn delay(&self, failures: u32) -> Duration {
        let exponent = self.speed * f64::from(failures);
        let max_nanos = self.max_delay.as_nanos() as f64;
        if !exponent.is_finite() || exponent > f64::from(f64::MAX_EXP) {
            return self.max_delay;
        }

        let nanos = self.base_delay.as_nanos() as f64 * 2f64.powf(exponent);
        if !nanos.is_finite() || nanos >= max_nanos {
            return self.max_delay;
        }
        Duration::from_nanos(nanos as u64)
    }

    /// How long an idle failure counter is kept
    pub fn counter_ttl(&self) -> Duration {
        self.max_delay.mul_f64(1.3).max(Duration::from_millis(1))
    }
}

/// Failure counters keyed by string, with the delay curve of one policy
///
/// `when` reads, increments, and answers under one lock, so concurrent workers
/// never observe the same count twice for a key.
pub struct ItemExponentialFailureRateLimiter {
    policy: BackoffPolicy,
    failures: Mutex<Cache<String, u32>>,
}

impl std::fmt::Debug for ItemExponentialFailureRateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ItemExponentialFailureRateLimiter")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl ItemExponentialFailureRateLimiter {
    pub fn new(policy: BackoffPolicy) -> Self {
        let failures = Cache::builder().time_to_live(policy.counter_ttl()).build();
        Self {
            policy,
            failures: Mutex::new(failures),
        }
    }

    pub fn policy(&self) -> &BackoffPolicy {
        &self.policy
    }

    /// Delay for the next retry of `key`; counts one more failure
    pub fn when(&self, key: &str) -> Duration {
        let failures = self.failures.lock().unwrap_or_else(PoisonError::into_inner);
        let count = failures.get(key).unwrap_or_default();
        failures.insert(key.to_string(), count.saturating_add(1));
        self.policy.delay(count)
    }

    pub fn num_requeues(&self, key: &str) -> u32 {
        let failures = self.failures.lock().unwrap_or_else(PoisonError::into_inner);
        failures.get(key).unwrap_or_default()
    }

    /// Reset `key`; the next `when` starts over at the base delay
    pub fn forget(&self, key: &str) {
        let failures = self.failures.lock().unwrap_or_else(PoisonError::into_inner);
        failures.invalidate(key);
    }
}

/// Rate limiter keyed on cluster object identity
#[derive(Debug)]
pub struct ObjectRateLimiter {
    inner: ItemExponentialFailureRateLimiter,
}

impl ObjectRateLimiter {
    pub fn new(policy: BackoffPolicy) -> Self {
        Self {
            inner: ItemExponentialFailureRateLimiter::new(policy),
        }
    }

    pub fn policy(&self) -> &BackoffPolicy {
        self.inner.policy()
    }

    pub fn when(&self, key: &ObjectKey) -> Duration {
        self.inner.when(key.as_str())
    }

    pub fn when_object<K: Resource<DynamicType = ()>>(&self, obj: &K) -> Duration {
        self.when(&ObjectKey::for_object(obj))
    }

    pub fn num_requeues(&self, key: &ObjectKey) -> u32 {
        self.inner.num_requeues(key.as_str())
    }

    pub fn forget(&self, key: &ObjectKey) {
        self.inner.forget(key.as_str());
    }

    pub fn forget_object<K: Resource<DynamicType = ()>>(&self, obj: &K) {
        self.forget(&ObjectKey::for_object(obj));
    }
}
