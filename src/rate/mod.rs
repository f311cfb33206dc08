//! # Rate Limiting
//!
//! Per-object exponential backoff and the named retry tiers built on it.

mod limiter;
mod policies;

pub use limiter::{BackoffPolicy, ItemExponentialFailureRateLimiter, ObjectRateLimiter};
pub use policies::{BackoffPolicies, BackoffTier, FAST, MEDIUM, SLOW, ULTRA_SLOW};
