//! # Cloud Manager Controller
//!
//! Composable reconciliation engine for cloud infrastructure resources driven by
//! Kubernetes custom resources.
//!
//! ## Overview
//!
//! Every reconciler is a pipeline of small, idempotent actions:
//!
//! 1. **Actions and combinators** - `Sequence`, `If`, `IfElse`, `Switch` over a typed state
//! 2. **Control results** - continue, stop, requeue now, requeue later, or fail
//! 3. **Status patches** - one declarative status write per step with explicit outcomes
//! 4. **Backoff tiers** - per-object exponential rate limiters pacing retries
//! 5. **Dependency gates** - wait for referenced objects to exist and become Ready
//! 6. **Cleanup tracking** - discover, delete, and track orphaned provider resources
//!
//! ## Usage
//!
//! See the `cloud-manager-controller` binary for the wiring of the Network and
//! IpRange controllers.

pub mod composed;
pub mod config;
pub mod constants;
pub mod controller;
pub mod crd;
pub mod nuke;
pub mod observability;
pub mod rate;
pub mod runtime;
pub mod store;
