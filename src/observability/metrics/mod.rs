//! # Metrics Module
//!
//! Prometheus metrics for monitoring the controller, organized by responsibility.
//!
//! ## Sub-modules
//!
//! - `registry` - Metrics registry setup, registration, and text encoding
//! - `controller_metrics` - Reconciliation outcomes, errors, requeues, and cleanup deletions

pub mod controller_metrics;
pub mod registry;

pub use controller_metrics::*;
pub use registry::*;
