//! # Observability
//!
//! Prometheus metrics. Logging goes through `tracing`; the subscriber is installed
//! by `runtime::initialization`.

pub mod metrics;
