//! # Controller Metrics
//!
//! Metrics for controller operations: reconciliation outcomes, errors, requeues, and
//! provider resources removed by cleanup.

use crate::observability::metrics::registry::REGISTRY;
use anyhow::Result;
use prometheus::{Histogram, IntCounter, IntCounterVec};
use std::sync::LazyLock;

// Reconciliation outcome per controller and pipeline
static RECONCILE_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "cloud_manager_reconcile_total",
            "Total number of reconciliations by controller, pipeline, and result",
        ),
        &["controller", "name", "result"],
    )
    .expect("Failed to create RECONCILE_TOTAL metric - this should never happen")
});

static RECONCILIATION_ERRORS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "cloud_manager_reconciliation_errors_total",
        "Total number of reconciliation errors",
    )
    .expect("Failed to create RECONCILIATION_ERRORS_TOTAL metric - this should never happen")
});

static RECONCILIATION_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        prometheus::HistogramOpts::new(
            "cloud_manager_reconciliation_duration_seconds",
            "Duration of reconciliation in seconds",
        )
        .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 30.0]),
    )
    .expect("Failed to create RECONCILIATION_DURATION metric - this should never happen")
});

// Requeue metrics
static REQUEUES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "cloud_manager_requeues_total",
            "Total number of reconciliation requeues",
        ),
        &["reason"],
    )
    .expect("Failed to create REQUEUES_TOTAL metric - this should never happen")
});

// Cleanup metrics
static PROVIDER_RESOURCES_DELETED_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "cloud_manager_provider_resources_deleted_total",
            "Total number of provider resources confirmed deleted by cleanup",
        ),
        &["kind"],
    )
    .expect("Failed to create PROVIDER_RESOURCES_DELETED_TOTAL metric - this should never happen")
});

/// Register controller metrics with the registry
pub(crate) fn register_controller_metrics() -> Result<()> {
    REGISTRY.register(Box::new(RECONCILE_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_DURATION.clone()))?;
    REGISTRY.register(Box::new(REQUEUES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(PROVIDER_RESOURCES_DELETED_TOTAL.clone()))?;
    Ok(())
}

pub fn record_reconcile(controller: &str, name: &str, result: &str) {
    RECONCILE_TOTAL
        .with_label_values(&[controller, name, result])
        .inc();
}

pub fn reconcile_count(controller: &str, name: &str, result: &str) -> u64 {
    RECONCILE_TOTAL
        .with_label_values(&[controller, name, result])
        .get()
}

pub fn increment_reconciliation_errors() {
    RECONCILIATION_ERRORS_TOTAL.inc();
}

pub fn observe_reconciliation_duration(duration: f64) {
    RECONCILIATION_DURATION.observe(duration);
}

pub fn increment_requeues_total(reason: &str) {
    REQUEUES_TOTAL.with_label_values(&[reason]).inc();
}

pub fn record_provider_resources_deleted(kind: &str, count: u64) {
    PROVIDER_RESOURCES_DELETED_TOTAL
        .with_label_values(&[kind])
        .inc_by(count);
}
