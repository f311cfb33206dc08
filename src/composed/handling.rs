//! # Handling
//!
//! Translates a pipeline's final `ControlResult` into what `kube_runtime`'s
//! controller expects back from a reconcile call.
//!
//! | ControlResult | Controller |
//! |---|---|
//! | `Continue`, `StopAndForget` | `Action::await_change()` |
//! | `StopWithRequeue` | `Action::requeue(0s)` |
//! | `StopWithRequeueDelay(d)` | `Action::requeue(d)` |
//! | `Fail(err)` | `Err(err)`, handed to the error policy |

use std::time::Duration;

use kube_runtime::controller::Action;
use tracing::{error, info, warn};

use super::{ActionContext, ActionError, ControlResult};
use crate::observability;

pub const RESULT_SUCCESS: &str = "success";
pub const RESULT_REQUEUE: &str = "requeue";
pub const RESULT_REQUEUE_AFTER: &str = "requeue_after";
pub const RESULT_ERROR: &str = "error";
pub const RESULT_CANCELED: &str = "canceled";

/// Outcome reporter for one reconciler
#[derive(Debug, Clone, Default)]
pub struct Handler {
    metrics: Option<(String, String)>,
    no_log: bool,
}

impl Handler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count every outcome under `cloud_manager_reconcile_total{controller, name}`
    pub fn with_metrics(mut self, controller: impl Into<String>, name: impl Into<String>) -> Self {
        self.metrics = Some((controller.into(), name.into()));
        self
    }

    /// Do not log the outcome
    pub fn with_no_log(mut self) -> Self {
        self.no_log = true;
        self
    }

    pub fn handle(&self, result: ControlResult, ctx: &ActionContext) -> Result<Action, ActionError> {
        let label = result_label(&result);
        if let Some((controller, name)) = &self.metrics {
            observability::metrics::record_reconcile(controller, name, label);
        }

        match result {
            ControlResult::Continue | ControlResult::StopAndForget => {
                if !self.no_log {
                    info!(parent: ctx.span(), "Reconciliation finished");
                }
                Ok(Action::await_change())
            }
            ControlResult::StopWithRequeue => {
                if !self.no_log {
                    info!(parent: ctx.span(), "Reconciliation finished with requeue");
                }
                observability::metrics::increment_requeues_total(RESULT_REQUEUE);
                Ok(Action::requeue(Duration::ZERO))
            }
            ControlResult::StopWithRequeueDelay(delay) => {
                if !self.no_log {
                    info!(parent: ctx.span(), requeue_after = ?delay, "Reconciliation finished with delayed requeue");
                }
                observability::metrics::increment_requeues_total(RESULT_REQUEUE_AFTER);
                Ok(Action::requeue(delay))
            }
            ControlResult::Fail(err) => {
                if !self.no_log {
                    if err.is_cancelled() {
                        warn!(parent: ctx.span(), "Reconciliation cancelled");
                    } else {
                        error!(parent: ctx.span(), error = %err, "Reconciliation failed");
                    }
                }
                Err(err)
            }
        }
    }
}

/// Metric label of a result
pub fn result_label(result: &ControlResult) -> &'static str {
    match result {
        ControlResult::Continue | ControlResult::StopAndForget => RESULT_SUCCESS,
        ControlResult::StopWithRequeue => RESULT_REQUEUE,
        ControlResult::StopWithRequeueDelay(_) => RESULT_REQUEUE_AFTER,
        ControlResult::Fail(err) if err.is_cancelled() => RESULT_CANCELED,
        ControlResult::Fail(_) => RESULT_ERROR,
    }
}
