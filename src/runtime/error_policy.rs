//! # Error Policy
//!
//! Requeue decision for reconciliations that ended in `Fail`. Retries are paced by
//! the fast backoff tier, per object, so one failing object never slows another.

use std::sync::Arc;

use kube::Resource;
use kube_runtime::controller::Action;
use tracing::{error, warn};

use crate::composed::ActionError;
use crate::controller::{object_ref, ControllerContext};
use crate::observability;
use crate::store::{ClusterObject, ObjectKey};

/// Requeue reason recorded for error retries
pub const REQUEUE_REASON_ERROR_BACKOFF: &str = "error-backoff";

/// Handle a reconciliation error with the object's fast-tier backoff
///
/// A cancelled invocation is not an error: the controller is shutting down, so
/// nothing is scheduled.
pub fn error_policy<K: ClusterObject>(obj: Arc<K>, error: &ActionError, ctx: Arc<ControllerContext>) -> Action {
    let resource = object_ref(obj.as_ref());
    if error.is_cancelled() {
        warn!(resource = %resource, "Reconciliation cancelled, not requeueing");
        return Action::await_change();
    }

    observability::metrics::increment_reconciliation_errors();
    let limiter = ctx.policies.fast();
    let delay = limiter.when_object(obj.as_ref());
    error!(
        resource = %resource,
        kind = %K::kind(&()),
        error = %error,
        retries = limiter.num_requeues(&ObjectKey::for_object(obj.as_ref())),
        requeue_after = ?delay,
        "Reconciliation error, retrying with backoff"
    );

    observability::metrics::increment_requeues_total(REQUEUE_REASON_ERROR_BACKOFF);
    Action::requeue(delay)
}
