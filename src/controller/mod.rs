//! # Controllers
//!
//! Reconcilers built on the composed engine, plus the metrics and health server.
//!
//! - `network` - gates a Network on its Subscription
//! - `iprange` - gates an IpRange on its Network and the Network's Subscription
//! - `nuke` - cleanup of orphaned provider resources
//! - `server` - `/metrics`, `/healthz`, `/readyz`

pub mod iprange;
pub mod network;
pub mod nuke;
pub mod server;

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use kube::ResourceExt;
use kube_runtime::controller::Action;
use tokio_util::sync::CancellationToken;
use tracing::info_span;

use crate::composed::{
    Action as _, ActionContext, ActionError, ControlResult, Handler, ObjectState, Sequence, UpdateStatus,
};
use crate::crd::{Condition, ConditionStatus, CONDITION_TYPE_READY, LIFECYCLE, REASON_READY};
use crate::nuke::{Adapters, ConvergenceTracker};
use crate::observability;
use crate::rate::BackoffPolicies;
use crate::store::{Cluster, ClusterObject};

/// Shared context handed to every reconcile call
#[derive(Debug)]
pub struct ControllerContext {
    pub cluster: Cluster,
    pub policies: Arc<BackoffPolicies>,
    /// Parent of every invocation's cancellation token
    pub shutdown: CancellationToken,
    /// Provider adapters the cleanup controller works through
    pub adapters: Adapters,
    /// Blocking-children table every cleanup pass starts from
    pub nuke_tracker: ConvergenceTracker,
    pub nuke_requeue: Duration,
}

impl ControllerContext {
    pub fn new(cluster: Cluster, policies: Arc<BackoffPolicies>, shutdown: CancellationToken) -> Self {
        Self {
            cluster,
            policies,
            shutdown,
            adapters: Arc::new([]),
            nuke_tracker: ConvergenceTracker::new(),
            nuke_requeue: Duration::from_secs(crate::constants::DEFAULT_NUKE_REQUEUE_SECS),
        }
    }

    pub fn with_nuke(mut self, adapters: Adapters, tracker: ConvergenceTracker, requeue: Duration) -> Self {
        self.adapters = adapters;
        self.nuke_tracker = tracker;
        self.nuke_requeue = requeue;
        self
    }
}

/// Run `pipeline` once against `state` and translate its result for `kube_runtime`
///
/// A successful invocation clears the object's error backoff.
pub(crate) async fn run_pipeline<S>(
    controller: &'static str,
    pipeline: &Sequence<S>,
    mut state: S,
    ctx: &ControllerContext,
) -> Result<Action, ActionError>
where
    S: ObjectState,
{
    let span = info_span!(
        "controller.reconcile",
        controller,
        resource.name = %state.name(),
        resource.namespace = state.namespace().as_deref().unwrap_or_default()
    );
    let mut action_ctx = ActionContext::new(ctx.shutdown.child_token()).with_span(span);

    let start = Instant::now();
    let result = pipeline.run(&mut action_ctx, &mut state).await;
    observability::metrics::observe_reconciliation_duration(start.elapsed().as_secs_f64());

    let outcome = Handler::new()
        .with_metrics(controller, pipeline.name())
        .handle(result, &action_ctx);
    if outcome.is_ok() {
        ctx.policies.fast().forget_object(state.obj());
    }
    outcome
}

/// Sets the exclusive Ready=True condition and ends the pipeline
///
/// No write happens when the object is already Ready for its current generation.
#[derive(Debug, Clone, Copy)]
pub struct MarkReady {
    message: &'static str,
}

impl MarkReady {
    pub const fn new(message: &'static str) -> Self {
        Self { message }
    }
}

#[async_trait]
impl<S: ObjectState> crate::composed::Action<S> for MarkReady {
    async fn run(&self, ctx: &mut ActionContext, state: &mut S) -> ControlResult {
        UpdateStatus::for_state(&*state)
            .set_exclusive_conditions(
                LIFECYCLE,
                [Condition::new(
                    CONDITION_TYPE_READY,
                    ConditionStatus::True,
                    REASON_READY,
                    self.message,
                )],
            )
            .skip_unchanged()
            .status_changed_log_message(format!("{} is ready", state.name()))
            .error_log_message("Error patching status with Ready condition")
            .success_result(ControlResult::StopAndForget)
            .run(ctx, state)
            .await
    }
}

/// Name and namespace of an object, for logs
pub(crate) fn object_ref<K: ClusterObject>(obj: &K) -> String {
    match obj.namespace() {
        Some(namespace) => format!("{namespace}/{}", obj.name_any()),
        None => obj.name_any(),
    }
}
