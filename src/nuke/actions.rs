//! # Cleanup Pipeline
//!
//! Discover -> converge -> done check -> delete -> status patch, repeated every
//! requeue interval until the provider has nothing left.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info, warn};

use super::tracker::{ConvergenceTracker, ProviderResourceAdapter, ProviderResourceKindState};
use crate::composed::{
    predicates, Action, ActionContext, BaseState, ControlResult, If, ObjectState, Sequence, StopAndForgetAction,
    UpdateStatus,
};
use crate::crd::{
    Condition, ConditionStatus, Nuke, NukeResourceStatus, NukeStatus, ResourceType, CONDITION_TYPE_READY,
    CONDITION_TYPE_UPDATING, LIFECYCLE, NUKE_STATE_COMPLETED, NUKE_STATE_PROCESSING, REASON_DELETING, REASON_READY,
};
use crate::observability;
use crate::store::Cluster;

/// State of one cleanup pass
#[derive(Debug)]
pub struct NukeState {
    base: BaseState<Nuke>,
    tracker: ConvergenceTracker,
    /// Working copy of the status, written once at the end of the pass
    status: NukeStatus,
}

impl NukeState {
    pub fn new(cluster: Cluster, nuke: Nuke, tracker: ConvergenceTracker) -> Self {
        let status = nuke.status.clone().unwrap_or_default();
        Self {
            base: BaseState::new(cluster, nuke),
            tracker,
            status,
        }
    }

    pub fn tracker(&self) -> &ConvergenceTracker {
        &self.tracker
    }

    pub fn status(&self) -> &NukeStatus {
        &self.status
    }
}

impl ObjectState for NukeState {
    type Obj = Nuke;

    fn cluster(&self) -> &Cluster {
        self.base.cluster()
    }

    fn obj(&self) -> &Nuke {
        self.base.obj()
    }

    fn set_obj(&mut self, obj: Nuke) {
        self.base.set_obj(obj);
    }
}

pub type Adapters = Arc<[Arc<dyn ProviderResourceAdapter>]>;

fn is_completed(_ctx: &ActionContext, state: &NukeState) -> bool {
    state.status.state.as_deref() == Some(NUKE_STATE_COMPLETED)
}

/// Lists every kind on the provider and records the snapshots
#[derive(Debug)]
pub struct Discover {
    adapters: Adapters,
    retry_delay: Duration,
}

#[async_trait]
impl Action<NukeState> for Discover {
    async fn run(&self, ctx: &mut ActionContext, state: &mut NukeState) -> ControlResult {
        let subscription = state.obj().spec.subscription.clone();
        for adapter in self.adapters.iter() {
            let objects = match adapter.list(&subscription).await {
                Ok(objects) => objects,
                Err(err) => {
                    return ctx.log_error_and_return(
                        &err,
                        &format!("Error listing {} resources", adapter.kind()),
                        ControlResult::StopWithRequeueDelay(self.retry_delay),
                    );
                }
            };
            debug!(parent: ctx.span(), kind = adapter.kind(), count = objects.len(), "Discovered provider resources");
            state.tracker.record(ProviderResourceKindState {
                kind: adapter.kind().to_string(),
                provider: adapter.provider(),
                objects,
            });
        }
        ControlResult::Continue
    }
}

/// Folds the fresh listing into the status map
#[derive(Debug, Clone, Copy, Default)]
pub struct Converge;

#[async_trait]
impl Action<NukeState> for Converge {
    async fn run(&self, ctx: &mut ActionContext, state: &mut NukeState) -> ControlResult {
        if state.status.initialized_on.is_none() {
            state.status.initialized_on = Some(Utc::now().to_rfc3339());
        }
        for (kind, count) in state.tracker.converge(&mut state.status) {
            info!(parent: ctx.span(), kind = %kind, count, "Provider resources deleted");
            observability::metrics::record_provider_resources_deleted(&kind, count);
        }
        ControlResult::Continue
    }
}

/// Marks the request completed once nothing is left
#[derive(Debug, Clone, Copy, Default)]
pub struct CheckDone;

#[async_trait]
impl Action<NukeState> for CheckDone {
    async fn run(&self, ctx: &mut ActionContext, state: &mut NukeState) -> ControlResult {
        if !state.tracker.is_done() {
            return ControlResult::Continue;
        }

        let mut status = state.status.clone();
        status.state = Some(NUKE_STATE_COMPLETED.to_string());
        UpdateStatus::for_state(&*state)
            .mutate_status(move |nuke| {
                let previous = nuke.status.take().unwrap_or_default();
                nuke.status = Some(NukeStatus {
                    conditions: previous.conditions,
                    observed_generation: previous.observed_generation,
                    ..status
                });
            })
            .set_exclusive_conditions(
                LIFECYCLE,
                [Condition::new(
                    CONDITION_TYPE_READY,
                    ConditionStatus::True,
                    REASON_READY,
                    "All orphaned resources deleted",
                )],
            )
            .success_log_message("Cleanup completed")
            .error_log_message("Error patching Nuke status with completed state")
            .success_result(ControlResult::StopAndForget)
            .run(ctx, state)
            .await
    }
}

/// Issues deletes for listed resources whose kind is not blocked
///
/// A resource still listed after an accepted delete gets the delete again on
/// every pass until the provider stops listing it.
#[derive(Debug)]
pub struct DeleteResources {
    adapters: Adapters,
}

#[async_trait]
impl Action<NukeState> for DeleteResources {
    async fn run(&self, ctx: &mut ActionContext, state: &mut NukeState) -> ControlResult {
        for adapter in self.adapters.iter() {
            let kind = adapter.kind();
            if state.tracker.has_blocking_children(kind) {
                debug!(parent: ctx.span(), kind, "Deletion waits for child resources");
                continue;
            }
            let Some(snapshot) = state.tracker.snapshot(kind) else {
                continue;
            };

            let entry = state.status.kind_mut(kind, ResourceType::Provider);
            for object in &snapshot.objects {
                let previous = entry.objects.get(&object.id).copied();
                if previous == Some(NukeResourceStatus::Deleted) {
                    continue;
                }
                match adapter.delete(object).await {
                    Ok(()) if previous == Some(NukeResourceStatus::Deleting) => {
                        info!(parent: ctx.span(), kind, id = %object.id, "Provider resource still present, deleting again");
                    }
                    Ok(()) => {
                        info!(parent: ctx.span(), kind, id = %object.id, "Deleting provider resource");
                        entry
                            .objects
                            .insert(object.id.clone(), NukeResourceStatus::Deleting);
                    }
                    Err(err) => {
                        warn!(
                            parent: ctx.span(),
                            kind,
                            id = %object.id,
                            error = %err,
                            "Error deleting provider resource, retrying next pass"
                        );
                    }
                }
            }
        }
        ControlResult::Continue
    }
}

/// Writes the pass's status and schedules the next pass
#[derive(Debug, Clone, Copy)]
pub struct PatchProgress {
    requeue: Duration,
}

#[async_trait]
impl Action<NukeState> for PatchProgress {
    async fn run(&self, ctx: &mut ActionContext, state: &mut NukeState) -> ControlResult {
        let mut status = state.status.clone();
        status.state = Some(NUKE_STATE_PROCESSING.to_string());
        let pending = state.tracker.pending();
        UpdateStatus::for_state(&*state)
            .mutate_status(move |nuke| {
                let previous = nuke.status.take().unwrap_or_default();
                nuke.status = Some(NukeStatus {
                    conditions: previous.conditions,
                    observed_generation: previous.observed_generation,
                    ..status
                });
            })
            .set_exclusive_conditions(
                LIFECYCLE,
                [Condition::new(
                    CONDITION_TYPE_UPDATING,
                    ConditionStatus::True,
                    REASON_DELETING,
                    format!("{pending} resources pending deletion"),
                )],
            )
            .error_log_message("Error patching Nuke status with progress")
            .success_result(ControlResult::StopWithRequeueDelay(self.requeue))
            .run(ctx, state)
            .await
    }
}

/// The full cleanup pipeline
///
/// Adapters are listed and deleted in the given order. The blocking children table
/// comes with the tracker each pass's state is built with.
pub fn nuke_pipeline(adapters: Adapters, requeue: Duration) -> Sequence<NukeState> {
    Sequence::new("nuke")
        .step(If::new(
            predicates::marked_for_deletion::<NukeState>,
            StopAndForgetAction,
        ))
        .step(If::new(is_completed, StopAndForgetAction))
        .step(Discover {
            adapters: Arc::clone(&adapters),
            retry_delay: requeue,
        })
        .step(Converge)
        .step(CheckDone)
        .step(DeleteResources { adapters })
        .step(PatchProgress { requeue })
}
