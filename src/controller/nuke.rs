//! # Nuke Controller
//!
//! Runs one cleanup pass per invocation through the provider adapters registered
//! on the controller context.

use std::sync::Arc;

use kube_runtime::controller::Action;

use super::{run_pipeline, ControllerContext};
use crate::composed::ActionError;
use crate::constants::CONTROLLER_NUKE;
use crate::crd::Nuke;
use crate::nuke::{nuke_pipeline, NukeState};

/// Reconcile entry point for `kube_runtime::Controller`
pub async fn reconcile(nuke: Arc<Nuke>, ctx: Arc<ControllerContext>) -> Result<Action, ActionError> {
    let pipeline = nuke_pipeline(Arc::clone(&ctx.adapters), ctx.nuke_requeue);
    let state = NukeState::new(ctx.cluster.clone(), (*nuke).clone(), ctx.nuke_tracker.clone());
    run_pipeline(CONTROLLER_NUKE, &pipeline, state, &ctx).await
}
