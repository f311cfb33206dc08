//! # Watch Loop
//!
//! One `kube_runtime::Controller` per reconciled kind. Every loop stops when the
//! shared shutdown token fires.

use std::fmt::Debug;
use std::future::Future;
use std::sync::Arc;

use futures::StreamExt;
use kube::api::Api;
use kube::{Client, Resource};
use kube_runtime::controller::{Action, Controller};
use kube_runtime::watcher;
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use super::error_policy::error_policy;
use crate::composed::ActionError;
use crate::controller::{self, ControllerContext};
use crate::crd::{IpRange, Network, Nuke};
use crate::store::ClusterObject;

/// Run the controller for kind `K` until shutdown
pub async fn run_controller<K, F, Fut>(api: Api<K>, reconcile: F, ctx: Arc<ControllerContext>)
where
    K: ClusterObject + DeserializeOwned + Debug,
    F: FnMut(Arc<K>, Arc<ControllerContext>) -> Fut,
    Fut: Future<Output = Result<Action, ActionError>> + Send + 'static,
{
    let kind = K::kind(&()).into_owned();
    let shutdown = ctx.shutdown.clone();
    info!(kind = %kind, "Starting controller watch loop");

    let stream = Controller::new(api, watcher::Config::default())
        .run(reconcile, error_policy::<K>, ctx)
        .for_each(|res| {
            let kind = kind.as_str();
            match res {
                Ok((obj, action)) => debug!(kind, resource = %obj, ?action, "Reconciled"),
                Err(e) => warn!(kind, error = %e, "Controller stream error"),
            }
            futures::future::ready(())
        });

    tokio::select! {
        () = stream => warn!(kind = %kind, "Controller watch loop ended"),
        () = shutdown.cancelled() => info!(kind = %kind, "Controller watch loop stopped"),
    }
}

/// Watch loops of every controller, running until shutdown
///
/// The cleanup controller only runs when provider adapters are registered.
pub async fn run_watch_loops(client: Client, ctx: Arc<ControllerContext>) {
    let networks = run_controller(
        Api::<Network>::all(client.clone()),
        controller::network::reconcile,
        Arc::clone(&ctx),
    );
    let ranges = run_controller(
        Api::<IpRange>::all(client.clone()),
        controller::iprange::reconcile,
        Arc::clone(&ctx),
    );

    if ctx.adapters.is_empty() {
        info!("No provider adapters registered, cleanup controller disabled");
        tokio::join!(networks, ranges);
    } else {
        let nukes = run_controller(Api::<Nuke>::all(client), controller::nuke::reconcile, Arc::clone(&ctx));
        tokio::join!(networks, ranges, nukes);
    }
}
