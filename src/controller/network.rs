//! # Network Controller
//!
//! A Network is reconciled once its Subscription exists and is Ready. It holds
//! the controller finalizer until its deletion has been handled.

use std::sync::Arc;

use kube_runtime::controller::Action;

use super::{run_pipeline, ControllerContext, MarkReady};
use crate::composed::{
    predicates, ActionError, AddFinalizer, BaseState, DependencyLink, DependencyRef, If, LoadDependency, ObjectState,
    RemoveFinalizer, Sequence, StopAndForgetAction,
};
use crate::constants::CONTROLLER_NETWORK;
use crate::crd::{Network, Subscription, FINALIZER};
use crate::rate::BackoffPolicies;
use crate::store::Cluster;

/// State of one Network reconciliation
#[derive(Debug)]
pub struct NetworkState {
    base: BaseState<Network>,
    pub subscription: Option<Subscription>,
}

impl NetworkState {
    pub fn new(cluster: Cluster, network: Network) -> Self {
        Self {
            base: BaseState::new(cluster, network),
            subscription: None,
        }
    }
}

impl ObjectState for NetworkState {
    type Obj = Network;

    fn cluster(&self) -> &Cluster {
        self.base.cluster()
    }

    fn obj(&self) -> &Network {
        self.base.obj()
    }

    fn set_obj(&mut self, obj: Network) {
        self.base.set_obj(obj);
    }
}

/// Network → Subscription, through `spec.subscription`
pub const SUBSCRIPTION: DependencyLink<NetworkState, Subscription> = DependencyLink {
    name_of: |state| state.obj().spec.subscription.as_ref().map(DependencyRef::from),
    store: |state, subscription| state.subscription = Some(subscription),
};

pub fn network_pipeline(policies: Arc<BackoffPolicies>) -> Sequence<NetworkState> {
    Sequence::new("network")
        .step(If::new(
            predicates::marked_for_deletion::<NetworkState>,
            Sequence::new("network-delete")
                .step(RemoveFinalizer::new(FINALIZER))
                .step(StopAndForgetAction),
        ))
        .step(AddFinalizer::new(FINALIZER))
        .step(LoadDependency::new(SUBSCRIPTION, policies))
        .step(MarkReady::new("Network is ready"))
}

/// Reconcile entry point for `kube_runtime::Controller`
pub async fn reconcile(network: Arc<Network>, ctx: Arc<ControllerContext>) -> Result<Action, ActionError> {
    let pipeline = network_pipeline(Arc::clone(&ctx.policies));
    let state = NetworkState::new(ctx.cluster.clone(), (*network).clone());
    run_pipeline(CONTROLLER_NETWORK, &pipeline, state, &ctx).await
}
