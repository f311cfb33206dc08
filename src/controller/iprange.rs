//! # IpRange Controller
//!
//! An IpRange needs its Network Ready, and the Subscription that Network lives in
//! Ready as well. The Subscription reference is read off the loaded Network.

use std::sync::Arc;

use kube_runtime::controller::Action;

use super::{run_pipeline, ControllerContext, MarkReady};
use crate::composed::{
    predicates, ActionError, AddFinalizer, BaseState, DependencyLink, DependencyRef, If, LoadDependency, ObjectState,
    RemoveFinalizer, Sequence, StopAndForgetAction,
};
use crate::constants::CONTROLLER_IPRANGE;
use crate::crd::{IpRange, Network, Subscription, FINALIZER};
use crate::rate::BackoffPolicies;
use crate::store::Cluster;

/// State of one IpRange reconciliation
#[derive(Debug)]
pub struct IpRangeState {
    base: BaseState<IpRange>,
    pub network: Option<Network>,
    pub subscription: Option<Subscription>,
}

impl IpRangeState {
    pub fn new(cluster: Cluster, range: IpRange) -> Self {
        Self {
            base: BaseState::new(cluster, range),
            network: None,
            subscription: None,
        }
    }
}

impl ObjectState for IpRangeState {
    type Obj = IpRange;

    fn cluster(&self) -> &Cluster {
        self.base.cluster()
    }

    fn obj(&self) -> &IpRange {
        self.base.obj()
    }

    fn set_obj(&mut self, obj: IpRange) {
        self.base.set_obj(obj);
    }
}

/// IpRange → Network, through `spec.network`
pub const NETWORK: DependencyLink<IpRangeState, Network> = DependencyLink {
    name_of: |state| state.obj().spec.network.as_ref().map(DependencyRef::from),
    store: |state, network| state.network = Some(network),
};

/// IpRange → Subscription, through the loaded Network's `spec.subscription`
///
/// The Network's namespace is used when its reference carries none.
pub const SUBSCRIPTION: DependencyLink<IpRangeState, Subscription> = DependencyLink {
    name_of: |state| {
        let network = state.network.as_ref()?;
        let reference = network.spec.subscription.as_ref()?;
        let mut dependency = DependencyRef::from(reference);
        if dependency.namespace.is_none() {
            dependency.namespace = network.metadata.namespace.clone();
        }
        Some(dependency)
    },
    store: |state, subscription| state.subscription = Some(subscription),
};

pub fn iprange_pipeline(policies: Arc<BackoffPolicies>) -> Sequence<IpRangeState> {
    Sequence::new("iprange")
        .step(If::new(
            predicates::marked_for_deletion::<IpRangeState>,
            Sequence::new("iprange-delete")
                .step(RemoveFinalizer::new(FINALIZER))
                .step(StopAndForgetAction),
        ))
        .step(AddFinalizer::new(FINALIZER))
        .step(LoadDependency::new(NETWORK, Arc::clone(&policies)))
        .step(LoadDependency::new(SUBSCRIPTION, policies))
        .step(MarkReady::new("IpRange is ready"))
}

/// Reconcile entry point for `kube_runtime::Controller`
pub async fn reconcile(range: Arc<IpRange>, ctx: Arc<ControllerContext>) -> Result<Action, ActionError> {
    let pipeline = iprange_pipeline(Arc::clone(&ctx.policies));
    let state = IpRangeState::new(ctx.cluster.clone(), (*range).clone());
    run_pipeline(CONTROLLER_IPRANGE, &pipeline, state, &ctx).await
}
