//! # Custom Resource Definitions
//!
//! CRD types reconciled by the controller.
//!
//! The kinds form a small dependency chain: an `IpRange` lives in a `Network`, and a
//! `Network` belongs to a `Subscription` (cloud account). `Nuke` drives the cleanup
//! of orphaned provider resources for a subscription.

/// Implements `ClusterObject` and `ObjWithConditions` for a kind whose status has
/// `conditions` and `observed_generation` fields.
macro_rules! impl_obj_with_conditions {
    ($kind:ty) => {
        impl $crate::store::ClusterObject for $kind {
            fn status_conditions(&self) -> Option<&[$crate::crd::Condition]> {
                Some($crate::crd::ObjWithConditions::conditions(self))
            }
        }

        impl $crate::crd::ObjWithConditions for $kind {
            fn conditions(&self) -> &[$crate::crd::Condition] {
                self.status
                    .as_ref()
                    .map(|s| s.conditions.as_slice())
                    .unwrap_or_default()
            }

            fn conditions_mut(&mut self) -> &mut Vec<$crate::crd::Condition> {
                &mut self.status.get_or_insert_with(Default::default).conditions
            }

            fn observed_generation(&self) -> Option<i64> {
                self.status.as_ref().and_then(|s| s.observed_generation)
            }

            fn set_observed_generation(&mut self, generation: Option<i64>) {
                self.status
                    .get_or_insert_with(Default::default)
                    .observed_generation = generation;
            }
        }
    };
}

pub(crate) use impl_obj_with_conditions;

mod iprange;
mod network;
mod nuke;
mod status;
mod subscription;

pub use iprange::{IpRange, IpRangeSpec, IpRangeStatus};
pub use network::{Network, NetworkSpec, NetworkStatus};
pub use nuke::{
    Nuke, NukeResourceStatus, NukeSpec, NukeStatus, NukeStatusKind, ResourceType,
    NUKE_STATE_COMPLETED, NUKE_STATE_PROCESSING,
};
pub use status::*;
pub use subscription::{ProviderType, Subscription, SubscriptionSpec, SubscriptionStatus};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// API group shared by every kind in this crate
pub const API_GROUP: &str = "cloud-control.microscaler.io";

/// Finalizer held by the controllers until their deletion flow has run
pub const FINALIZER: &str = "cloud-control.microscaler.io/deletion-hook";

/// Reference to another object in the cluster
///
/// When `namespace` is empty the referencing object's namespace is used.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ObjectReference {
    pub name: String,
    #[serde(default)]
    pub namespace: Option<String>,
}

impl ObjectReference {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: None,
        }
    }
}
