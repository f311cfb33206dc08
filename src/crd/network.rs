//! # Network
//!
//! A VPC / VNet provisioned inside a subscription.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::{impl_obj_with_conditions, Condition, ObjectReference};

#[derive(CustomResource, Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
#[kube(
    kind = "Network",
    group = "cloud-control.microscaler.io",
    version = "v1beta1",
    namespaced,
    status = "NetworkStatus",
    shortname = "net",
    printcolumn = r#"{"name":"Subscription", "type":"string", "jsonPath":".spec.subscription.name"}, {"name":"Ready", "type":"string", "jsonPath":".status.conditions[?(@.type==\"Ready\")].status"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct NetworkSpec {
    /// Subscription the network is created in
    #[serde(default)]
    pub subscription: Option<ObjectReference>,
    /// Network name on the provider side
    #[serde(default)]
    pub network_name: Option<String>,
    /// Primary address range
    #[serde(default)]
    pub cidr: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NetworkStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub observed_generation: Option<i64>,
}

impl_obj_with_conditions!(Network);
