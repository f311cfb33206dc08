//! # IpRange
//!
//! An address range reserved inside a network (subnet, PSA range).

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::{impl_obj_with_conditions, Condition, ObjectReference};

#[derive(CustomResource, Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
#[kube(
    kind = "IpRange",
    group = "cloud-control.microscaler.io",
    version = "v1beta1",
    namespaced,
    status = "IpRangeStatus",
    shortname = "ipr",
    printcolumn = r#"{"name":"CIDR", "type":"string", "jsonPath":".spec.cidr"}, {"name":"Ready", "type":"string", "jsonPath":".status.conditions[?(@.type==\"Ready\")].status"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct IpRangeSpec {
    /// Network the range is reserved in
    #[serde(default)]
    pub network: Option<ObjectReference>,
    pub cidr: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct IpRangeStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub observed_generation: Option<i64>,
    /// CIDR actually reserved on the provider
    #[serde(default)]
    pub cidr: Option<String>,
}

impl_obj_with_conditions!(IpRange);
