//! # Subscription
//!
//! A cloud account (AWS account, Azure subscription, GCP project, OpenStack domain)
//! that networks are provisioned in. Its Ready condition is owned by an external
//! credential-checking controller; this crate only reads it.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::{impl_obj_with_conditions, Condition};

#[derive(CustomResource, Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[kube(
    kind = "Subscription",
    group = "cloud-control.microscaler.io",
    version = "v1beta1",
    namespaced,
    status = "SubscriptionStatus",
    shortname = "sub",
    printcolumn = r#"{"name":"Provider", "type":"string", "jsonPath":".spec.provider"}, {"name":"Ready", "type":"string", "jsonPath":".status.conditions[?(@.type==\"Ready\")].status"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionSpec {
    pub provider: ProviderType,
    /// Provider account identifier (account id, subscription id, project id)
    pub account_id: String,
}

/// Cloud provider an account belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ProviderType {
    Aws,
    Azure,
    Gcp,
    Openstack,
}

impl std::fmt::Display for ProviderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ProviderType::Aws => "aws",
            ProviderType::Azure => "azure",
            ProviderType::Gcp => "gcp",
            ProviderType::Openstack => "openstack",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub observed_generation: Option<i64>,
}

impl_obj_with_conditions!(Subscription);
