//! # Nuke
//!
//! Cleanup request for every orphaned provider resource of a subscription.
//! The status keeps, per resource kind, the lifecycle of each discovered object.

use std::collections::BTreeMap;

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::{impl_obj_with_conditions, Condition};

pub const NUKE_STATE_PROCESSING: &str = "Processing";
pub const NUKE_STATE_COMPLETED: &str = "Completed";

#[derive(CustomResource, Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[kube(
    kind = "Nuke",
    group = "cloud-control.microscaler.io",
    version = "v1beta1",
    namespaced,
    status = "NukeStatus",
    printcolumn = r#"{"name":"State", "type":"string", "jsonPath":".status.state"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct NukeSpec {
    /// Name of the subscription whose resources are removed
    pub subscription: String,
}

/// Lifecycle of one discovered object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub enum NukeResourceStatus {
    Discovered,
    Deleting,
    Deleted,
}

/// Where the tracked resources live
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub enum ResourceType {
    /// Objects in the control plane
    #[default]
    #[serde(rename = "KCP")]
    Kcp,
    /// Resources on the cloud provider
    Provider,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NukeStatusKind {
    pub kind: String,
    #[serde(default)]
    pub resource_type: ResourceType,
    #[serde(default)]
    pub objects: BTreeMap<String, NukeResourceStatus>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NukeStatus {
    /// Processing or Completed
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub observed_generation: Option<i64>,
    /// First time resources were discovered (RFC3339)
    #[serde(default)]
    pub initialized_on: Option<String>,
    #[serde(default)]
    pub resources: Vec<NukeStatusKind>,
}

impl NukeStatus {
    pub fn kind(&self, kind: &str) -> Option<&NukeStatusKind> {
        self.resources.iter().find(|r| r.kind == kind)
    }

    /// Return the entry for `kind`, creating it when missing
    pub fn kind_mut(&mut self, kind: &str, resource_type: ResourceType) -> &mut NukeStatusKind {
        let idx = match self.resources.iter().position(|r| r.kind == kind) {
            Some(idx) => idx,
            None => {
                self.resources.push(NukeStatusKind {
                    kind: kind.to_string(),
                    resource_type,
                    objects: BTreeMap::new(),
                });
                self.resources.len() - 1
            }
        };
        &mut self.resources[idx]
    }
}

impl_obj_with_conditions!(Nuke);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mut_creates_once() {
        let mut status = NukeStatus::default();
        status
            .kind_mut("Backup", ResourceType::Provider)
            .objects
            .insert("b-1".to_string(), NukeResourceStatus::Discovered);
        status.kind_mut("Backup", ResourceType::Provider);

        assert_eq!(status.resources.len(), 1);
        assert_eq!(
            status.kind("Backup").map(|k| k.objects.len()),
            Some(1)
        );
    }

    #[test]
    fn test_resource_type_wire_format() {
        assert_eq!(serde_json::to_value(ResourceType::Kcp).unwrap(), "KCP");
        assert_eq!(
            serde_json::to_value(ResourceType::Provider).unwrap(),
            "Provider"
        );
    }
}
