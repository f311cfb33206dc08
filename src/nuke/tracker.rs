//! # Convergence Tracker
//!
//! Bookkeeping for "delete everything matching X" flows. Each pass lists the
//! provider resources of every kind, folds the listing into the Nuke status map,
//! and reports whether anything is left.

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use serde_json::Value;

use crate::crd::{NukeResourceStatus, NukeStatus, ProviderType, ResourceType};

/// One resource found on the provider
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderResourceObject {
    /// Provider-side identifier
    pub id: String,
    /// Raw provider description, passed back to `delete`
    pub payload: Value,
}

impl ProviderResourceObject {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            payload: Value::Null,
        }
    }
}

/// Snapshot of the resources of one kind seen in the latest listing
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderResourceKindState {
    pub kind: String,
    pub provider: ProviderType,
    pub objects: Vec<ProviderResourceObject>,
}

/// Provider-specific listing and deletion for one resource kind
#[async_trait]
pub trait ProviderResourceAdapter: Send + Sync {
    fn kind(&self) -> &str;

    fn provider(&self) -> ProviderType;

    /// Every resource of this kind that belongs to `subscription`
    async fn list(&self, subscription: &str) -> anyhow::Result<Vec<ProviderResourceObject>>;

    /// Start deleting one resource; completion is observed by a later `list`
    async fn delete(&self, object: &ProviderResourceObject) -> anyhow::Result<()>;
}

impl std::fmt::Debug for dyn ProviderResourceAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderResourceAdapter")
            .field("kind", &self.kind())
            .field("provider", &self.provider())
            .finish()
    }
}

/// Latest snapshot per kind plus the ordering constraints between kinds
#[derive(Debug, Clone, Default)]
pub struct ConvergenceTracker {
    snapshots: Vec<ProviderResourceKindState>,
    blocking_children: HashMap<String, Vec<String>>,
}

impl ConvergenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// `parent` must not be deleted while any `children` resource still exists
    pub fn with_blocking_children(mut self, parent: impl Into<String>, children: &[&str]) -> Self {
        self.blocking_children
            .entry(parent.into())
            .or_default()
            .extend(children.iter().map(|c| (*c).to_string()));
        self
    }

    /// Replace the snapshot of the snapshot's kind
    pub fn record(&mut self, snapshot: ProviderResourceKindState) {
        match self.snapshots.iter_mut().find(|s| s.kind == snapshot.kind) {
            Some(existing) => *existing = snapshot,
            None => self.snapshots.push(snapshot),
        }
    }

    pub fn snapshot(&self, kind: &str) -> Option<&ProviderResourceKindState> {
        self.snapshots.iter().find(|s| s.kind == kind)
    }

    pub fn snapshots(&self) -> &[ProviderResourceKindState] {
        &self.snapshots
    }

    /// Resources still present across all kinds
    pub fn pending(&self) -> usize {
        self.snapshots.iter().map(|s| s.objects.len()).sum()
    }

    /// Nothing left on the provider
    pub fn is_done(&self) -> bool {
        self.pending() == 0
    }

    /// Some child kind of `kind` still has resources
    pub fn has_blocking_children(&self, kind: &str) -> bool {
        self.blocking_children.get(kind).is_some_and(|children| {
            children
                .iter()
                .any(|child| self.snapshot(child).is_some_and(|s| !s.objects.is_empty()))
        })
    }

    /// Fold the latest snapshots into the status map
    ///
    /// Newly seen ids become `Discovered`; tracked ids missing from the listing become
    /// `Deleted`. Returns how many objects were newly marked deleted, per kind.
    pub fn converge(&self, status: &mut NukeStatus) -> Vec<(String, u64)> {
        let mut deleted = Vec::new();
        for snapshot in &self.snapshots {
            let present: BTreeSet<&str> = snapshot.objects.iter().map(|o| o.id.as_str()).collect();
            let entry = status.kind_mut(&snapshot.kind, ResourceType::Provider);

            let mut newly_deleted = 0;
            for (id, object_status) in &mut entry.objects {
                if !present.contains(id.as_str()) && *object_status != NukeResourceStatus::Deleted {
                    *object_status = NukeResourceStatus::Deleted;
                    newly_deleted += 1;
                }
            }
            for id in present {
                entry
                    .objects
                    .entry(id.to_string())
                    .and_modify(|s| {
                        if *s == NukeResourceStatus::Deleted {
                            *s = NukeResourceStatus::Discovered;
                        }
                    })
                    .or_insert(NukeResourceStatus::Discovered);
            }

            if newly_deleted > 0 {
                deleted.push((snapshot.kind.clone(), newly_deleted));
            }
        }
        deleted
    }
}
