//! # Finalizers and Annotations
//!
//! Idempotent metadata patches on the state's object. Each helper answers whether
//! it changed anything and makes no call when the object is already as wanted.
//! On a write the state's object is replaced with the patched copy.

use async_trait::async_trait;
use kube::{Resource, ResourceExt};
use serde_json::{json, Map, Value};
use tracing::info;

use super::{Action, ActionContext, ActionError, ControlResult, ObjectState};
use crate::store::{ObjectPatch, StoreError};

/// Add `finalizer` with a merge patch
///
/// The patch carries the full finalizer list and the object's resourceVersion,
/// so a concurrent change to the list fails with a conflict instead of being lost.
pub async fn patch_add_finalizer<S: ObjectState>(
    ctx: &ActionContext,
    state: &mut S,
    finalizer: &str,
) -> Result<bool, StoreError> {
    let mut finalizers = state.obj().finalizers().to_vec();
    if finalizers.iter().any(|f| f == finalizer) {
        return Ok(false);
    }
    finalizers.push(finalizer.to_string());

    let mut metadata = Map::new();
    metadata.insert("finalizers".to_string(), json!(finalizers));
    if let Some(rv) = &state.obj().meta().resource_version {
        metadata.insert("resourceVersion".to_string(), Value::String(rv.clone()));
    }
    let patch = ObjectPatch::Merge(json!({ "metadata": metadata }));
    patch_state(ctx, state, &patch).await?;
    Ok(true)
}

/// Remove `finalizer` with a JSON patch
///
/// The removal is guarded by a `test` of the entry at the same index.
pub async fn patch_remove_finalizer<S: ObjectState>(
    ctx: &ActionContext,
    state: &mut S,
    finalizer: &str,
) -> Result<bool, StoreError> {
    let Some(idx) = state.obj().finalizers().iter().position(|f| f == finalizer) else {
        return Ok(false);
    };
    let path = format!("/metadata/finalizers/{idx}");
    let ops: json_patch::Patch = serde_json::from_value(json!([
        { "op": "test", "path": path, "value": finalizer },
        { "op": "remove", "path": path },
    ]))?;
    patch_state(ctx, state, &ObjectPatch::Json(ops)).await?;
    Ok(true)
}

/// Set annotation `key` to `value` with a merge patch
pub async fn patch_merge_annotation<S: ObjectState>(
    ctx: &ActionContext,
    state: &mut S,
    key: &str,
    value: &str,
) -> Result<bool, StoreError> {
    if state.obj().annotations().get(key).is_some_and(|v| v == value) {
        return Ok(false);
    }
    let mut annotations = Map::new();
    annotations.insert(key.to_string(), Value::String(value.to_string()));
    let patch = ObjectPatch::Merge(json!({ "metadata": { "annotations": annotations } }));
    patch_state(ctx, state, &patch).await?;
    Ok(true)
}

async fn patch_state<S: ObjectState>(
    ctx: &ActionContext,
    state: &mut S,
    patch: &ObjectPatch,
) -> Result<(), StoreError> {
    let namespace = state.namespace();
    let name = state.name();
    let cluster = state.cluster().clone();
    let patched = cluster
        .patch::<S::Obj>(ctx, namespace.as_deref(), &name, patch)
        .await?;
    state.set_obj(patched);
    Ok(())
}

fn patch_failed(ctx: &ActionContext, err: StoreError, message: &str) -> ControlResult {
    match err {
        StoreError::Cancelled => ControlResult::Fail(ActionError::Cancelled),
        err => ctx.log_error_and_return(&err, message, ControlResult::StopWithRequeue),
    }
}

/// Adds the finalizer to objects that are not being deleted
#[derive(Debug, Clone, Copy)]
pub struct AddFinalizer {
    finalizer: &'static str,
}

impl AddFinalizer {
    pub const fn new(finalizer: &'static str) -> Self {
        Self { finalizer }
    }
}

#[async_trait]
impl<S: ObjectState> Action<S> for AddFinalizer {
    async fn run(&self, ctx: &mut ActionContext, state: &mut S) -> ControlResult {
        if state.obj().meta().deletion_timestamp.is_some() {
            return ControlResult::Continue;
        }
        match patch_add_finalizer(ctx, state, self.finalizer).await {
            Ok(added) => {
                if added {
                    info!(parent: ctx.span(), finalizer = self.finalizer, "Finalizer added");
                }
                ControlResult::Continue
            }
            Err(err) => patch_failed(ctx, err, "Error adding finalizer"),
        }
    }
}

/// Removes the finalizer; the pipeline ends once it was removed
#[derive(Debug, Clone, Copy)]
pub struct RemoveFinalizer {
    finalizer: &'static str,
}

impl RemoveFinalizer {
    pub const fn new(finalizer: &'static str) -> Self {
        Self { finalizer }
    }
}

#[async_trait]
impl<S: ObjectState> Action<S> for RemoveFinalizer {
    async fn run(&self, ctx: &mut ActionContext, state: &mut S) -> ControlResult {
        match patch_remove_finalizer(ctx, state, self.finalizer).await {
            Ok(true) => {
                info!(parent: ctx.span(), finalizer = self.finalizer, "Finalizer removed");
                ControlResult::StopAndForget
            }
            Ok(false) => ControlResult::Continue,
            Err(err) => patch_failed(ctx, err, "Error removing finalizer"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::composed::BaseState;
    use crate::crd::{Network, NetworkSpec};
    use crate::store::{MemoryStore, ObjectKind, ObjectStore};
    use std::sync::Arc;

    const FINALIZER: &str = "cloud-control.microscaler.io/deletion-hook";

    fn seeded(finalizers: &[&str]) -> (Arc<MemoryStore>, BaseState<Network>) {
        let store = Arc::new(MemoryStore::new());
        let mut net = Network::new("net-1", NetworkSpec::default());
        net.metadata.namespace = Some("default".to_string());
        net.metadata.finalizers = Some(finalizers.iter().map(|f| (*f).to_string()).collect());
        let net = store.insert(&net).unwrap();
        let state = BaseState::new(store.cluster(), net);
        (store, state)
    }

    fn stored(store: &MemoryStore) -> Option<Network> {
        store.get_object(Some("default"), "net-1")
    }

    #[tokio::test]
    async fn test_add_finalizer_is_idempotent() {
        let (store, mut state) = seeded(&["other.io/keep"]);
        let ctx = ActionContext::background();

        assert!(patch_add_finalizer(&ctx, &mut state, FINALIZER).await.unwrap());
        let net = stored(&store).unwrap();
        assert_eq!(net.finalizers(), ["other.io/keep", FINALIZER]);
        assert_eq!(state.obj().finalizers(), net.finalizers());
        let version = net.metadata.resource_version.clone();

        assert!(!patch_add_finalizer(&ctx, &mut state, FINALIZER).await.unwrap());
        assert_eq!(stored(&store).unwrap().metadata.resource_version, version);
    }

    #[tokio::test]
    async fn test_add_finalizer_with_stale_object_conflicts() {
        let (store, mut state) = seeded(&[]);
        let ctx = ActionContext::background();
        let kind = ObjectKind::of::<Network>();
        store
            .patch(
                &kind,
                Some("default"),
                "net-1",
                &ObjectPatch::Merge(json!({"metadata": {"labels": {"team": "net"}}})),
            )
            .await
            .unwrap();

        let err = patch_add_finalizer(&ctx, &mut state, FINALIZER).await.unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn test_remove_finalizer_keeps_the_others() {
        let (store, mut state) = seeded(&["other.io/keep", FINALIZER]);
        let ctx = ActionContext::background();

        assert!(patch_remove_finalizer(&ctx, &mut state, FINALIZER).await.unwrap());
        assert_eq!(stored(&store).unwrap().finalizers(), ["other.io/keep"]);

        assert!(!patch_remove_finalizer(&ctx, &mut state, FINALIZER).await.unwrap());
    }

    #[tokio::test]
    async fn test_removing_last_finalizer_completes_deletion() {
        let (store, mut state) = seeded(&[FINALIZER]);
        let kind = ObjectKind::of::<Network>();

        store.delete(&kind, Some("default"), "net-1").await.unwrap();
        let deleting = stored(&store).unwrap();
        assert!(deleting.metadata.deletion_timestamp.is_some());
        state.set_obj(deleting);

        let result = RemoveFinalizer::new(FINALIZER).run(&mut ActionContext::background(), &mut state).await;
        assert!(matches!(result, ControlResult::StopAndForget));
        assert!(stored(&store).is_none());

        let result = RemoveFinalizer::new(FINALIZER).run(&mut ActionContext::background(), &mut state).await;
        assert!(result.is_continue());
    }

    #[tokio::test]
    async fn test_add_finalizer_action_skips_objects_being_deleted() {
        let (store, mut state) = seeded(&["other.io/keep"]);
        let kind = ObjectKind::of::<Network>();
        store.delete(&kind, Some("default"), "net-1").await.unwrap();
        state.set_obj(stored(&store).unwrap());

        let result = AddFinalizer::new(FINALIZER).run(&mut ActionContext::background(), &mut state).await;
        assert!(result.is_continue());
        assert_eq!(stored(&store).unwrap().finalizers(), ["other.io/keep"]);
    }

    #[tokio::test]
    async fn test_merge_annotation_only_writes_on_change() {
        let (store, mut state) = seeded(&[]);
        let ctx = ActionContext::background();

        assert!(patch_merge_annotation(&ctx, &mut state, "cloud-control.microscaler.io/owner", "team-a")
            .await
            .unwrap());
        let net = stored(&store).unwrap();
        assert_eq!(
            net.annotations().get("cloud-control.microscaler.io/owner").map(String::as_str),
            Some("team-a")
        );

        assert!(!patch_merge_annotation(&ctx, &mut state, "cloud-control.microscaler.io/owner", "team-a")
            .await
            .unwrap());
        assert_eq!(
            stored(&store).unwrap().metadata.resource_version,
            net.metadata.resource_version
        );
    }
}
