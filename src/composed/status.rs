//! # Status Patch Builder
//!
//! Declares a status mutation plus the control signal to produce on success and on
//! failure, then performs exactly one status write.
//!
//! ```rust,ignore
//! UpdateStatus::for_state(&*state)
//!     .set_exclusive_conditions(LIFECYCLE, [ready_condition])
//!     .error_log_message("Error patching Network status with Ready condition")
//!     .success_continue()
//!     .run(ctx, state)
//!     .await
//! ```
//!
//! The builder never retries. A failed write (conflict, API error) becomes a control
//! signal, `StopWithRequeue` unless declared otherwise, so the scheduler restarts
//! the pipeline against fresh state.

use std::fmt;

use kube::Resource;
use tracing::{error, info};

use super::{ActionContext, ActionError, ControlResult, ObjectState};
use crate::crd::{remove_status_condition, set_status_condition, Condition, ConditionGroup, ObjWithConditions};
use crate::store::StoreError;

type StatusOp<K> = Box<dyn FnOnce(&mut K) + Send>;
type SuccessCallback = Box<dyn FnOnce(&ActionContext) -> ControlResult + Send>;
type FailureCallback = Box<dyn FnOnce(&ActionContext, &StoreError) -> ControlResult + Send>;

enum OnSuccess {
    Result(ControlResult),
    Callback(SuccessCallback),
}

enum OnFailure {
    Result(ControlResult),
    Callback(FailureCallback),
}

const DEFAULT_ERROR_LOG: &str = "Error updating status";

/// Builder for one status write against the state's object
pub struct UpdateStatus<K> {
    ops: Vec<StatusOp<K>>,
    skip_unchanged: bool,
    on_success: OnSuccess,
    on_failure: Option<OnFailure>,
    success_log: Option<String>,
    status_changed_log: Option<String>,
    error_log: Option<String>,
}

impl<K> fmt::Debug for UpdateStatus<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdateStatus")
            .field("ops", &self.ops.len())
            .field("skip_unchanged", &self.skip_unchanged)
            .finish_non_exhaustive()
    }
}

impl<K: ObjWithConditions> Default for UpdateStatus<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: ObjWithConditions> UpdateStatus<K> {
    pub fn new() -> Self {
        Self {
            ops: Vec::new(),
            skip_unchanged: false,
            on_success: OnSuccess::Result(ControlResult::StopAndForget),
            on_failure: None,
            success_log: None,
            status_changed_log: None,
            error_log: None,
        }
    }

    /// Builder typed after the state's object
    pub fn for_state<S: ObjectState<Obj = K>>(_state: &S) -> Self {
        Self::new()
    }

    /// Arbitrary change to the in-memory copy before the write
    pub fn mutate_status(mut self, f: impl FnOnce(&mut K) + Send + 'static) -> Self {
        self.ops.push(Box::new(f));
        self
    }

    /// Upsert one condition by type
    pub fn set_condition(self, condition: Condition) -> Self {
        self.mutate_status(move |obj| {
            write_condition(obj, condition);
        })
    }

    /// Upsert the conditions and drop every other condition of `group`
    pub fn set_exclusive_conditions(
        self,
        group: ConditionGroup,
        conditions: impl IntoIterator<Item = Condition>,
    ) -> Self {
        let conditions: Vec<Condition> = conditions.into_iter().collect();
        self.mutate_status(move |obj| {
            let kept: Vec<String> = conditions.iter().map(|c| c.r#type.clone()).collect();
            for condition in conditions {
                write_condition(obj, condition);
            }
            obj.conditions_mut()
                .retain(|c| !group.contains(&c.r#type) || kept.contains(&c.r#type));
        })
    }

    pub fn remove_conditions(self, condition_types: &[&str]) -> Self {
        let types = owned(condition_types);
        self.mutate_status(move |obj| {
            for condition_type in &types {
                remove_status_condition(obj.conditions_mut(), condition_type);
            }
        })
    }

    /// Drop every condition whose type is not listed
    pub fn keep_conditions(self, condition_types: &[&str]) -> Self {
        let types = owned(condition_types);
        self.mutate_status(move |obj| {
            obj.conditions_mut().retain(|c| types.contains(&c.r#type));
        })
    }

    /// Drop the condition of `condition_type` only when its reason matches
    pub fn remove_condition_if_reason_matched(self, condition_type: &str, reason: &str) -> Self {
        let condition_type = condition_type.to_string();
        let reason = reason.to_string();
        self.mutate_status(move |obj| {
            obj.conditions_mut()
                .retain(|c| c.r#type != condition_type || c.reason != reason);
        })
    }

    /// Skip the write when the mutations leave the object unchanged
    pub fn skip_unchanged(mut self) -> Self {
        self.skip_unchanged = true;
        self
    }

    /// Result returned after a successful write; `StopAndForget` by default
    pub fn success_result(mut self, result: ControlResult) -> Self {
        self.on_success = OnSuccess::Result(result);
        self
    }

    /// Continue the pipeline after a successful write
    pub fn success_continue(self) -> Self {
        self.success_result(ControlResult::Continue)
    }

    pub fn on_success(mut self, f: impl FnOnce(&ActionContext) -> ControlResult + Send + 'static) -> Self {
        self.on_success = OnSuccess::Callback(Box::new(f));
        self
    }

    pub fn success_log_message(mut self, message: impl Into<String>) -> Self {
        self.success_log = Some(message.into());
        self
    }

    /// Logged only when the server actually stored a new status
    pub fn status_changed_log_message(mut self, message: impl Into<String>) -> Self {
        self.status_changed_log = Some(message.into());
        self
    }

    /// Result returned after a failed write; `StopWithRequeue` by default
    pub fn failed_result(mut self, result: ControlResult) -> Self {
        self.on_failure = Some(OnFailure::Result(result));
        self
    }

    pub fn on_failure(
        mut self,
        f: impl FnOnce(&ActionContext, &StoreError) -> ControlResult + Send + 'static,
    ) -> Self {
        self.on_failure = Some(OnFailure::Callback(Box::new(f)));
        self
    }

    pub fn error_log_message(mut self, message: impl Into<String>) -> Self {
        self.error_log = Some(message.into());
        self
    }

    /// Apply the mutations and write the status
    ///
    /// On success the state's object is replaced with the stored copy.
    pub async fn run<S: ObjectState<Obj = K>>(self, ctx: &ActionContext, state: &mut S) -> ControlResult {
        let mut obj = state.obj().clone();
        for op in self.ops {
            op(&mut obj);
        }
        let generation = obj.meta().generation;
        obj.set_observed_generation(generation);

        if self.skip_unchanged && unchanged(state.obj(), &obj) {
            return finish_success(ctx, self.on_success);
        }

        let previous_version = state.obj().meta().resource_version.clone();
        let cluster = state.cluster().clone();
        match cluster.update_status(ctx, &obj).await {
            Ok(updated) => {
                let changed = updated.meta().resource_version != previous_version;
                state.set_obj(updated);
                if let Some(message) = &self.success_log {
                    info!(parent: ctx.span(), "{}", message);
                }
                if changed {
                    if let Some(message) = &self.status_changed_log {
                        info!(parent: ctx.span(), "{}", message);
                    }
                }
                finish_success(ctx, self.on_success)
            }
            Err(StoreError::Cancelled) => ControlResult::Fail(ActionError::Cancelled),
            Err(err) => {
                let message = self.error_log.as_deref().unwrap_or(DEFAULT_ERROR_LOG);
                error!(parent: ctx.span(), error = %err, "{}", message);
                match self.on_failure {
                    Some(OnFailure::Result(result)) => result,
                    Some(OnFailure::Callback(f)) => f(ctx, &err),
                    None => ControlResult::StopWithRequeue,
                }
            }
        }
    }
}

fn finish_success(ctx: &ActionContext, on_success: OnSuccess) -> ControlResult {
    match on_success {
        OnSuccess::Result(result) => result,
        OnSuccess::Callback(f) => f(ctx),
    }
}

/// Upsert stamped with the object's current generation
fn write_condition<K: ObjWithConditions>(obj: &mut K, mut condition: Condition) {
    condition.observed_generation = obj.meta().generation;
    set_status_condition(obj.conditions_mut(), condition);
}

fn unchanged<K: ObjWithConditions>(before: &K, after: &K) -> bool {
    match (serde_json::to_value(before), serde_json::to_value(after)) {
        (Ok(before), Ok(after)) => before.get("status") == after.get("status"),
        _ => false,
    }
}

fn owned(types: &[&str]) -> Vec<String> {
    types.iter().map(|t| (*t).to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::composed::BaseState;
    use crate::crd::{
        find_status_condition, ConditionStatus, Network, NetworkSpec, NetworkStatus, CONDITION_TYPE_ERROR,
        CONDITION_TYPE_READY, CONDITION_TYPE_UPDATING, LIFECYCLE,
    };
    use crate::store::MemoryStore;
    use std::sync::Arc;

    fn cond(condition_type: &str, status: ConditionStatus, reason: &str) -> Condition {
        Condition::new(condition_type, status, reason, "")
    }

    fn seeded(conditions: Vec<Condition>) -> (Arc<MemoryStore>, BaseState<Network>) {
        let store = Arc::new(MemoryStore::new());
        let mut net = Network::new("net-1", NetworkSpec::default());
        net.metadata.namespace = Some("default".to_string());
        net.metadata.generation = Some(3);
        net.status = Some(NetworkStatus {
            conditions,
            observed_generation: Some(2),
        });
        let net = store.insert(&net).unwrap();
        let state = BaseState::new(store.cluster(), net);
        (store, state)
    }

    #[tokio::test]
    async fn test_set_condition_stamps_generation() {
        let (store, mut state) = seeded(vec![]);
        let ctx = ActionContext::background();

        let result = UpdateStatus::for_state(&state)
            .set_condition(cond(CONDITION_TYPE_READY, ConditionStatus::True, "Ready"))
            .run(&ctx, &mut state)
            .await;

        assert!(matches!(result, ControlResult::StopAndForget));
        let stored: Network = store.get_object(Some("default"), "net-1").unwrap();
        let ready = find_status_condition(stored.conditions(), CONDITION_TYPE_READY).unwrap();
        assert_eq!(ready.observed_generation, Some(3));
        assert_eq!(stored.observed_generation(), Some(3));
        assert_eq!(state.obj().observed_generation(), Some(3));
    }

    #[tokio::test]
    async fn test_remove_condition_if_reason_matched() {
        let (_store, mut state) = seeded(vec![
            cond(CONDITION_TYPE_READY, ConditionStatus::False, "InvalidDependency"),
            cond(CONDITION_TYPE_ERROR, ConditionStatus::True, "ProviderError"),
        ]);
        let ctx = ActionContext::background();

        let _ = UpdateStatus::for_state(&state)
            .remove_condition_if_reason_matched(CONDITION_TYPE_READY, "InvalidDependency")
            .remove_condition_if_reason_matched(CONDITION_TYPE_ERROR, "Other")
            .run(&ctx, &mut state)
            .await;

        let types: Vec<&str> = state.obj().conditions().iter().map(|c| c.r#type.as_str()).collect();
        assert_eq!(types, vec![CONDITION_TYPE_ERROR]);
    }

    #[tokio::test]
    async fn test_keep_conditions() {
        let (_store, mut state) = seeded(vec![
            cond(CONDITION_TYPE_READY, ConditionStatus::True, "Ready"),
            cond(CONDITION_TYPE_UPDATING, ConditionStatus::True, "Processing"),
            cond("Custom", ConditionStatus::True, "Custom"),
        ]);
        let ctx = ActionContext::background();

        let _ = UpdateStatus::for_state(&state)
            .keep_conditions(&[CONDITION_TYPE_READY])
            .run(&ctx, &mut state)
            .await;

        assert_eq!(state.obj().conditions().len(), 1);
        assert_eq!(state.obj().conditions()[0].r#type, CONDITION_TYPE_READY);
    }

    #[tokio::test]
    async fn test_exclusive_conditions_leave_other_groups_alone() {
        let (_store, mut state) = seeded(vec![
            cond(CONDITION_TYPE_READY, ConditionStatus::True, "Ready"),
            cond("Custom", ConditionStatus::True, "Custom"),
        ]);
        let ctx = ActionContext::background();

        let _ = UpdateStatus::for_state(&state)
            .set_exclusive_conditions(LIFECYCLE, [cond(CONDITION_TYPE_UPDATING, ConditionStatus::True, "Processing")])
            .run(&ctx, &mut state)
            .await;

        let mut types: Vec<&str> = state.obj().conditions().iter().map(|c| c.r#type.as_str()).collect();
        types.sort_unstable();
        assert_eq!(types, vec!["Custom", CONDITION_TYPE_UPDATING]);
    }

    #[tokio::test]
    async fn test_failure_defaults_to_requeue() {
        let (store, mut state) = seeded(vec![]);
        let ctx = ActionContext::background();
        store.fail_next_status_update(409);

        let result = UpdateStatus::for_state(&state)
            .set_condition(cond(CONDITION_TYPE_READY, ConditionStatus::True, "Ready"))
            .run(&ctx, &mut state)
            .await;

        assert!(matches!(result, ControlResult::StopWithRequeue));
        assert_eq!(store.status_update_count(), 1);
        assert!(state.obj().conditions().is_empty());
    }

    #[tokio::test]
    async fn test_failure_callback_sees_error() {
        let (store, mut state) = seeded(vec![]);
        let ctx = ActionContext::background();
        store.fail_next_status_update(500);

        let result = UpdateStatus::for_state(&state)
            .on_failure(|_, err| {
                assert!(matches!(err, StoreError::Api { code: 500, .. }));
                ControlResult::StopAndForget
            })
            .run(&ctx, &mut state)
            .await;

        assert!(matches!(result, ControlResult::StopAndForget));
    }

    #[tokio::test]
    async fn test_exactly_one_write_unless_skipping() {
        let (store, mut state) = seeded(vec![cond(CONDITION_TYPE_READY, ConditionStatus::True, "Ready")]);
        let ctx = ActionContext::background();

        let _ = UpdateStatus::for_state(&state).run(&ctx, &mut state).await;
        assert_eq!(store.status_update_count(), 1);

        let result = UpdateStatus::for_state(&state)
            .skip_unchanged()
            .success_continue()
            .run(&ctx, &mut state)
            .await;
        assert!(result.is_continue());
        assert_eq!(store.status_update_count(), 1);
    }

    #[tokio::test]
    async fn test_on_success_callback() {
        let (_store, mut state) = seeded(vec![]);
        let ctx = ActionContext::background();

        let result = UpdateStatus::for_state(&state)
            .set_condition(cond(CONDITION_TYPE_READY, ConditionStatus::True, "Ready"))
            .on_success(|_| ControlResult::StopWithRequeue)
            .run(&ctx, &mut state)
            .await;

        assert!(matches!(result, ControlResult::StopWithRequeue));
    }
}
