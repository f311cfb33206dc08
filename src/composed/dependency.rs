//! # Dependency Loading
//!
//! One reusable action for "this object needs another object to exist and be Ready
//! before reconciliation can go on". Each relationship is a `DependencyLink`: how to
//! find the dependency's name on the state, and where to put the loaded object.
//!
//! | Dependency | Outcome |
//! |---|---|
//! | reference not set | Ready=False/InvalidDependency, `StopAndForget` |
//! | get failed | log, `StopWithRequeue` |
//! | not found | Ready=False/InvalidDependency, requeue after slow backoff |
//! | Ready missing or Unknown | requeue after medium backoff, status untouched |
//! | Ready=False | Ready=False/InvalidDependency, requeue after slow backoff |
//! | Ready=True, or no conditions at all | store on state, `Continue` |

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use kube::Resource;
use tracing::{error, info};

use super::{Action, ActionContext, ActionError, ControlResult, ObjectState, UpdateStatus};
use crate::crd::{
    find_status_condition, Condition, ConditionStatus, ObjectReference, CONDITION_TYPE_READY, LIFECYCLE,
    REASON_INVALID_DEPENDENCY,
};
use crate::rate::BackoffPolicies;
use crate::store::{ClusterObject, ObjectKey, StoreError};

/// Name (and optional namespace) of a dependency
///
/// Without a namespace the dependent's own namespace is used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyRef {
    pub name: String,
    pub namespace: Option<String>,
}

impl DependencyRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: None,
        }
    }
}

impl From<&ObjectReference> for DependencyRef {
    fn from(reference: &ObjectReference) -> Self {
        Self {
            name: reference.name.clone(),
            namespace: reference.namespace.clone(),
        }
    }
}

/// One row of the dependency table: dependent state `S` needs an object of kind `D`
pub struct DependencyLink<S, D> {
    /// Reads the dependency's name off the state; `None` when it is not set
    pub name_of: fn(&S) -> Option<DependencyRef>,
    /// Stores the loaded dependency on the state
    pub store: fn(&mut S, D),
}

impl<S, D> Clone for DependencyLink<S, D> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S, D> Copy for DependencyLink<S, D> {}

impl<S, D: Resource<DynamicType = ()>> fmt::Debug for DependencyLink<S, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DependencyLink")
            .field("kind", &D::kind(&()))
            .finish_non_exhaustive()
    }
}

enum Readiness {
    Ready,
    Pending,
    NotReady,
}

fn readiness<D: ClusterObject>(dependency: &D) -> Readiness {
    let Some(conditions) = dependency.status_conditions() else {
        return Readiness::Ready;
    };
    match find_status_condition(conditions, CONDITION_TYPE_READY).map(|c| c.status) {
        Some(ConditionStatus::True) => Readiness::Ready,
        Some(ConditionStatus::False) => Readiness::NotReady,
        Some(ConditionStatus::Unknown) | None => Readiness::Pending,
    }
}

/// Loads the dependency described by a link and gates the pipeline on its readiness
pub struct LoadDependency<S, D> {
    link: DependencyLink<S, D>,
    policies: Arc<BackoffPolicies>,
}

impl<S, D: Resource<DynamicType = ()>> fmt::Debug for LoadDependency<S, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadDependency")
            .field("link", &self.link)
            .finish_non_exhaustive()
    }
}

impl<S, D> LoadDependency<S, D> {
    pub fn new(link: DependencyLink<S, D>, policies: Arc<BackoffPolicies>) -> Self {
        Self { link, policies }
    }
}

/// Ready=False/InvalidDependency on the dependent, then `result` once written
async fn invalid_dependency<S: ObjectState>(
    ctx: &ActionContext,
    state: &mut S,
    message: String,
    result: ControlResult,
) -> ControlResult {
    UpdateStatus::for_state(&*state)
        .set_exclusive_conditions(
            LIFECYCLE,
            [Condition::new(
                CONDITION_TYPE_READY,
                ConditionStatus::False,
                REASON_INVALID_DEPENDENCY,
                message,
            )],
        )
        .error_log_message("Error patching status with invalid dependency condition")
        .success_result(result)
        .run(ctx, state)
        .await
}

#[async_trait]
impl<S, D> Action<S> for LoadDependency<S, D>
where
    S: ObjectState,
    D: ClusterObject,
{
    async fn run(&self, ctx: &mut ActionContext, state: &mut S) -> ControlResult {
        let kind = D::kind(&()).into_owned();

        let Some(reference) = (self.link.name_of)(state) else {
            info!(parent: ctx.span(), dependency_kind = %kind, "Dependency reference is not set");
            return invalid_dependency(
                ctx,
                state,
                format!("{kind} reference is not set"),
                ControlResult::StopAndForget,
            )
            .await;
        };

        let namespace = reference.namespace.clone().or_else(|| state.namespace());
        let name = reference.name;
        let key = ObjectKey::of::<D>(namespace.as_deref(), &name);
        let cluster = state.cluster().clone();

        let dependency = match cluster.get::<D>(ctx, namespace.as_deref(), &name).await {
            Ok(dependency) => dependency,
            Err(StoreError::Cancelled) => return ControlResult::Fail(ActionError::Cancelled),
            Err(err) => {
                error!(
                    parent: ctx.span(),
                    error = %err,
                    dependency_kind = %kind,
                    dependency = %name,
                    "Error loading dependency"
                );
                return ControlResult::StopWithRequeue;
            }
        };

        let Some(dependency) = dependency else {
            let delay = self.policies.slow().when(&key);
            info!(
                parent: ctx.span(),
                dependency_kind = %kind,
                dependency = %name,
                requeue_after = ?delay,
                "Dependency does not exist"
            );
            return invalid_dependency(
                ctx,
                state,
                format!("{kind} {name} does not exist"),
                ControlResult::StopWithRequeueDelay(delay),
            )
            .await;
        };

        match readiness(&dependency) {
            Readiness::Ready => {}
            Readiness::Pending => {
                let delay = self.policies.medium().when(&key);
                info!(
                    parent: ctx.span(),
                    dependency_kind = %kind,
                    dependency = %name,
                    requeue_after = ?delay,
                    "Dependency is not ready yet"
                );
                return ControlResult::StopWithRequeueDelay(delay);
            }
            Readiness::NotReady => {
                let delay = self.policies.slow().when(&key);
                info!(
                    parent: ctx.span(),
                    dependency_kind = %kind,
                    dependency = %name,
                    requeue_after = ?delay,
                    "Dependency is not ready"
                );
                return invalid_dependency(
                    ctx,
                    state,
                    format!("{kind} {name} is not ready"),
                    ControlResult::StopWithRequeueDelay(delay),
                )
                .await;
            }
        }

        self.policies.medium().forget(&key);
        self.policies.slow().forget(&key);
        (self.link.store)(state, dependency);
        ControlResult::Continue
    }

    fn name(&self) -> Cow<'static, str> {
        Cow::Owned(format!("Load{}", D::kind(&())))
    }
}
