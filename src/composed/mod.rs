//! # Composed Reconciliation
//!
//! A reconciler is a pipeline of small actions over a typed state. Actions answer
//! with a `ControlResult`; combinators glue them together; the handling bridge turns
//! the final result into the controller's requeue decision.
//!
//! ## Sub-modules
//!
//! - `result` - `ControlResult` and `ActionError`
//! - `action` - `Action`, `Predicate`, `ActionContext`, closure adapters
//! - `combinators` - `Sequence`, `If`, `IfElse`, `Switch`
//! - `predicates` - built-in predicates and predicate combinators
//! - `state` - the `ObjectState` capability and `BaseState`
//! - `status` - `UpdateStatus`, the status patch builder
//! - `finalizer` - idempotent finalizer and annotation patches
//! - `dependency` - `LoadDependency`, gating on another object's readiness
//! - `handling` - `Handler`, the bridge to `kube_runtime`

mod action;
mod combinators;
mod dependency;
mod finalizer;
mod handling;
pub mod predicates;
mod result;
mod state;
mod status;

pub use action::{Action, ActionContext, BoxAction, BoxPredicate, FnAction, Noop, Predicate, StopAndForgetAction};
pub use combinators::{If, IfElse, Sequence, Switch};
pub use dependency::{DependencyLink, DependencyRef, LoadDependency};
pub use finalizer::{
    patch_add_finalizer, patch_merge_annotation, patch_remove_finalizer, AddFinalizer, RemoveFinalizer,
};
pub use handling::{
    result_label, Handler, RESULT_CANCELED, RESULT_ERROR, RESULT_REQUEUE, RESULT_REQUEUE_AFTER, RESULT_SUCCESS,
};
pub use result::{ActionError, ControlResult};
pub use state::{BaseState, ObjectState};
pub use status::UpdateStatus;
