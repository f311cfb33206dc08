//! # Predicates
//!
//! Built-in predicates and predicate combinators.

use kube::Resource;

use super::{ActionContext, BoxPredicate, ObjectState, Predicate};
use crate::crd::ObjWithConditions;

/// True when every predicate holds; true for an empty list
pub fn all<S: 'static>(predicates: Vec<BoxPredicate<S>>) -> impl Predicate<S> {
    move |ctx: &ActionContext, state: &S| predicates.iter().all(|p| p.test(ctx, state))
}

/// True when any predicate holds; false for an empty list
pub fn any<S: 'static>(predicates: Vec<BoxPredicate<S>>) -> impl Predicate<S> {
    move |ctx: &ActionContext, state: &S| predicates.iter().any(|p| p.test(ctx, state))
}

pub fn not<S: 'static>(predicate: impl Predicate<S> + 'static) -> impl Predicate<S> {
    move |ctx: &ActionContext, state: &S| !predicate.test(ctx, state)
}

/// The object has a deletion timestamp
pub fn marked_for_deletion<S: ObjectState>(_ctx: &ActionContext, state: &S) -> bool {
    state.obj().meta().deletion_timestamp.is_some()
}

/// `spec` moved past the generation the status was computed against
pub fn is_stale<S: ObjectState>(_ctx: &ActionContext, state: &S) -> bool {
    state.obj().meta().generation != state.obj().observed_generation()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::composed::BaseState;
    use crate::crd::{Network, NetworkSpec, NetworkStatus};
    use crate::store::MemoryStore;
    use std::sync::Arc;

    fn state(net: Network) -> BaseState<Network> {
        BaseState::new(Arc::new(MemoryStore::new()).cluster(), net)
    }

    #[test]
    fn test_combinators() {
        let ctx = ActionContext::background();
        let constant = |value: bool| -> BoxPredicate<u8> {
            Box::new(move |_: &ActionContext, _: &u8| value)
        };

        assert!(all(vec![constant(true), constant(true)]).test(&ctx, &0));
        assert!(!all(vec![constant(true), constant(false)]).test(&ctx, &0));
        assert!(all::<u8>(vec![]).test(&ctx, &0));
        assert!(any(vec![constant(false), constant(true)]).test(&ctx, &0));
        assert!(!any::<u8>(vec![]).test(&ctx, &0));
        assert!(not(|_: &ActionContext, _: &u8| false).test(&ctx, &0));
    }

    #[test]
    fn test_marked_for_deletion() {
        let ctx = ActionContext::background();
        let net = Network::new("net-1", NetworkSpec::default());
        assert!(!marked_for_deletion(&ctx, &state(net)));

        let deleting: Network = serde_json::from_value(serde_json::json!({
            "apiVersion": "cloud-control.microscaler.io/v1beta1",
            "kind": "Network",
            "metadata": {"name": "net-1", "deletionTimestamp": "2024-05-01T10:00:00Z"},
            "spec": {},
        }))
        .unwrap();
        assert!(marked_for_deletion(&ctx, &state(deleting)));
    }

    #[test]
    fn test_is_stale() {
        let ctx = ActionContext::background();
        let mut net = Network::new("net-1", NetworkSpec::default());
        net.metadata.generation = Some(2);
        net.status = Some(NetworkStatus {
            conditions: vec![],
            observed_generation: Some(1),
        });
        assert!(is_stale(&ctx, &state(net.clone())));

        net.status = Some(NetworkStatus {
            conditions: vec![],
            observed_generation: Some(2),
        });
        assert!(!is_stale(&ctx, &state(net)));
    }
}
