//! # Dependency Gate Tests
//!
//! Network and IpRange pipelines against the in-memory store.
//!
//! These tests verify:
//! - Ready=True once every dependency is Ready, with no repeated writes
//! - Missing, not-ready, and still-pending dependencies
//! - Backoff tiers used for each outcome and their reset
//! - The Subscription of an IpRange resolved through its Network
//! - The finalizer is held while the object lives and released on deletion

use std::sync::Arc;
use std::time::Duration;

use cloud_manager::composed::{Action, ActionContext, ControlResult};
use cloud_manager::controller::iprange::{iprange_pipeline, IpRangeState};
use cloud_manager::controller::network::{network_pipeline, NetworkState};
use cloud_manager::controller::{self, ControllerContext};
use cloud_manager::crd::{
    find_status_condition, Condition, ConditionStatus, IpRange, IpRangeSpec, Network, NetworkSpec, NetworkStatus,
    ObjWithConditions, ObjectReference, ProviderType, Subscription, SubscriptionSpec, SubscriptionStatus,
    CONDITION_TYPE_ERROR, CONDITION_TYPE_READY, CONDITION_TYPE_UPDATING, FINALIZER, REASON_INVALID_DEPENDENCY,
    REASON_READY,
};
use kube::ResourceExt;
use cloud_manager::rate::BackoffPolicies;
use cloud_manager::store::{MemoryStore, ObjectKey};
use tokio_util::sync::CancellationToken;

const NS: &str = "default";

fn subscription(ready: Option<ConditionStatus>) -> Subscription {
    let mut sub = Subscription::new(
        "sub-1",
        SubscriptionSpec {
            provider: ProviderType::Aws,
            account_id: "123456789012".to_string(),
        },
    );
    sub.metadata.namespace = Some(NS.to_string());
    sub.status = ready.map(|status| SubscriptionStatus {
        conditions: vec![Condition::new(CONDITION_TYPE_READY, status, "CredentialsChecked", "")],
        observed_generation: Some(1),
    });
    sub
}

fn network(subscription: Option<&str>) -> Network {
    let mut net = Network::new(
        "net-1",
        NetworkSpec {
            subscription: subscription.map(ObjectReference::new),
            cidr: Some("10.0.0.0/16".to_string()),
            ..Default::default()
        },
    );
    net.metadata.namespace = Some(NS.to_string());
    net
}

fn ready_network() -> Network {
    let mut net = network(Some("sub-1"));
    net.status = Some(NetworkStatus {
        conditions: vec![Condition::new(
            CONDITION_TYPE_READY,
            ConditionStatus::True,
            REASON_READY,
            "",
        )],
        observed_generation: Some(1),
    });
    net
}

fn iprange(network: Option<&str>) -> IpRange {
    let mut range = IpRange::new(
        "range-1",
        IpRangeSpec {
            network: network.map(ObjectReference::new),
            cidr: "10.0.1.0/24".to_string(),
        },
    );
    range.metadata.namespace = Some(NS.to_string());
    range
}

async fn run_network(store: &Arc<MemoryStore>, policies: &Arc<BackoffPolicies>) -> ControlResult {
    let net: Network = store.get_object(Some(NS), "net-1").unwrap();
    let mut state = NetworkState::new(store.cluster(), net);
    let mut ctx = ActionContext::background();
    network_pipeline(Arc::clone(policies)).run(&mut ctx, &mut state).await
}

async fn run_iprange(store: &Arc<MemoryStore>, policies: &Arc<BackoffPolicies>) -> ControlResult {
    let range: IpRange = store.get_object(Some(NS), "range-1").unwrap();
    let mut state = IpRangeState::new(store.cluster(), range);
    let mut ctx = ActionContext::background();
    iprange_pipeline(Arc::clone(policies)).run(&mut ctx, &mut state).await
}

fn ready_condition<K: ObjWithConditions>(obj: &K) -> Condition {
    find_status_condition(obj.conditions(), CONDITION_TYPE_READY)
        .cloned()
        .unwrap()
}

fn stored_network(store: &MemoryStore) -> Network {
    store.get_object(Some(NS), "net-1").unwrap()
}

#[tokio::test]
async fn test_network_ready_when_subscription_ready() {
    let store = Arc::new(MemoryStore::new());
    let policies = Arc::new(BackoffPolicies::default());
    store.insert(&subscription(Some(ConditionStatus::True))).unwrap();
    store.insert(&network(Some("sub-1"))).unwrap();

    let result = run_network(&store, &policies).await;
    assert!(matches!(result, ControlResult::StopAndForget));

    let net = stored_network(&store);
    let ready = ready_condition(&net);
    assert_eq!(ready.status, ConditionStatus::True);
    assert_eq!(ready.reason, REASON_READY);
    assert_eq!(ready.observed_generation, Some(1));
    assert_eq!(net.observed_generation(), Some(1));
    assert_eq!(store.status_update_count(), 1);

    // Nothing changed: no second write
    let result = run_network(&store, &policies).await;
    assert!(matches!(result, ControlResult::StopAndForget));
    assert_eq!(store.status_update_count(), 1);
}

#[tokio::test]
async fn test_network_missing_subscription_backs_off_slowly() {
    let store = Arc::new(MemoryStore::new());
    let policies = Arc::new(BackoffPolicies::default());
    store.insert(&network(Some("sub-1"))).unwrap();

    let result = run_network(&store, &policies).await;
    assert_eq!(result.requeue_delay(), Some(Duration::from_secs(10)));

    let ready = ready_condition(&stored_network(&store));
    assert_eq!(ready.status, ConditionStatus::False);
    assert_eq!(ready.reason, REASON_INVALID_DEPENDENCY);
    assert_eq!(ready.message, "Subscription sub-1 does not exist");

    let result = run_network(&store, &policies).await;
    assert_eq!(result.requeue_delay(), Some(Duration::from_secs(40)));

    let key = ObjectKey::of::<Subscription>(Some(NS), "sub-1");
    assert_eq!(policies.slow().num_requeues(&key), 2);

    // Dependency shows up Ready: gate opens and the slow counter is reset
    store.insert(&subscription(Some(ConditionStatus::True))).unwrap();
    let result = run_network(&store, &policies).await;
    assert!(matches!(result, ControlResult::StopAndForget));
    assert_eq!(ready_condition(&stored_network(&store)).status, ConditionStatus::True);
    assert_eq!(policies.slow().num_requeues(&key), 0);
}

#[tokio::test]
async fn test_network_pending_subscription_leaves_status_untouched() {
    let store = Arc::new(MemoryStore::new());
    let policies = Arc::new(BackoffPolicies::default());
    store.insert(&subscription(None)).unwrap();
    store.insert(&network(Some("sub-1"))).unwrap();

    let result = run_network(&store, &policies).await;
    assert_eq!(result.requeue_delay(), Some(Duration::from_secs(1)));
    assert_eq!(store.status_update_count(), 0);
    assert!(stored_network(&store).status.is_none());

    store.insert(&subscription(Some(ConditionStatus::Unknown))).unwrap();
    let result = run_network(&store, &policies).await;
    assert_eq!(result.requeue_delay(), Some(Duration::from_secs(4)));
    assert_eq!(store.status_update_count(), 0);
}

#[tokio::test]
async fn test_network_subscription_not_ready() {
    let store = Arc::new(MemoryStore::new());
    let policies = Arc::new(BackoffPolicies::default());
    store.insert(&subscription(Some(ConditionStatus::False))).unwrap();
    store.insert(&network(Some("sub-1"))).unwrap();

    let result = run_network(&store, &policies).await;
    assert_eq!(result.requeue_delay(), Some(Duration::from_secs(10)));

    let ready = ready_condition(&stored_network(&store));
    assert_eq!(ready.status, ConditionStatus::False);
    assert_eq!(ready.message, "Subscription sub-1 is not ready");
}

#[tokio::test]
async fn test_network_without_subscription_reference() {
    let store = Arc::new(MemoryStore::new());
    let policies = Arc::new(BackoffPolicies::default());
    store.insert(&network(None)).unwrap();

    let result = run_network(&store, &policies).await;
    assert!(matches!(result, ControlResult::StopAndForget));

    let ready = ready_condition(&stored_network(&store));
    assert_eq!(ready.reason, REASON_INVALID_DEPENDENCY);
    assert_eq!(ready.message, "Subscription reference is not set");
}

#[tokio::test]
async fn test_network_dependency_read_error_requeues() {
    let store = Arc::new(MemoryStore::new());
    let policies = Arc::new(BackoffPolicies::default());
    store.insert(&subscription(Some(ConditionStatus::True))).unwrap();
    store.insert(&network(Some("sub-1"))).unwrap();

    store.fail_next_get(500);
    let result = run_network(&store, &policies).await;
    assert!(matches!(result, ControlResult::StopWithRequeue));
    assert_eq!(store.status_update_count(), 0);
}

#[tokio::test]
async fn test_network_holds_finalizer_until_deleted() {
    let store = Arc::new(MemoryStore::new());
    let policies = Arc::new(BackoffPolicies::default());
    store.insert(&subscription(Some(ConditionStatus::True))).unwrap();
    store.insert(&network(Some("sub-1"))).unwrap();

    let _ = run_network(&store, &policies).await;
    assert_eq!(stored_network(&store).finalizers(), [FINALIZER]);

    let version = stored_network(&store).metadata.resource_version;
    let _ = run_network(&store, &policies).await;
    assert_eq!(stored_network(&store).metadata.resource_version, version);
}

#[tokio::test]
async fn test_network_marked_for_deletion_releases_finalizer() {
    let store = Arc::new(MemoryStore::new());
    let policies = Arc::new(BackoffPolicies::default());
    let deleting: Network = serde_json::from_value(serde_json::json!({
        "apiVersion": "cloud-control.microscaler.io/v1beta1",
        "kind": "Network",
        "metadata": {
            "name": "net-1",
            "namespace": NS,
            "deletionTimestamp": "2026-01-01T00:00:00Z",
            "finalizers": [FINALIZER]
        },
        "spec": {}
    }))
    .unwrap();
    store.insert(&deleting).unwrap();

    let result = run_network(&store, &policies).await;
    assert!(matches!(result, ControlResult::StopAndForget));
    assert_eq!(store.status_update_count(), 0);
    assert!(store.get_object::<Network>(Some(NS), "net-1").is_none());
}

#[tokio::test]
async fn test_network_deleted_by_someone_else_is_left_alone() {
    let store = Arc::new(MemoryStore::new());
    let policies = Arc::new(BackoffPolicies::default());
    let deleting: Network = serde_json::from_value(serde_json::json!({
        "apiVersion": "cloud-control.microscaler.io/v1beta1",
        "kind": "Network",
        "metadata": {
            "name": "net-1",
            "namespace": NS,
            "deletionTimestamp": "2026-01-01T00:00:00Z",
            "finalizers": ["other.io/backup"]
        },
        "spec": {}
    }))
    .unwrap();
    store.insert(&deleting).unwrap();

    let result = run_network(&store, &policies).await;
    assert!(matches!(result, ControlResult::StopAndForget));
    assert_eq!(stored_network(&store).finalizers(), ["other.io/backup"]);
}

#[tokio::test]
async fn test_network_ready_replaces_other_lifecycle_conditions() {
    let store = Arc::new(MemoryStore::new());
    let policies = Arc::new(BackoffPolicies::default());
    store.insert(&subscription(Some(ConditionStatus::True))).unwrap();
    let mut net = network(Some("sub-1"));
    net.status = Some(NetworkStatus {
        conditions: vec![
            Condition::new(CONDITION_TYPE_ERROR, ConditionStatus::True, "ProviderError", "quota"),
            Condition::new(CONDITION_TYPE_UPDATING, ConditionStatus::True, "Processing", ""),
            Condition::new("Peered", ConditionStatus::True, "Peered", ""),
        ],
        observed_generation: None,
    });
    store.insert(&net).unwrap();

    let _ = run_network(&store, &policies).await;

    let net = stored_network(&store);
    let mut types: Vec<&str> = net.conditions().iter().map(|c| c.r#type.as_str()).collect();
    types.sort_unstable();
    assert_eq!(types, vec!["Peered", CONDITION_TYPE_READY]);
}

#[tokio::test]
async fn test_iprange_ready_through_network_and_subscription() {
    let store = Arc::new(MemoryStore::new());
    let policies = Arc::new(BackoffPolicies::default());
    store.insert(&subscription(Some(ConditionStatus::True))).unwrap();
    store.insert(&ready_network()).unwrap();
    store.insert(&iprange(Some("net-1"))).unwrap();

    let result = run_iprange(&store, &policies).await;
    assert!(matches!(result, ControlResult::StopAndForget));

    let range: IpRange = store.get_object(Some(NS), "range-1").unwrap();
    assert_eq!(ready_condition(&range).status, ConditionStatus::True);
    assert_eq!(range.finalizers(), [FINALIZER]);
}

#[tokio::test]
async fn test_iprange_missing_network() {
    let store = Arc::new(MemoryStore::new());
    let policies = Arc::new(BackoffPolicies::default());
    store.insert(&iprange(Some("net-1"))).unwrap();

    let result = run_iprange(&store, &policies).await;
    assert_eq!(result.requeue_delay(), Some(Duration::from_secs(10)));

    let range: IpRange = store.get_object(Some(NS), "range-1").unwrap();
    assert_eq!(ready_condition(&range).message, "Network net-1 does not exist");
}

#[tokio::test]
async fn test_iprange_waits_for_subscription_of_network() {
    let store = Arc::new(MemoryStore::new());
    let policies = Arc::new(BackoffPolicies::default());
    store.insert(&subscription(Some(ConditionStatus::False))).unwrap();
    store.insert(&ready_network()).unwrap();
    store.insert(&iprange(Some("net-1"))).unwrap();

    let result = run_iprange(&store, &policies).await;
    assert_eq!(result.requeue_delay(), Some(Duration::from_secs(10)));

    let range: IpRange = store.get_object(Some(NS), "range-1").unwrap();
    let ready = ready_condition(&range);
    assert_eq!(ready.status, ConditionStatus::False);
    assert_eq!(ready.message, "Subscription sub-1 is not ready");
}

#[tokio::test]
async fn test_reconcile_translates_results_for_the_controller() {
    use kube_runtime::controller::Action as ControllerAction;

    let store = Arc::new(MemoryStore::new());
    let ctx = Arc::new(ControllerContext::new(
        store.cluster(),
        Arc::new(BackoffPolicies::default()),
        CancellationToken::new(),
    ));
    store.insert(&network(Some("sub-1"))).unwrap();

    let net: Network = store.get_object(Some(NS), "net-1").unwrap();
    let action = controller::network::reconcile(Arc::new(net), Arc::clone(&ctx))
        .await
        .unwrap();
    assert_eq!(action, ControllerAction::requeue(Duration::from_secs(10)));

    store.insert(&subscription(Some(ConditionStatus::True))).unwrap();
    let net: Network = store.get_object(Some(NS), "net-1").unwrap();
    let action = controller::network::reconcile(Arc::new(net), Arc::clone(&ctx))
        .await
        .unwrap();
    assert_eq!(action, ControllerAction::await_change());
}
