//! # Engine Tests
//!
//! Composition, cancellation, and backoff behavior through the public API.
//!
//! These tests verify:
//! - Sequences stop at the first non-Continue result and pass it through unchanged
//! - Switch runs exactly one branch
//! - Cancellation stops a pipeline before its next step
//! - Backoff grows per object, saturates, and restarts after forget

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use cloud_manager::composed::{
    predicates, Action, ActionContext, ActionError, ControlResult, FnAction, If, IfElse, Noop, Sequence, Switch,
};
use cloud_manager::crd::{IpRange, Network};
use cloud_manager::rate::{BackoffPolicies, BackoffPolicy, ObjectRateLimiter};
use cloud_manager::store::ObjectKey;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Default)]
struct Counters {
    value: u32,
    runs: Vec<&'static str>,
}

fn step(
    name: &'static str,
    result: fn() -> ControlResult,
) -> FnAction<impl Fn(&mut ActionContext, &mut Counters) -> ControlResult + Send + Sync> {
    FnAction::new(name, move |_ctx: &mut ActionContext, state: &mut Counters| {
        state.runs.push(name);
        result()
    })
}

#[tokio::test]
async fn test_sequence_short_circuits_on_requeue() {
    let pipeline = Sequence::new("short-circuit")
        .step(step("first", || ControlResult::Continue))
        .step(step("second", || {
            ControlResult::StopWithRequeueDelay(Duration::from_secs(7))
        }))
        .step(step("third", || ControlResult::Continue));

    let mut state = Counters::default();
    let mut ctx = ActionContext::background();
    let result = pipeline.run(&mut ctx, &mut state).await;

    assert_eq!(result.requeue_delay(), Some(Duration::from_secs(7)));
    assert_eq!(state.runs, vec!["first", "second"]);
}

#[tokio::test]
async fn test_sequence_passes_failure_through() {
    let pipeline = Sequence::new("failing")
        .step(step("first", || ControlResult::fail(ActionError::msg("provider said no"))))
        .step(step("second", || ControlResult::Continue));

    let mut state = Counters::default();
    let mut ctx = ActionContext::background();
    match pipeline.run(&mut ctx, &mut state).await {
        ControlResult::Fail(err) => assert_eq!(err.to_string(), "provider said no"),
        other => panic!("unexpected result: {other}"),
    }
    assert_eq!(state.runs, vec!["first"]);
}

#[tokio::test]
async fn test_nested_composition_keeps_state_between_steps() {
    let increment = || {
        FnAction::new("increment", |_ctx: &mut ActionContext, state: &mut Counters| {
            state.value += 1;
            ControlResult::Continue
        })
    };
    let is_small = |_ctx: &ActionContext, state: &Counters| state.value < 2;

    let pipeline = Sequence::new("outer")
        .step(increment())
        .step(If::new(is_small, increment()))
        .step(If::new(is_small, increment()))
        .step(IfElse::new(
            predicates::not(is_small),
            Noop,
            step("unreachable", || ControlResult::StopAndForget),
        ));

    let mut state = Counters::default();
    let mut ctx = ActionContext::background();
    let result = pipeline.run(&mut ctx, &mut state).await;

    assert!(result.is_continue());
    assert_eq!(state.value, 2);
    assert!(state.runs.is_empty());
}

#[tokio::test]
async fn test_switch_runs_exactly_one_branch() {
    let switch = || {
        Switch::new()
            .case(
                |_ctx: &ActionContext, state: &Counters| state.value == 1,
                step("one", || ControlResult::Continue),
            )
            .case(
                |_ctx: &ActionContext, state: &Counters| state.value >= 1,
                step("at-least-one", || ControlResult::Continue),
            )
            .otherwise(step("default", || ControlResult::Continue))
    };

    let mut ctx = ActionContext::background();
    for (value, expected) in [(1, "one"), (5, "at-least-one"), (0, "default")] {
        let mut state = Counters {
            value,
            runs: Vec::new(),
        };
        let _ = switch().run(&mut ctx, &mut state).await;
        assert_eq!(state.runs, vec![expected]);
    }
}

#[tokio::test]
async fn test_cancellation_stops_before_next_step() {
    let token = CancellationToken::new();
    let cancel = token.clone();
    let seen = Arc::new(AtomicUsize::new(0));
    let seen_in_step = Arc::clone(&seen);

    let pipeline = Sequence::new("cancelled")
        .step(FnAction::new("cancel", move |_ctx: &mut ActionContext, _state: &mut Counters| {
            cancel.cancel();
            ControlResult::Continue
        }))
        .step(FnAction::new("after", move |_ctx: &mut ActionContext, _state: &mut Counters| {
            seen_in_step.fetch_add(1, Ordering::SeqCst);
            ControlResult::Continue
        }));

    let mut state = Counters::default();
    let mut ctx = ActionContext::new(token);
    let result = pipeline.run(&mut ctx, &mut state).await;

    assert!(matches!(result, ControlResult::Fail(ref err) if err.is_cancelled()));
    assert_eq!(seen.load(Ordering::SeqCst), 0);
}

#[test]
fn test_backoff_sequence_and_reset() {
    let limiter = ObjectRateLimiter::new(BackoffPolicy::new(
        Duration::from_secs(1),
        Duration::from_secs(60),
        1.0,
    ));
    let key = ObjectKey::of::<Network>(Some("default"), "net-1");

    let delays: Vec<Duration> = (0..8).map(|_| limiter.when(&key)).collect();
    let secs: Vec<u64> = delays.iter().map(Duration::as_secs).collect();
    assert_eq!(secs, vec![1, 2, 4, 8, 16, 32, 60, 60]);
    assert_eq!(limiter.num_requeues(&key), 8);

    limiter.forget(&key);
    assert_eq!(limiter.num_requeues(&key), 0);
    assert_eq!(limiter.when(&key), Duration::from_secs(1));
}

#[test]
fn test_backoff_keys_are_independent() {
    let policies = BackoffPolicies::default();
    let a = ObjectKey::of::<Network>(Some("default"), "net-a");
    let b = ObjectKey::of::<Network>(Some("default"), "net-b");

    assert_eq!(policies.slow().when(&a), Duration::from_secs(10));
    assert_eq!(policies.slow().when(&a), Duration::from_secs(40));
    assert_eq!(policies.slow().when(&b), Duration::from_secs(10));
    assert_eq!(policies.medium().when(&a), Duration::from_secs(1));
}

#[test]
fn test_backoff_saturates_instead_of_overflowing() {
    let limiter = ObjectRateLimiter::new(BackoffPolicy::new(
        Duration::from_millis(100),
        Duration::from_secs(600),
        2.0,
    ));
    let key = ObjectKey::of::<IpRange>(None, "range-1");
    let last = (0..2_000).map(|_| limiter.when(&key)).last();
    assert_eq!(last, Some(Duration::from_secs(600)));
}
