//! Tests for the core module
//!
//! Exercises the coordinator's de-duplication, caching, invalidation, and
//! cancellation contracts on a Tokio runtime, using manually-settled
//! executors so every interleaving is driven by the test.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use futures::FutureExt;
use tokio::sync::oneshot;

use crate::core::{
    coordinator::RequestCoordinator,
    error::{FetchError, FetchResult},
    key::{GroupTag, KeySelector, RequestKey},
    traits::{CancelFn, Execution, ResultHandle},
};

type Coordinator = RequestCoordinator<String>;

/// Build an execution whose settlement is driven by the returned sender
/// and whose cancel invocations bump the given counter.
fn manual_execution(
    cancels: &Arc<AtomicUsize>,
) -> (Execution<String>, oneshot::Sender<FetchResult<String>>) {
    let (settle_tx, settle_rx) = oneshot::channel::<FetchResult<String>>();
    let future = async move {
        match settle_rx.await {
            Ok(outcome) => outcome,
            Err(_) => Err(FetchError::Cancelled("settlement dropped".to_string())),
        }
    }
    .boxed();

    let cancels = cancels.clone();
    let cancel: CancelFn = Box::new(move || {
        cancels.fetch_add(1, Ordering::SeqCst);
    });

    (Execution { future, cancel }, settle_tx)
}

/// An already-settled handle, for exercising the cache table directly.
fn settled_handle(value: &str) -> ResultHandle<String> {
    futures::future::ready(Ok::<_, FetchError>(value.to_string()))
        .boxed()
        .shared()
}

/// Issuing the same key twice before settlement invokes one executor;
/// both callers observe the identical resolved value.
#[tokio::test]
async fn test_deduplicates_concurrent_identical_requests() {
    let coordinator = Coordinator::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let cancels = Arc::new(AtomicUsize::new(0));

    let (execution, settle) = manual_execution(&cancels);
    let counter = calls.clone();
    let first = coordinator.issue(RequestKey::from("A"), vec![], move || {
        counter.fetch_add(1, Ordering::SeqCst);
        execution
    });

    let (spare, _spare_settle) = manual_execution(&cancels);
    let counter = calls.clone();
    let second = coordinator.issue(RequestKey::from("A"), vec![], move || {
        counter.fetch_add(1, Ordering::SeqCst);
        spare
    });

    assert_eq!(coordinator.stats().pending_count, 1);

    settle
        .send(Ok("value".to_string()))
        .expect("receiver should be alive");

    assert_eq!(first.await, Ok("value".to_string()));
    assert_eq!(second.await, Ok("value".to_string()));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

/// Distinct keys always execute independently.
#[tokio::test]
async fn test_independent_keys_execute_independently() {
    let coordinator = Coordinator::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let cancels = Arc::new(AtomicUsize::new(0));

    for key in ["A", "B"] {
        let (execution, settle) = manual_execution(&cancels);
        let counter = calls.clone();
        let handle = coordinator.issue(RequestKey::from(key), vec![], move || {
            counter.fetch_add(1, Ordering::SeqCst);
            execution
        });
        settle
            .send(Ok(key.to_string()))
            .expect("receiver should be alive");
        assert_eq!(handle.await, Ok(key.to_string()));
    }

    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

/// Group invalidation removes entries matched by id or by membership.
#[tokio::test]
async fn test_group_invalidation() {
    let coordinator = Coordinator::new();
    coordinator.cache(
        RequestKey::from("x"),
        vec![GroupTag::from("g1")],
        settled_handle("x"),
    );
    coordinator.cache(
        RequestKey::from("y"),
        vec![GroupTag::from("g1"), GroupTag::from("g2")],
        settled_handle("y"),
    );

    let removed = coordinator.invalidate("g1");
    assert_eq!(removed.len(), 2);
    assert!(removed.contains(&RequestKey::from("x")));
    assert!(removed.contains(&RequestKey::from("y")));

    assert!(coordinator.fetch_cached(&RequestKey::from("x")).is_none());
    assert!(coordinator.fetch_cached(&RequestKey::from("y")).is_none());
}

/// Group cancellation invokes each pending cancel capability exactly once
/// and removes both entries; a repeat is a no-op.
#[tokio::test]
async fn test_group_cancellation() {
    let coordinator = Coordinator::new();
    let cancels = Arc::new(AtomicUsize::new(0));

    let (exec_a, _settle_a) = manual_execution(&cancels);
    let (exec_b, _settle_b) = manual_execution(&cancels);
    let _a = coordinator.issue(RequestKey::from("a"), vec![GroupTag::from("g1")], move || {
        exec_a
    });
    let _b = coordinator.issue(RequestKey::from("b"), vec![GroupTag::from("g1")], move || {
        exec_b
    });
    assert_eq!(coordinator.stats().pending_count, 2);

    let cancelled = coordinator.cancel("g1").await;
    assert_eq!(cancelled.len(), 2);
    assert_eq!(cancels.load(Ordering::SeqCst), 2);
    assert_eq!(coordinator.stats().pending_count, 0);

    assert!(coordinator.cancel("g1").await.is_empty());
    assert_eq!(cancels.load(Ordering::SeqCst), 2);
}

/// After settlement the pending entry is gone and an identical call
/// re-executes from scratch.
#[tokio::test]
async fn test_reissue_after_settlement() {
    let coordinator = Coordinator::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let cancels = Arc::new(AtomicUsize::new(0));

    let (execution, settle) = manual_execution(&cancels);
    let counter = calls.clone();
    let first = coordinator.issue(RequestKey::from("A"), vec![], move || {
        counter.fetch_add(1, Ordering::SeqCst);
        execution
    });
    settle
        .send(Ok("first".to_string()))
        .expect("receiver should be alive");
    assert_eq!(first.await, Ok("first".to_string()));
    assert_eq!(coordinator.stats().pending_count, 0);

    let (execution, settle) = manual_execution(&cancels);
    let counter = calls.clone();
    let second = coordinator.issue(RequestKey::from("A"), vec![], move || {
        counter.fetch_add(1, Ordering::SeqCst);
        execution
    });
    settle
        .send(Ok("second".to_string()))
        .expect("receiver should be alive");
    assert_eq!(second.await, Ok("second".to_string()));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

/// A rejection propagates verbatim to every attached caller and clears
/// the pending entry so the next call retries from scratch.
#[tokio::test]
async fn test_rejection_propagates_and_clears() {
    let coordinator = Coordinator::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let cancels = Arc::new(AtomicUsize::new(0));

    let (execution, settle) = manual_execution(&cancels);
    let counter = calls.clone();
    let first = coordinator.issue(RequestKey::from("A"), vec![], move || {
        counter.fetch_add(1, Ordering::SeqCst);
        execution
    });
    let (spare, _spare_settle) = manual_execution(&cancels);
    let counter = calls.clone();
    let second = coordinator.issue(RequestKey::from("A"), vec![], move || {
        counter.fetch_add(1, Ordering::SeqCst);
        spare
    });

    let failure = FetchError::Transport("connection reset".to_string());
    settle
        .send(Err(failure.clone()))
        .expect("receiver should be alive");

    assert_eq!(first.await, Err(failure.clone()));
    assert_eq!(second.await, Err(failure));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(coordinator.stats().pending_count, 0);

    let (execution, settle) = manual_execution(&cancels);
    let counter = calls.clone();
    let retry = coordinator.issue(RequestKey::from("A"), vec![], move || {
        counter.fetch_add(1, Ordering::SeqCst);
        execution
    });
    settle
        .send(Ok("recovered".to_string()))
        .expect("receiver should be alive");
    assert_eq!(retry.await, Ok("recovered".to_string()));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

/// Missing keys are successful no-ops and leave unrelated entries alone.
#[tokio::test]
async fn test_missing_keys_are_noops() {
    let coordinator = Coordinator::new();
    coordinator.cache(RequestKey::from("keep"), vec![], settled_handle("kept"));

    assert!(coordinator.invalidate("nonexistent").is_empty());
    assert!(coordinator.cancel("nonexistent").await.is_empty());

    let cached = coordinator
        .fetch_cached(&RequestKey::from("keep"))
        .expect("unrelated entry must survive");
    assert_eq!(cached.await, Ok("kept".to_string()));
}

/// A bare invalidate clears the whole cache; repeating it removes nothing.
#[tokio::test]
async fn test_invalidate_all_is_idempotent() {
    let coordinator = Coordinator::new();
    coordinator.cache(RequestKey::from("x"), vec![], settled_handle("x"));
    coordinator.cache(RequestKey::from("y"), vec![], settled_handle("y"));

    assert_eq!(coordinator.invalidate(KeySelector::All).len(), 2);
    assert!(coordinator.invalidate(KeySelector::All).is_empty());
    assert_eq!(coordinator.stats().cached_count, 0);
}

/// Caching overwrites any prior entry under the same key.
#[tokio::test]
async fn test_cache_overwrites_prior_entry() {
    let coordinator = Coordinator::new();
    coordinator.cache(RequestKey::from("x"), vec![], settled_handle("old"));
    coordinator.cache(RequestKey::from("x"), vec![], settled_handle("new"));
    assert_eq!(coordinator.stats().cached_count, 1);

    let cached = coordinator
        .fetch_cached(&RequestKey::from("x"))
        .expect("entry should exist");
    assert_eq!(cached.await, Ok("new".to_string()));
}

/// A transfer that outlives its cancellation must not clear the fresh
/// pending entry registered for the same key afterwards.
#[tokio::test]
async fn test_stale_settlement_keeps_fresh_entry() {
    let coordinator = Coordinator::new();
    let cancels = Arc::new(AtomicUsize::new(0));

    let (execution, stale_settle) = manual_execution(&cancels);
    let stale = coordinator.issue(RequestKey::from("A"), vec![], move || execution);
    assert_eq!(coordinator.cancel("A").await.len(), 1);

    let (execution, fresh_settle) = manual_execution(&cancels);
    let fresh = coordinator.issue(RequestKey::from("A"), vec![], move || execution);
    assert_eq!(coordinator.stats().pending_count, 1);

    // Settle the cancelled transfer only now, after the re-issue.
    drop(stale_settle);
    assert!(matches!(stale.await, Err(FetchError::Cancelled(_))));
    assert_eq!(coordinator.stats().pending_count, 1);

    fresh_settle
        .send(Ok("fresh".to_string()))
        .expect("receiver should be alive");
    assert_eq!(fresh.await, Ok("fresh".to_string()));
    assert_eq!(coordinator.stats().pending_count, 0);
}
