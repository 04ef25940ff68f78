//! Request coordination core
//!
//! The coordinator keeps two independent tables keyed by [`RequestKey`]:
//! requests currently in flight and cached settled results. It guarantees
//! at most one in-flight transfer and at most one cached result per key,
//! de-duplicates concurrent identical requests onto one shared handle, and
//! resolves bulk invalidation/cancellation through [`KeySelector`]s.
//!
//! Tables are owned by the coordinator instance; the application's
//! composition root creates one coordinator and shares it by `Arc`.
//! No timeouts are enforced here: an executor future that never settles
//! leaves its pending entry in place until it is cancelled explicitly.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use dashmap::{mapref::entry::Entry, DashMap};
use futures::FutureExt;
use log::debug;

use super::{
    key::{GroupTag, KeySelector, RequestKey},
    traits::{CancelFn, Execution, ResultHandle},
};

/// A request currently in flight.
///
/// Created when a caller issues a key with no pending entry; removed
/// unconditionally when the transfer settles or is cancelled.
struct PendingRequest<T> {
    groups: Vec<GroupTag>,
    handle: ResultHandle<T>,
    cancel: CancelFn,
    // Distinguishes this entry from a later one under the same key, so a
    // transfer that outlives its cancellation cannot clear its successor.
    generation: u64,
}

/// A stored result handle, possibly still settling.
struct CachedResult<T> {
    groups: Vec<GroupTag>,
    handle: ResultHandle<T>,
}

/// Counts of live table entries, for monitoring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorStats {
    pub pending_count: usize,
    pub cached_count: usize,
}

/// De-duplicates in-flight requests, caches settled results, and supports
/// bulk cancellation/invalidation by key or group tag.
pub struct RequestCoordinator<T> {
    pending: Arc<DashMap<RequestKey, PendingRequest<T>>>,
    cache: DashMap<RequestKey, CachedResult<T>>,
    generation: AtomicU64,
}

impl<T> RequestCoordinator<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a coordinator with empty tables.
    pub fn new() -> Self {
        Self {
            pending: Arc::new(DashMap::new()),
            cache: DashMap::new(),
            generation: AtomicU64::new(0),
        }
    }

    /// Issue a logical request.
    ///
    /// If a request with this key is already pending, the executor is NOT
    /// invoked and the caller attaches to the existing handle. Otherwise
    /// the executor is invoked exactly once, its future is spawned so the
    /// transfer starts immediately, and the pending entry is registered.
    /// The entry is removed when the transfer settles, success or failure,
    /// so a later identical call re-executes.
    ///
    /// Must be called from within a Tokio runtime. The executor runs while
    /// the key's table shard is locked and must not call back into the
    /// coordinator.
    pub fn issue<F>(&self, key: RequestKey, groups: Vec<GroupTag>, executor: F) -> ResultHandle<T>
    where
        F: FnOnce() -> Execution<T>,
    {
        match self.pending.entry(key.clone()) {
            Entry::Occupied(entry) => {
                debug!("Attaching caller to in-flight request: {key}");
                entry.get().handle.clone()
            }
            Entry::Vacant(slot) => {
                let Execution { future, cancel } = executor();
                let generation = self.generation.fetch_add(1, Ordering::Relaxed);

                // Clear the pending slot the moment the transfer settles,
                // before any caller observes the outcome.
                let pending = Arc::clone(&self.pending);
                let settle_key = key.clone();
                let handle: ResultHandle<T> = async move {
                    let outcome = future.await;
                    pending.remove_if(&settle_key, |_, entry| entry.generation == generation);
                    outcome
                }
                .boxed()
                .shared();

                slot.insert(PendingRequest {
                    groups,
                    handle: handle.clone(),
                    cancel,
                    generation,
                });

                // Drive the transfer to completion even if every caller
                // drops its handle before settlement.
                tokio::spawn(handle.clone().map(|_| ()));

                debug!("Registered pending request: {key}");
                handle
            }
        }
    }

    /// Store a result handle under `key` for later reuse.
    ///
    /// Overwrites any prior entry under the same key. The handle may still
    /// be settling; attached callers share the eventual outcome either way.
    pub fn cache(&self, key: RequestKey, groups: Vec<GroupTag>, handle: ResultHandle<T>) {
        debug!("Caching result handle: {key}");
        self.cache.insert(key, CachedResult { groups, handle });
    }

    /// Look up a cached handle. Never triggers network activity.
    pub fn fetch_cached(&self, key: &RequestKey) -> Option<ResultHandle<T>> {
        self.cache.get(key).map(|entry| entry.handle.clone())
    }

    /// Remove cache entries matched by the selector, directly by id or
    /// through group membership. Missing keys are no-ops.
    ///
    /// Returns the keys of the entries actually removed.
    pub fn invalidate(&self, selector: impl Into<KeySelector>) -> Vec<RequestKey> {
        let selector = selector.into();

        let matched: Vec<RequestKey> = self
            .cache
            .iter()
            .filter(|entry| selector.matches(entry.key(), &entry.value().groups))
            .map(|entry| entry.key().clone())
            .collect();

        let mut removed = Vec::with_capacity(matched.len());
        for key in matched {
            if let Some((key, _)) = self.cache.remove(&key) {
                removed.push(key);
            }
        }

        if !removed.is_empty() {
            debug!("Invalidated {} cached result(s)", removed.len());
        }
        removed
    }

    /// Cancel pending requests matched by the selector.
    ///
    /// Each matched entry's cancel capability is invoked exactly once and
    /// the entry is removed immediately, so subsequent issues do not see a
    /// stale pending state. Cancellation of the underlying transport is
    /// best-effort: this resolves once every capability has been invoked,
    /// not once the transfers have stopped. Missing keys are skipped.
    ///
    /// Returns the keys of the entries cancelled.
    pub async fn cancel(&self, selector: impl Into<KeySelector>) -> Vec<RequestKey> {
        let selector = selector.into();

        let matched: Vec<RequestKey> = self
            .pending
            .iter()
            .filter(|entry| selector.matches(entry.key(), &entry.value().groups))
            .map(|entry| entry.key().clone())
            .collect();

        let mut cancelled = Vec::with_capacity(matched.len());
        for key in matched {
            if let Some((key, entry)) = self.pending.remove(&key) {
                debug!("Cancelling pending request: {key}");
                (entry.cancel)();
                cancelled.push(key);
            }
        }
        cancelled
    }

    /// Counts of live pending and cached entries.
    pub fn stats(&self) -> CoordinatorStats {
        CoordinatorStats {
            pending_count: self.pending.len(),
            cached_count: self.cache.len(),
        }
    }
}

impl<T> Default for RequestCoordinator<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for RequestCoordinator<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestCoordinator")
            .field("pending", &self.pending.len())
            .field("cached", &self.cache.len())
            .finish()
    }
}
