//! Optimistic write coordination between the cache and the queue.
//!
//! A local mutation is applied to the cache first so the UI reflects it
//! instantly, then the corresponding operation is buffered for delivery.
//! The returned [`OptimisticWrite`] carries enough state to roll the
//! cache back if the operation later fails permanently.

use std::sync::Arc;
use std::time::Duration;
use serde_json::Value;
use tracing::debug;

use crate::cache::CacheStore;
use crate::operation::OperationKind;
use crate::queue::SyncQueue;

/// Applies cache updates optimistically, before remote delivery.
pub struct OptimisticCoordinator {
    cache: Arc<CacheStore>,
    queue: Arc<SyncQueue>,
}

/// Record of one optimistic write, sufficient for rollback.
#[derive(Debug, Clone)]
pub struct OptimisticWrite {
    /// Id of the queued operation backing this write.
    pub operation_id: String,
    /// Cached value before the mutation, if any.
    pub previous: Option<Value>,
    /// Value now in the cache.
    pub current: Value,
}

impl OptimisticCoordinator {
    #[must_use]
    pub fn new(cache: Arc<CacheStore>, queue: Arc<SyncQueue>) -> Self {
        Self { cache, queue }
    }

    /// Mutate the cached value under `cache_key` and enqueue `kind` for
    /// delivery to `target`.
    ///
    /// `mutator` receives the current cached value (if present and
    /// unexpired) and produces the new one. The cache is updated before
    /// the operation is enqueued, so readers observe the local state
    /// immediately, even offline.
    pub async fn perform_optimistic_write<F>(
        &self,
        cache_key: &str,
        ttl: Option<Duration>,
        mutator: F,
        target: impl Into<String>,
        kind: OperationKind,
    ) -> OptimisticWrite
    where
        F: FnOnce(Option<&Value>) -> Value,
    {
        let previous = self.cache.get(cache_key);
        let current = mutator(previous.as_ref());
        self.cache.set(cache_key, current.clone(), ttl);

        let operation_id = self.queue.enqueue(target, kind).await;
        debug!(key = cache_key, operation_id = %operation_id, "optimistic write applied");

        OptimisticWrite { operation_id, previous, current }
    }

    /// Undo an optimistic write: restore the prior cached value, or
    /// remove the entry if there was none.
    pub fn rollback(&self, cache_key: &str, write: &OptimisticWrite, ttl: Option<Duration>) {
        match &write.previous {
            Some(previous) => self.cache.set(cache_key, previous.clone(), ttl),
            None => {
                self.cache.delete(cache_key);
            }
        }
        debug!(key = cache_key, operation_id = %write.operation_id, "optimistic write rolled back");
    }
}
