//! In-memory durable store for tests and embedded use.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use super::{DurableStore, PersistError, QueueSnapshot};

/// Keeps the latest snapshot in memory. "Durable" only across queue
/// instances sharing the same store, which is exactly what restart tests
/// need.
#[derive(Default)]
pub struct MemoryStore {
    snapshot: Mutex<Option<QueueSnapshot>>,
    corrupt: AtomicBool,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent loads fail, simulating storage corruption.
    pub fn set_corrupt(&self, corrupt: bool) {
        self.corrupt.store(corrupt, Ordering::Release);
    }

    /// Number of operations in the held snapshot, if any.
    #[must_use]
    pub fn snapshot_len(&self) -> Option<usize> {
        self.snapshot.lock().as_ref().map(|s| s.operations.len())
    }
}

#[async_trait]
impl DurableStore for MemoryStore {
    async fn save(&self, snapshot: &QueueSnapshot) -> Result<(), PersistError> {
        *self.snapshot.lock() = Some(snapshot.clone());
        Ok(())
    }

    async fn load(&self) -> Result<Option<QueueSnapshot>, PersistError> {
        if self.corrupt.load(Ordering::Acquire) {
            return Err(PersistError::Io(std::io::Error::other(
                "simulated snapshot corruption",
            )));
        }
        Ok(self.snapshot.lock().clone())
    }
}
