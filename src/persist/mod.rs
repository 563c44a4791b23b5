//! Durable snapshots of the pending-operation queue.
//!
//! The queue persists its live set wholesale after every mutation batch;
//! the snapshot is a mirror with no independent authority. On startup the
//! snapshot is loaded back, and any operation still marked in-flight is
//! rewritten to pending, because an in-flight network call cannot have
//! survived a process restart.
//!
//! Durability is best-effort: a snapshot that fails to deserialize (or
//! carries an unknown schema version) is discarded entirely and the queue
//! starts empty, with the failure logged.

mod json_file;
mod memory;

pub use json_file::JsonFileStore;
pub use memory::MemoryStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::operation::{OperationStatus, SyncOperation};

/// Current snapshot document schema. Loading any other version is treated
/// as corruption.
pub const SNAPSHOT_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("snapshot I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("snapshot serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("unrecognized snapshot schema version {0}")]
    Schema(u32),
}

/// The persisted queue document: an ordered list of operations under a
/// single well-known storage key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueSnapshot {
    pub schema_version: u32,
    pub operations: Vec<SyncOperation>,
}

impl QueueSnapshot {
    #[must_use]
    pub fn new(operations: Vec<SyncOperation>) -> Self {
        Self {
            schema_version: SNAPSHOT_SCHEMA_VERSION,
            operations,
        }
    }

    /// Rewrite any in-flight operation to pending. Called on every load;
    /// see the module docs for why in-flight never survives a restart.
    #[must_use]
    pub fn restore_pending(mut self) -> Self {
        for op in &mut self.operations {
            if op.status == OperationStatus::InFlight {
                op.status = OperationStatus::Pending;
            }
        }
        self
    }
}

/// Durable local storage surviving process restart. Implementations
/// replace the prior snapshot wholesale; there is no incremental append.
#[async_trait]
pub trait DurableStore: Send + Sync {
    async fn save(&self, snapshot: &QueueSnapshot) -> Result<(), PersistError>;
    /// `Ok(None)` means no snapshot has ever been saved.
    async fn load(&self) -> Result<Option<QueueSnapshot>, PersistError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::OperationKind;
    use serde_json::json;

    fn pending_op(target: &str) -> SyncOperation {
        SyncOperation::new(target, OperationKind::Create { payload: json!({"n": 1}) })
    }

    #[test]
    fn test_restore_pending_rewrites_in_flight() {
        let mut op = pending_op("products");
        op.status = OperationStatus::InFlight;
        let snapshot = QueueSnapshot::new(vec![op, pending_op("orders")]);

        let restored = snapshot.restore_pending();

        assert!(restored
            .operations
            .iter()
            .all(|op| op.status == OperationStatus::Pending));
    }

    #[test]
    fn test_snapshot_roundtrip() {
        let snapshot = QueueSnapshot::new(vec![pending_op("products")]);

        let bytes = serde_json::to_vec(&snapshot).unwrap();
        let back: QueueSnapshot = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(back.schema_version, SNAPSHOT_SCHEMA_VERSION);
        assert_eq!(back.operations.len(), 1);
        assert_eq!(back.operations[0].id, snapshot.operations[0].id);
    }
}
