// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! File-backed durable store.
//!
//! Writes the snapshot to a temporary sibling file and renames it into
//! place, so a crash mid-write leaves the previous snapshot intact.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::{DurableStore, PersistError, QueueSnapshot, SNAPSHOT_SCHEMA_VERSION};

/// JSON-document snapshot store on the local filesystem.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Path the snapshot lives at.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        PathBuf::from(tmp)
    }
}

#[async_trait]
impl DurableStore for JsonFileStore {
    async fn save(&self, snapshot: &QueueSnapshot) -> Result<(), PersistError> {
        let bytes = serde_json::to_vec(snapshot)?;
        let tmp = self.tmp_path();
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        debug!(
            path = %self.path.display(),
            operations = snapshot.operations.len(),
            "queue snapshot written"
        );
        Ok(())
    }

    async fn load(&self) -> Result<Option<QueueSnapshot>, PersistError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let snapshot: QueueSnapshot = serde_json::from_slice(&bytes)?;
        if snapshot.schema_version != SNAPSHOT_SCHEMA_VERSION {
            return Err(PersistError::Schema(snapshot.schema_version));
        }
        Ok(Some(snapshot))
    }
}
