//! # Registry Cache
//!
//! Persists the [`RegistryIndex`] as `registry.json`.
//!
//! ## Failure Policy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  load()                                                                 │
//! │  ├── file absent        → empty index  (debug!)                         │
//! │  ├── unreadable/corrupt → empty index  (error!)                         │
//! │  └── ok                 → parsed index                                  │
//! │                                                                         │
//! │  persist()                                                              │
//! │  └── stage temp + fsync + rename  (see atomic.rs)                       │
//! │      errors returned; the engine logs them and carries on               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, error};

use regmirror_core::RegistryIndex;

use crate::atomic::write_atomic;
use crate::error::{StoreError, StoreResult};

/// Snapshot file for the registry index.
#[derive(Debug, Clone)]
pub struct RegistryCache {
    path: PathBuf,
}

impl RegistryCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        RegistryCache { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the snapshot. Never fails: missing or corrupt state is an empty index.
    pub async fn load(&self) -> RegistryIndex {
        match self.try_load().await {
            Ok(index) => {
                debug!(path = %self.path.display(), entries = index.len(), "Registry snapshot loaded");
                index
            }
            Err(e) if e.is_not_found() => {
                debug!(path = %self.path.display(), "No registry snapshot, starting empty");
                RegistryIndex::new()
            }
            Err(e) => {
                error!(path = %self.path.display(), error = %e, "Registry snapshot unusable, starting empty");
                RegistryIndex::new()
            }
        }
    }

    /// Loads the snapshot, surfacing errors.
    pub async fn try_load(&self) -> StoreResult<RegistryIndex> {
        let raw = fs::read_to_string(&self.path)
            .await
            .map_err(|e| StoreError::read("registry snapshot", &self.path, e))?;

        RegistryIndex::from_json(&raw).map_err(|e| StoreError::from_core(&self.path, e))
    }

    /// Atomically replaces the snapshot with `index`.
    pub async fn persist(&self, index: &RegistryIndex) -> StoreResult<()> {
        let json = index.to_json().map_err(|e| StoreError::write(&self.path, e))?;
        write_atomic(&self.path, json.as_bytes()).await?;

        debug!(path = %self.path.display(), entries = index.len(), "Registry snapshot persisted");
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
