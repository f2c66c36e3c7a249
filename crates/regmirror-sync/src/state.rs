//! # Shared State
//!
//! The installed set, the registry index and the sync status, owned by the
//! engine and handed to the dispatcher by `Arc`.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         SharedState                                     │
//! │                                                                         │
//! │   installed: RwLock<InstalledSet>   writers: Dispatcher (after reload)  │
//! │   index:     RwLock<RegistryIndex>  writers: SyncEngine (merge)         │
//! │   status:    RwLock<SyncStatus>     writers: SyncEngine                 │
//! │                                                                         │
//! │   Readers get clones; no lock is held across an await on I/O.           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;

use regmirror_core::{
    InstalledSet, PackageManifest, RegistryDelta, RegistryIndex, RegistryRecord, SyncWatermark,
};

// =============================================================================
// Sync Status
// =============================================================================

/// Current sync status for external queries.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SyncStatus {
    /// Completion time of the last successful fetch.
    pub last_sync: Option<DateTime<Utc>>,

    /// Error of the last failed fetch, cleared by the next success.
    pub last_error: Option<String>,

    /// Current watermark in epoch milliseconds.
    pub watermark: i64,

    /// Packages known to the index.
    pub indexed_count: usize,

    /// Packages installed locally.
    pub installed_count: usize,

    /// A sync run is executing.
    pub in_progress: bool,

    /// Auto-updates submitted since startup.
    pub updates_triggered: u64,
}

// =============================================================================
// Shared State
// =============================================================================

#[derive(Debug, Default)]
pub struct SharedState {
    installed: RwLock<InstalledSet>,
    index: RwLock<RegistryIndex>,
    status: RwLock<SyncStatus>,
}

impl SharedState {
    pub fn new(installed: InstalledSet, index: RegistryIndex) -> Self {
        SharedState {
            installed: RwLock::new(installed),
            index: RwLock::new(index),
            status: RwLock::new(SyncStatus::default()),
        }
    }

    // =========================================================================
    // Installed Set
    // =========================================================================

    pub async fn installed(&self) -> InstalledSet {
        self.installed.read().await.clone()
    }

    pub async fn installed_manifest(&self, name: &str) -> Option<PackageManifest> {
        self.installed.read().await.get(name).cloned()
    }

    /// Inserts or replaces the entry for `manifest.name`, returning the prior one.
    pub async fn replace_installed(&self, manifest: PackageManifest) -> Option<PackageManifest> {
        self.installed.write().await.insert(manifest)
    }

    // =========================================================================
    // Registry Index
    // =========================================================================

    pub async fn index(&self) -> RegistryIndex {
        self.index.read().await.clone()
    }

    pub async fn record(&self, name: &str) -> Option<RegistryRecord> {
        self.index.read().await.get(name).cloned()
    }

    pub async fn viewers(&self) -> Vec<(String, RegistryRecord)> {
        self.index
            .read()
            .await
            .viewers()
            .into_iter()
            .map(|(name, record)| (name.clone(), record.clone()))
            .collect()
    }

    pub async fn watermark(&self) -> SyncWatermark {
        self.index.read().await.watermark()
    }

    /// Merges a delta and returns the number of records written plus a
    /// snapshot of the merged index for persistence.
    pub async fn merge(&self, delta: &RegistryDelta) -> (usize, RegistryIndex) {
        let mut index = self.index.write().await;
        let merged = index.merge(delta);
        (merged, index.clone())
    }

    // =========================================================================
    // Status
    // =========================================================================

    /// Status with the live counts filled in.
    pub async fn status(&self) -> SyncStatus {
        let mut status = self.status.read().await.clone();
        {
            let index = self.index.read().await;
            status.indexed_count = index.len();
            status.watermark = index.watermark().millis();
        }
        status.installed_count = self.installed.read().await.len();
        status
    }

    pub(crate) async fn update_status<F>(&self, f: F)
    where
        F: FnOnce(&mut SyncStatus),
    {
        f(&mut *self.status.write().await);
    }
}
