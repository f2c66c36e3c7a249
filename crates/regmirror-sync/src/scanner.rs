//! # Local Package Scanner
//!
//! Builds the installed set from the packages directory.
//!
//! ```text
//! node_modules/
//! ├── links/package.json      ─┐
//! ├── photos/package.json      ├─ loaded concurrently (join_all)
//! ├── broken/package.json  ✗   │  invalid → warn!, skipped
//! ├── .bin/                    │  no manifest → skipped
//! └── notes/package.json      ─┘
//!                              │
//!                              ▼
//!                        InstalledSet { links, photos, notes }
//! ```

use futures_util::future::join_all;
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, info, warn};

use regmirror_core::validation::validate_package_name;
use regmirror_core::{InstalledSet, PackageManifest};
use regmirror_store::{ensure_dir, ManifestStore, StoreError, StoreLayout};

use crate::capability::PackageIndexer;
use crate::error::{SyncError, SyncResult};

pub struct Scanner {
    layout: StoreLayout,
    manifests: ManifestStore,
    indexer: Arc<dyn PackageIndexer>,
}

impl Scanner {
    pub fn new(layout: StoreLayout, indexer: Arc<dyn PackageIndexer>) -> Self {
        Scanner {
            layout,
            manifests: ManifestStore,
            indexer,
        }
    }

    pub fn layout(&self) -> &StoreLayout {
        &self.layout
    }

    /// Loads every installed package.
    ///
    /// Creates the packages directory if missing. Fails only if the
    /// directory itself cannot be created or listed.
    pub async fn scan(&self) -> SyncResult<InstalledSet> {
        let dir = self.layout.packages_dir();
        ensure_dir(dir).await?;

        let mut entries = fs::read_dir(dir)
            .await
            .map_err(|e| StoreError::read("packages directory", dir, e))?;

        let mut candidates = Vec::new();
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    warn!(dir = %dir.display(), error = %e, "Stopped listing packages early");
                    break;
                }
            };

            let is_dir = entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
            if !is_dir {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if !self.manifests.exists(&entry.path()).await {
                debug!(dir = %name, "No manifest, skipping");
                continue;
            }
            candidates.push(name);
        }

        let loads = candidates.iter().map(|name| self.load_package(name));
        let results = join_all(loads).await;

        let mut installed = InstalledSet::new();
        for (name, result) in candidates.iter().zip(results) {
            match result {
                Ok(manifest) => {
                    installed.insert(manifest);
                }
                Err(e) => warn!(dir = %name, error = %e, "Skipping package with unusable manifest"),
            }
        }

        info!(count = installed.len(), "Installed packages scanned");
        Ok(installed)
    }

    /// Reads one package's manifest and tells the indexer about it.
    ///
    /// Indexer failures are logged and do not fail the load.
    pub async fn load_package(&self, dir_name: &str) -> SyncResult<PackageManifest> {
        validate_package_name(dir_name)
            .map_err(|e| SyncError::InvalidArgument(format!("{}: {}", dir_name, e)))?;

        let manifest = self.manifests.read(&self.layout.package_dir(dir_name)).await?;

        if let Err(e) = self.indexer.upsert(dir_name).await {
            warn!(package = %dir_name, error = %e, "Indexer notification failed");
        }

        debug!(package = %manifest.name, version = %manifest.version, "Package loaded");
        Ok(manifest)
    }
}

impl std::fmt::Debug for Scanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scanner").field("layout", &self.layout).finish_non_exhaustive()
    }
}
