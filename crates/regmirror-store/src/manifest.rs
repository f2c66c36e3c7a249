//! # Manifest Files
//!
//! Reads and writes `package.json` files.

use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

use regmirror_core::validation::validate_manifest;
use regmirror_core::{PackageManifest, MANIFEST_FILE};

use crate::atomic::write_atomic;
use crate::error::{StoreError, StoreResult};

/// Manifest file access.
#[derive(Debug, Clone, Copy, Default)]
pub struct ManifestStore;

impl ManifestStore {
    /// Manifest path inside a package directory.
    pub fn path_in(dir: &Path) -> PathBuf {
        dir.join(MANIFEST_FILE)
    }

    /// Returns true if `dir` contains a manifest file.
    pub async fn exists(&self, dir: &Path) -> bool {
        fs::metadata(Self::path_in(dir))
            .await
            .map(|m| m.is_file())
            .unwrap_or(false)
    }

    /// Reads, parses and validates the manifest in `dir`.
    pub async fn read(&self, dir: &Path) -> StoreResult<PackageManifest> {
        let path = Self::path_in(dir);
        let raw = fs::read_to_string(&path)
            .await
            .map_err(|e| StoreError::read("manifest", &path, e))?;

        let manifest = PackageManifest::from_json(&raw).map_err(|e| StoreError::from_core(&path, e))?;
        validate_manifest(&manifest).map_err(|e| StoreError::parse(&path, e))?;

        Ok(manifest)
    }

    /// Writes the manifest into `dir` atomically.
    pub async fn write(&self, dir: &Path, manifest: &PackageManifest) -> StoreResult<PathBuf> {
        let path = Self::path_in(dir);
        let json = manifest
            .to_json_pretty()
            .map_err(|e| StoreError::write(&path, e))?;
        write_atomic(&path, json.as_bytes()).await?;

        debug!(path = %path.display(), package = %manifest.name, "Manifest written");
        Ok(path)
    }
}
