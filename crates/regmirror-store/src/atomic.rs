//! # Atomic File Replacement
//!
//! Every file the store writes goes through here.
//!
//! ## Write Protocol
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  1. stage   write `.registry.json.<uuid>.tmp` in the SAME directory     │
//! │             flush + fsync                                               │
//! │                 │                                                       │
//! │                 │   crash here → target untouched, temp file orphaned   │
//! │                 ▼                                                       │
//! │  2. commit  rename(temp, target)  (atomic on one filesystem)            │
//! │             fsync parent directory (unix)                               │
//! │                                                                         │
//! │  A reader sees either the old file or the new file, never a prefix.     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};

/// Prefix/suffix of staged temp files, so loaders can recognise strays.
const TEMP_SUFFIX: &str = ".tmp";

// =============================================================================
// Staged File
// =============================================================================

/// A fully written temp file waiting to be swapped over its target.
#[derive(Debug)]
pub struct StagedFile {
    temp: PathBuf,
    target: PathBuf,
}

impl StagedFile {
    /// Writes `contents` to a temp file beside `target` and fsyncs it.
    pub async fn stage(target: &Path, contents: &[u8]) -> StoreResult<Self> {
        let temp = temp_path_for(target)?;

        if let Err(e) = write_and_sync(&temp, contents).await {
            let _ = fs::remove_file(&temp).await;
            return Err(StoreError::write(target, e));
        }

        Ok(StagedFile {
            temp,
            target: target.to_path_buf(),
        })
    }

    /// Path of the temp file.
    pub fn temp_path(&self) -> &Path {
        &self.temp
    }

    /// Renames the temp file over the target.
    pub async fn commit(self) -> StoreResult<()> {
        if let Err(e) = fs::rename(&self.temp, &self.target).await {
            let _ = fs::remove_file(&self.temp).await;
            return Err(StoreError::write(&self.target, e));
        }

        sync_parent(&self.target).await;
        debug!(path = %self.target.display(), "File replaced atomically");
        Ok(())
    }

    /// Removes the temp file without touching the target.
    pub async fn discard(self) {
        if let Err(e) = fs::remove_file(&self.temp).await {
            warn!(path = %self.temp.display(), error = %e, "Failed to remove staged file");
        }
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Writes `contents` to `target` atomically (stage + commit).
pub async fn write_atomic(target: &Path, contents: &[u8]) -> StoreResult<()> {
    StagedFile::stage(target, contents).await?.commit().await
}

/// Creates a directory and its parents if missing.
pub async fn ensure_dir(path: &Path) -> StoreResult<()> {
    fs::create_dir_all(path)
        .await
        .map_err(|e| StoreError::CreateDirFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
}

/// Returns true if `file_name` looks like a staged temp file.
pub fn is_temp_file(file_name: &str) -> bool {
    file_name.starts_with('.') && file_name.ends_with(TEMP_SUFFIX)
}

fn temp_path_for(target: &Path) -> StoreResult<PathBuf> {
    let file_name = target
        .file_name()
        .ok_or_else(|| StoreError::write(target, "path has no file name"))?;

    let parent = target
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    Ok(parent.join(format!(
        ".{}.{}{}",
        file_name.to_string_lossy(),
        Uuid::new_v4().simple(),
        TEMP_SUFFIX
    )))
}

async fn write_and_sync(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let mut file = fs::File::create(path).await?;
    file.write_all(contents).await?;
    file.flush().await?;
    file.sync_all().await?;
    Ok(())
}

#[cfg(unix)]
async fn sync_parent(target: &Path) {
    if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
        if let Ok(dir) = fs::File::open(parent).await {
            let _ = dir.sync_all().await;
        }
    }
}

#[cfg(not(unix))]
async fn sync_parent(_target: &Path) {}

// =============================================================================
// Unit Tests
// =============================================================================
