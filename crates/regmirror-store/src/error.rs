//! # Store Error Types
//!
//! Error types for local state operations.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  std::io::Error / serde_json::Error / CoreError                        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  StoreError (this module) ← Adds the path and categorization           │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SyncError (regmirror-sync) ← What engine callers see                  │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::path::{Path, PathBuf};
use thiserror::Error;

use regmirror_core::{CoreError, ValidationError};

/// Local state operation errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// File does not exist.
    ///
    /// ## When This Occurs
    /// - Package directory has no manifest (install failed)
    /// - Credentials not provisioned yet
    #[error("{entity} not found at {}", path.display())]
    NotFound { entity: String, path: PathBuf },

    /// File exists but could not be read.
    #[error("Failed to read {}: {reason}", path.display())]
    ReadFailed { path: PathBuf, reason: String },

    /// File could not be written or swapped into place.
    #[error("Failed to write {}: {reason}", path.display())]
    WriteFailed { path: PathBuf, reason: String },

    /// File content is not what was expected.
    ///
    /// ## When This Occurs
    /// - Truncated or hand-edited JSON
    /// - Manifest without a name
    #[error("Failed to parse {}: {reason}", path.display())]
    ParseFailed { path: PathBuf, reason: String },

    /// Directory could not be created.
    #[error("Failed to create directory {}: {reason}", path.display())]
    CreateDirFailed { path: PathBuf, reason: String },

    /// Invalid input, rejected before touching the filesystem.
    #[error("Invalid input: {0}")]
    Invalid(#[from] ValidationError),
}

impl StoreError {
    /// Creates a NotFound error.
    pub fn not_found(entity: impl Into<String>, path: impl AsRef<Path>) -> Self {
        StoreError::NotFound {
            entity: entity.into(),
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Creates a ReadFailed error, mapping `NotFound` I/O errors to [`StoreError::NotFound`].
    pub fn read(entity: &str, path: impl AsRef<Path>, err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            return StoreError::not_found(entity, path);
        }
        StoreError::ReadFailed {
            path: path.as_ref().to_path_buf(),
            reason: err.to_string(),
        }
    }

    /// Creates a WriteFailed error.
    pub fn write(path: impl AsRef<Path>, reason: impl ToString) -> Self {
        StoreError::WriteFailed {
            path: path.as_ref().to_path_buf(),
            reason: reason.to_string(),
        }
    }

    /// Creates a ParseFailed error.
    pub fn parse(path: impl AsRef<Path>, reason: impl ToString) -> Self {
        StoreError::ParseFailed {
            path: path.as_ref().to_path_buf(),
            reason: reason.to_string(),
        }
    }

    /// Wraps a core error raised while decoding the file at `path`.
    pub fn from_core(path: impl AsRef<Path>, err: CoreError) -> Self {
        match err {
            CoreError::Validation(v) => StoreError::Invalid(v),
            other => StoreError::parse(path, other),
        }
    }

    /// Returns true if the file simply does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
