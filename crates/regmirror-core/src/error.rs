//! # Error Types
//!
//! Domain-specific error types for regmirror-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  regmirror-core errors (this file)                                     │
//! │  ├── CoreError        - Domain rule failures                           │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  regmirror-store errors (separate crate)                               │
//! │  └── StoreError       - Filesystem state failures                      │
//! │                                                                         │
//! │  regmirror-sync errors (separate crate)                                │
//! │  └── SyncError        - What callers of the engine see                 │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → StoreError/SyncError → caller     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core domain errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A version string could not be read as semver.
    ///
    /// ## When This Occurs
    /// - Installed manifest carries a non-semver `version`
    /// - Registry record carries a malformed `dist-tags.latest`
    #[error("Invalid version '{value}': {reason}")]
    InvalidVersion { value: String, reason: String },

    /// A registry record could not be decoded.
    #[error("Invalid registry record for {name}: {reason}")]
    InvalidRecord { name: String, reason: String },

    /// A manifest could not be decoded or encoded.
    #[error("Invalid manifest: {0}")]
    InvalidManifest(String),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised before any I/O happens, so a rejected call has no side effects.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Field contains a character that is not allowed.
    #[error("{field} must not contain '{character}'")]
    ForbiddenCharacter { field: String, character: char },

    /// Invalid format (e.g., path-like package name).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
