//! # Validation Module
//!
//! Input validation for values that reach the filesystem or the registry.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Caller input (install/update/publish arguments)              │
//! │  └── THIS MODULE: rejected before any I/O                              │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Loaded data (manifests on disk, registry records)            │
//! │  └── THIS MODULE: invalid items skipped, batch continues               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use regmirror_core::validation::{validate_package_name, validate_password};
//!
//! validate_package_name("links-viewer").unwrap();
//! assert!(validate_package_name("../etc").is_err());
//! assert!(validate_password("a:b").is_err());
//! ```

use crate::error::ValidationError;
use crate::manifest::PackageManifest;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Longest package name the registry accepts.
pub const MAX_PACKAGE_NAME_LEN: usize = 214;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a package name supplied by a caller.
///
/// ## Rules
/// - Must not be empty
/// - At most 214 characters
/// - Must not contain path separators or be a relative path component,
///   since it names a directory under the packages root
pub fn validate_package_name(name: &str) -> ValidationResult<()> {
    let trimmed = name.trim();

    if trimmed.is_empty() {
        return Err(ValidationError::Required {
            field: "name".to_string(),
        });
    }

    if trimmed.len() > MAX_PACKAGE_NAME_LEN {
        return Err(ValidationError::TooLong {
            field: "name".to_string(),
            max: MAX_PACKAGE_NAME_LEN,
        });
    }

    if trimmed != name {
        return Err(ValidationError::InvalidFormat {
            field: "name".to_string(),
            reason: "leading or trailing whitespace".to_string(),
        });
    }

    if name == "." || name == ".." {
        return Err(ValidationError::InvalidFormat {
            field: "name".to_string(),
            reason: "relative path component".to_string(),
        });
    }

    for separator in ['/', '\\'] {
        if name.contains(separator) {
            return Err(ValidationError::ForbiddenCharacter {
                field: "name".to_string(),
                character: separator,
            });
        }
    }

    Ok(())
}

/// Validates a registry password.
///
/// The registry's basic-auth scheme splits on the first `:`, so a password
/// containing one can never authenticate.
pub fn validate_password(password: &str) -> ValidationResult<()> {
    if password.is_empty() {
        return Err(ValidationError::Required {
            field: "password".to_string(),
        });
    }

    if password.contains(':') {
        return Err(ValidationError::ForbiddenCharacter {
            field: "password".to_string(),
            character: ':',
        });
    }

    Ok(())
}

// =============================================================================
// Record Validators
// =============================================================================

/// Validates a manifest loaded from disk.
///
/// Only the name is required: a manifest without a name cannot be keyed
/// into the installed set.
pub fn validate_manifest(manifest: &PackageManifest) -> ValidationResult<()> {
    if manifest.name.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "name".to_string(),
        });
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
