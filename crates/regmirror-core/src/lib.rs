//! # regmirror-core: Pure Domain Logic for the Registry Mirror
//!
//! This crate holds the types and rules shared by the store and the sync
//! engine, as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Registry Mirror Architecture                       │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    apps/regmirrord (daemon)                     │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    regmirror-sync                               │   │
//! │  │   Scanner ─► SyncEngine ─► UpdateQueue ─► Dispatcher            │   │
//! │  │                     ▲                                           │   │
//! │  │             PublishCoordinator                                  │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ regmirror-core (THIS CRATE) ★                   │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐   │   │
//! │  │   │ manifest  │  │ registry  │  │  policy   │  │ identity  │   │   │
//! │  │   │ Manifest  │  │ Index     │  │ semver    │  │ Auth      │   │   │
//! │  │   │ Installed │  │ Watermark │  │ decision  │  │ UserDoc   │   │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘   │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO CLOCK READS • PURE FUNCTIONS                      │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    regmirror-store                              │   │
//! │  │        registry.json, registry_auth.json, package.json          │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`manifest`] - Package manifests and the installed set
//! - [`registry`] - Registry records, the index, deltas and the watermark
//! - [`policy`] - Auto-update decision with semver comparison
//! - [`identity`] - Profile, registry credentials, user document
//! - [`validation`] - Input validation
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use regmirror_core::{evaluate_update, PackageManifest, RegistryRecord};
//!
//! let installed = PackageManifest::from_json(
//!     r#"{"name":"a","version":"1.0.0","repository":{"update":"auto"}}"#,
//! ).unwrap();
//! let record: RegistryRecord =
//!     serde_json::from_str(r#"{"dist-tags":{"latest":"1.1.0"}}"#).unwrap();
//!
//! assert!(evaluate_update(&installed, &record).should_update());
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod identity;
pub mod manifest;
pub mod policy;
pub mod registry;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use identity::{GithubProfile, RegistryAuth, UserDocument};
pub use manifest::{
    BootstrapOptions, InstalledSet, PackageManifest, Repository, RepositoryInfo, UpdateMode,
};
pub use policy::{evaluate_update, parse_version, UpdateDecision};
pub use registry::{RegistryDelta, RegistryIndex, RegistryRecord, SkippedEntry, SyncWatermark};

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// File name of a package manifest.
pub const MANIFEST_FILE: &str = "package.json";

/// File name of the persisted registry index.
pub const REGISTRY_FILE: &str = "registry.json";

/// File name of the persisted registry credentials.
pub const REGISTRY_AUTH_FILE: &str = "registry_auth.json";

/// Directory (under the installation root) holding installed packages.
pub const PACKAGES_DIR: &str = "node_modules";

/// Default interval between recurring syncs: one hour.
pub const DEFAULT_SYNC_INTERVAL_SECS: u64 = 3600;
