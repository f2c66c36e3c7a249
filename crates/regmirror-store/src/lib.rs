//! # regmirror-store: Local State for the Registry Mirror
//!
//! Every file the mirror keeps under its installation root goes through
//! this crate.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Registry Mirror Data Flow                          │
//! │                                                                         │
//! │  SyncEngine (regmirror-sync)                                           │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 regmirror-store (THIS CRATE)                    │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐   │   │
//! │  │   │    Store      │    │    Stores     │    │   atomic     │   │   │
//! │  │   │  (store.rs)   │    │               │    │              │   │   │
//! │  │   │               │    │ RegistryCache │    │ stage        │   │   │
//! │  │   │ StoreLayout   │◄───│ AuthStore     │───►│ fsync        │   │   │
//! │  │   │ open()        │    │ ManifestStore │    │ rename       │   │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘   │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  <root>/registry.json, registry_auth.json, node_modules/*/package.json │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`store`] - Store handle over one installation root
//! - [`layout`] - Path layout
//! - [`cache`] - Registry index snapshot
//! - [`auth`] - Registry credentials and installation secret
//! - [`manifest`] - Manifest files
//! - [`atomic`] - Temp + fsync + rename writes
//! - [`error`] - Store error types
//!
//! ## Usage
//!
//! ```rust,ignore
//! use regmirror_store::{Store, StoreLayout};
//!
//! let store = Store::open(StoreLayout::new("/srv/mirror")).await?;
//! let index = store.registry().load().await;
//! store.registry().persist(&index).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod atomic;
pub mod auth;
pub mod cache;
pub mod error;
pub mod layout;
pub mod manifest;
pub mod store;

// =============================================================================
// Re-exports
// =============================================================================

pub use atomic::{ensure_dir, write_atomic, StagedFile};
pub use auth::AuthStore;
pub use cache::RegistryCache;
pub use error::{StoreError, StoreResult};
pub use layout::{StoreLayout, SECRET_FILE};
pub use manifest::ManifestStore;
pub use store::Store;
