//! # regmirror-sync: Sync Engine for the Registry Mirror
//!
//! Keeps a local index of a remote package registry current, auto-updates
//! installed packages that opted in, and publishes local directories.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Sync Engine Architecture                         │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                  SyncEngine (Main Orchestrator)                  │  │
//! │  │                                                                  │  │
//! │  │  Timer task: sync now, then every interval                       │  │
//! │  │  fetch-since ─► merge ─► evaluate ─► persist                     │  │
//! │  └────────────────────────────┬─────────────────────────────────────┘  │
//! │                               │                                         │
//! │         ┌─────────────────────┼─────────────────────┐                  │
//! │         ▼                     ▼                     ▼                   │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────────────┐    │
//! │  │  HttpRegistry  │  │  UpdateQueue   │  │  Scanner               │    │
//! │  │                │  │                │  │                        │    │
//! │  │ since-query    │  │ one update per │  │ node_modules/*/        │    │
//! │  │ bounded retry  │  │ name in flight │  │ package.json           │    │
//! │  │ user PUT       │  │                │  │ → InstalledSet         │    │
//! │  └────────────────┘  └───────┬────────┘  └───────────▲────────────┘    │
//! │                              ▼                       │                  │
//! │                      ┌────────────────┐              │                  │
//! │                      │   Dispatcher   │──────────────┘                  │
//! │                      │ per-name lock  │   reload after every run        │
//! │                      │ NpmCli         │                                 │
//! │                      └────────────────┘                                 │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    PublishCoordinator                            │   │
//! │  │                                                                 │   │
//! │  │ IdentityCache (LockerIdentity) ─► registry credentials          │   │
//! │  │ ─► manifest ─► patch bump ─► publish ─► SyncEngine::sync()      │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! ### Engine
//! - [`engine`] - `SyncEngine`, timer handle and builder
//! - [`state`] - Shared installed set, index and status
//! - [`scanner`] - Installed package discovery
//! - [`dispatcher`] - Install/update with per-name locking
//! - [`queue`] - Background auto-updates
//! - [`publish`] - Publish chain
//!
//! ### Collaborators
//! - [`capability`] - Traits the engine depends on
//! - [`client`] - HTTP registry client
//! - [`locker`] - Locker indexer and identity endpoints
//! - [`installer`] - npm command-line driver
//! - [`identity`] - Profile cache and password derivation
//!
//! ### Ambient
//! - [`config`] - `MirrorConfig` (TOML + environment)
//! - [`error`] - Sync error types
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use regmirror_store::Store;
//! use regmirror_sync::{HttpRegistry, MirrorConfig, NpmCli, SyncEngine};
//!
//! let config = MirrorConfig::load_or_default(None);
//! let store = Store::open(config.layout()).await?;
//!
//! let engine = Arc::new(
//!     SyncEngine::builder(store)
//!         .with_registry(Arc::new(HttpRegistry::from_config(&config)?))
//!         .with_installer(Arc::new(NpmCli::from_config(&config)))
//!         .build()
//!         .await?,
//! );
//!
//! let handle = engine.spawn(config.sync_interval());
//! println!("Indexed: {}", engine.status().await.indexed_count);
//! handle.shutdown().await;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

// Engine
pub mod dispatcher;
pub mod engine;
pub mod publish;
pub mod queue;
pub mod scanner;
pub mod state;

// Collaborators
pub mod capability;
pub mod client;
pub mod identity;
pub mod installer;
pub mod locker;

// Ambient
pub mod config;
pub mod error;

#[cfg(test)]
pub(crate) mod testing;

// =============================================================================
// Re-exports
// =============================================================================

// Core types
pub use config::{
    InstallerSettings, LockerSettings, MirrorConfig, PathSettings, PublishSettings,
    RegistrySettings,
};
pub use engine::{SyncEngine, SyncEngineBuilder, SyncEngineHandle, SyncOutcome, SyncReport};
pub use error::{SyncError, SyncResult};
pub use state::{SharedState, SyncStatus};

// Updates and publishing
pub use dispatcher::{Action, Dispatcher};
pub use publish::{PublishCoordinator, PublishReport, PublishRequest, PublishStage};
pub use queue::UpdateQueue;
pub use scanner::Scanner;

// Collaborators
pub use capability::{
    IdentityProvider, NoopIndexer, PackageIndexer, PackageInstaller, PasswordDeriver,
    RegistryClient,
};
pub use client::HttpRegistry;
pub use identity::{IdentityCache, KeyedDigest};
pub use installer::NpmCli;
pub use locker::{LockerIdentity, LockerIndexer};
