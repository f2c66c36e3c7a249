//! # Capabilities
//!
//! Everything the engine needs from the outside world, as narrow traits.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Trait              Production impl      Used by                        │
//! │  ─────────────────  ───────────────────  ─────────────────────────────  │
//! │  RegistryClient     HttpRegistry         SyncEngine, PublishCoordinator │
//! │  PackageInstaller   NpmCli               Dispatcher, PublishCoordinator │
//! │  PackageIndexer     LockerIndexer        Scanner                        │
//! │  IdentityProvider   LockerIdentity       IdentityCache                  │
//! │  PasswordDeriver    KeyedDigest          PublishCoordinator             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use async_trait::async_trait;
use std::path::Path;

use regmirror_core::{GithubProfile, RegistryAuth, RegistryDelta, SyncWatermark, UserDocument};

use crate::error::SyncResult;

/// The remote registry.
#[async_trait]
pub trait RegistryClient: Send + Sync {
    /// Every record modified at or after `since`.
    async fn fetch_since(&self, since: SyncWatermark) -> SyncResult<RegistryDelta>;

    /// Provisions a user and returns the raw HTTP status.
    async fn add_user(&self, user: &UserDocument) -> SyncResult<u16>;
}

/// The package tool.
#[async_trait]
pub trait PackageInstaller: Send + Sync {
    async fn install(&self, name: &str) -> SyncResult<()>;

    async fn update(&self, name: &str) -> SyncResult<()>;

    /// Bumps the patch version of the package in `dir`.
    async fn bump_patch(&self, dir: &Path) -> SyncResult<()>;

    async fn publish(&self, dir: &Path, auth: &RegistryAuth) -> SyncResult<()>;
}

/// Told about every manifest the scanner loads.
#[async_trait]
pub trait PackageIndexer: Send + Sync {
    /// `package` is the directory name under the packages directory.
    async fn upsert(&self, package: &str) -> SyncResult<()>;
}

/// Source of the connected account profile.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// `Ok(None)` when no account is connected.
    async fn fetch_profile(&self) -> SyncResult<Option<GithubProfile>>;
}

/// Derives the registry password from an email, reproducibly.
pub trait PasswordDeriver: Send + Sync {
    fn derive(&self, email: &str) -> String;
}

/// Indexer that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopIndexer;

#[async_trait]
impl PackageIndexer for NoopIndexer {
    async fn upsert(&self, _package: &str) -> SyncResult<()> {
        Ok(())
    }
}
