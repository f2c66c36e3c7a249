//! # Store Handle
//!
//! One handle over an installation root, handing out the individual stores.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Store::open(layout)   ← creates root + packages dir                    │
//! │     │                                                                   │
//! │     ├── registry()   → RegistryCache   (registry.json)                  │
//! │     ├── auth()       → AuthStore       (registry_auth.json, secret)     │
//! │     └── manifests()  → ManifestStore   (<pkg>/package.json)             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use tracing::info;

use crate::atomic::ensure_dir;
use crate::auth::AuthStore;
use crate::cache::RegistryCache;
use crate::error::StoreResult;
use crate::layout::StoreLayout;
use crate::manifest::ManifestStore;

/// Handle over all local state of one installation root.
#[derive(Debug, Clone)]
pub struct Store {
    layout: StoreLayout,
    registry: RegistryCache,
    auth: AuthStore,
}

impl Store {
    /// Builds the handle without touching the filesystem.
    pub fn new(layout: StoreLayout) -> Self {
        Store {
            registry: RegistryCache::new(layout.registry_path()),
            auth: AuthStore::new(layout.auth_path(), layout.secret_path()),
            layout,
        }
    }

    /// Builds the handle and creates the root and packages directories.
    pub async fn open(layout: StoreLayout) -> StoreResult<Self> {
        ensure_dir(layout.root()).await?;
        ensure_dir(layout.packages_dir()).await?;

        info!(
            root = %layout.root().display(),
            packages = %layout.packages_dir().display(),
            "Store opened"
        );
        Ok(Store::new(layout))
    }

    pub fn layout(&self) -> &StoreLayout {
        &self.layout
    }

    pub fn registry(&self) -> &RegistryCache {
        &self.registry
    }

    pub fn auth(&self) -> &AuthStore {
        &self.auth
    }

    pub fn manifests(&self) -> ManifestStore {
        ManifestStore
    }
}
