//! # Identity
//!
//! The connected account, cached for the life of the process, and the
//! derivation of the registry password from it.
//!
//! ## Profile Cache
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  get()                                                                  │
//! │   ├── read lock: cached? ──────────────────────────► return it          │
//! │   └── write lock: cached now? (another task won) ──► return it          │
//! │         └── provider.fetch_profile()                                    │
//! │               ├── Some(profile) → cache, return                         │
//! │               └── None / Err    → NOT cached, next get() asks again     │
//! │                                                                         │
//! │  invalidate() → clear, next get() asks the provider                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use sha2::{Digest, Sha256};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use regmirror_core::GithubProfile;
use regmirror_store::AuthStore;

use crate::capability::{IdentityProvider, PasswordDeriver};
use crate::error::SyncResult;

// =============================================================================
// Identity Cache
// =============================================================================

/// Memoizes the first profile the provider returns.
pub struct IdentityCache {
    provider: Arc<dyn IdentityProvider>,
    profile: RwLock<Option<GithubProfile>>,
}

impl IdentityCache {
    pub fn new(provider: Arc<dyn IdentityProvider>) -> Self {
        IdentityCache {
            provider,
            profile: RwLock::new(None),
        }
    }

    /// Returns the connected profile, asking the provider at most once
    /// until it succeeds.
    pub async fn get(&self) -> SyncResult<Option<GithubProfile>> {
        {
            let guard = self.profile.read().await;
            if let Some(profile) = guard.as_ref() {
                return Ok(Some(profile.clone()));
            }
        }

        let mut guard = self.profile.write().await;

        // Double-check after acquiring write lock
        if let Some(profile) = guard.as_ref() {
            return Ok(Some(profile.clone()));
        }

        match self.provider.fetch_profile().await? {
            Some(profile) => {
                info!(login = %profile.login, "Connected account loaded");
                *guard = Some(profile.clone());
                Ok(Some(profile))
            }
            None => {
                debug!("No connected account");
                Ok(None)
            }
        }
    }

    /// Cached profile, without asking the provider.
    pub async fn cached(&self) -> Option<GithubProfile> {
        self.profile.read().await.clone()
    }

    /// Drops the cached profile.
    pub async fn invalidate(&self) {
        *self.profile.write().await = None;
        debug!("Connected account cache cleared");
    }
}

impl std::fmt::Debug for IdentityCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityCache").finish_non_exhaustive()
    }
}

// =============================================================================
// Password Derivation
// =============================================================================

/// Hex SHA-256 of `secret || email`.
///
/// The secret is created once per installation root, so the password can be
/// regenerated locally but not guessed from the email alone. Hex output
/// never contains `:`.
#[derive(Clone)]
pub struct KeyedDigest {
    secret: String,
}

impl KeyedDigest {
    pub fn new(secret: impl Into<String>) -> Self {
        KeyedDigest {
            secret: secret.into(),
        }
    }

    /// Uses the installation secret, creating it on first use.
    pub async fn from_store(auth: &AuthStore) -> SyncResult<Self> {
        Ok(Self::new(auth.load_or_create_secret().await?))
    }
}

impl PasswordDeriver for KeyedDigest {
    fn derive(&self, email: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.secret.as_bytes());
        hasher.update(email.as_bytes());
        hex::encode(hasher.finalize())
    }
}

impl std::fmt::Debug for KeyedDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyedDigest").field("secret", &"<redacted>").finish()
    }
}
