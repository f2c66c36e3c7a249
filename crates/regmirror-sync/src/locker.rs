//! # Locker Collaborators
//!
//! The locker is the local service that indexes installed packages and
//! holds the connected GitHub account.
//!
//! ```text
//! GET {locker}/map/upsert?manifest={prefix}/{package}/package.json   (indexer)
//! GET {locker}/Me/github/getCurrent/profile  → [ { "login": ... } ]  (identity)
//! ```

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;
use url::Url;

use regmirror_core::{GithubProfile, MANIFEST_FILE};

use crate::capability::{IdentityProvider, PackageIndexer};
use crate::client::{build_client, join_segments};
use crate::config::{parse_http_url, MirrorConfig};
use crate::error::{SyncError, SyncResult};

// =============================================================================
// Indexer
// =============================================================================

/// [`PackageIndexer`] that asks the locker to upsert a manifest.
#[derive(Debug, Clone)]
pub struct LockerIndexer {
    client: reqwest::Client,
    base: Url,
    prefix: String,
}

impl LockerIndexer {
    pub fn from_config(config: &MirrorConfig) -> SyncResult<Self> {
        Ok(LockerIndexer {
            client: build_client(config.request_timeout())?,
            base: parse_http_url("locker.base_url", &config.locker.base_url)?,
            prefix: config.locker.manifest_prefix.trim_matches('/').to_string(),
        })
    }

    pub fn upsert_url(&self, package: &str) -> SyncResult<Url> {
        let mut url = join_segments(&self.base, &["map", "upsert"])?;
        let manifest = if self.prefix.is_empty() {
            format!("{}/{}", package, MANIFEST_FILE)
        } else {
            format!("{}/{}/{}", self.prefix, package, MANIFEST_FILE)
        };
        url.query_pairs_mut().append_pair("manifest", &manifest);
        Ok(url)
    }
}

#[async_trait]
impl PackageIndexer for LockerIndexer {
    async fn upsert(&self, package: &str) -> SyncResult<()> {
        let url = self.upsert_url(package)?;
        let response = self.client.get(url.clone()).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        debug!(package = %package, "Locker index updated");
        Ok(())
    }
}

// =============================================================================
// Identity
// =============================================================================

/// [`IdentityProvider`] backed by the locker's GitHub connector.
#[derive(Debug, Clone)]
pub struct LockerIdentity {
    client: reqwest::Client,
    base: Url,
}

impl LockerIdentity {
    pub fn from_config(config: &MirrorConfig) -> SyncResult<Self> {
        Ok(LockerIdentity {
            client: build_client(config.request_timeout())?,
            base: parse_http_url("locker.base_url", &config.locker.base_url)?,
        })
    }

    pub fn profile_url(&self) -> SyncResult<Url> {
        join_segments(&self.base, &["Me", "github", "getCurrent", "profile"])
    }
}

/// Extracts the profile from the connector's answer.
///
/// The answer must be a one-element array whose element has a non-empty
/// `login`; anything else means no account is connected.
pub fn profile_from_body(body: Value) -> Option<GithubProfile> {
    let mut items = match body {
        Value::Array(items) if items.len() == 1 => items,
        _ => return None,
    };

    let profile: GithubProfile = serde_json::from_value(items.pop()?).ok()?;
    if profile.login.trim().is_empty() {
        return None;
    }
    Some(profile)
}

#[async_trait]
impl IdentityProvider for LockerIdentity {
    async fn fetch_profile(&self) -> SyncResult<Option<GithubProfile>> {
        let url = self.profile_url()?;
        let response = self.client.get(url.clone()).send().await?;

        let status = response.status();
        if !status.is_success() {
            debug!(status = status.as_u16(), "Profile endpoint answered without a profile");
            return Ok(None);
        }

        let body: Value = response.json().await?;
        Ok(profile_from_body(body))
    }
}
