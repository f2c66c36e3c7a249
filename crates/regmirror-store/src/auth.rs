//! # Credential Store
//!
//! `registry_auth.json` (created once per installation root and reused) and
//! the secret used to derive the publish password.

use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};
use uuid::Uuid;

use regmirror_core::RegistryAuth;

use crate::atomic::write_atomic;
use crate::error::{StoreError, StoreResult};

/// Registry credentials and the password secret.
#[derive(Debug, Clone)]
pub struct AuthStore {
    auth_path: PathBuf,
    secret_path: PathBuf,
}

impl AuthStore {
    pub fn new(auth_path: impl Into<PathBuf>, secret_path: impl Into<PathBuf>) -> Self {
        AuthStore {
            auth_path: auth_path.into(),
            secret_path: secret_path.into(),
        }
    }

    pub fn auth_path(&self) -> &Path {
        &self.auth_path
    }

    /// Loads persisted credentials; `Ok(None)` when not provisioned yet.
    pub async fn load(&self) -> StoreResult<Option<RegistryAuth>> {
        let raw = match fs::read_to_string(&self.auth_path).await {
            Ok(raw) => raw,
            Err(e) => {
                let err = StoreError::read("registry credentials", &self.auth_path, e);
                if err.is_not_found() {
                    return Ok(None);
                }
                return Err(err);
            }
        };

        let auth = serde_json::from_str(&raw).map_err(|e| StoreError::parse(&self.auth_path, e))?;
        Ok(Some(auth))
    }

    /// Persists credentials atomically.
    pub async fn save(&self, auth: &RegistryAuth) -> StoreResult<()> {
        let json =
            serde_json::to_string_pretty(auth).map_err(|e| StoreError::write(&self.auth_path, e))?;
        write_atomic(&self.auth_path, json.as_bytes()).await?;

        info!(username = %auth.username, "Registry credentials saved");
        Ok(())
    }

    /// Returns the installation secret, creating it on first use.
    pub async fn load_or_create_secret(&self) -> StoreResult<String> {
        match fs::read_to_string(&self.secret_path).await {
            Ok(raw) if !raw.trim().is_empty() => return Ok(raw.trim().to_string()),
            Ok(_) => debug!(path = %self.secret_path.display(), "Secret file empty, regenerating"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(StoreError::read("secret", &self.secret_path, e)),
        }

        let secret = Uuid::new_v4().simple().to_string();
        write_atomic(&self.secret_path, secret.as_bytes()).await?;
        debug!(path = %self.secret_path.display(), "Installation secret created");
        Ok(secret)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(dir: &Path) -> AuthStore {
        AuthStore::new(dir.join("registry_auth.json"), dir.join(".regmirror_secret"))
    }

    #[tokio::test]
    async fn test_load_absent_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(store(dir.path()).load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let auth = RegistryAuth::basic("octocat", "secret").unwrap();

        store.save(&auth).await.unwrap();
        assert_eq!(store.load().await.unwrap(), Some(auth));

        let raw = fs::read_to_string(store.auth_path()).await.unwrap();
        assert!(raw.contains("\"_auth\""));
    }

    #[tokio::test]
    async fn test_corrupt_auth_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        fs::write(store.auth_path(), b"not json").await.unwrap();
        assert!(matches!(
            store.load().await,
            Err(StoreError::ParseFailed { .. })
        ));
    }

    #[tokio::test]
    async fn test_secret_is_stable() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());

        let first = store.load_or_create_secret().await.unwrap();
        let second = store.load_or_create_secret().await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 32);
    }
}
