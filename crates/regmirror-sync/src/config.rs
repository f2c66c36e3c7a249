//! # Mirror Configuration
//!
//! Configuration management for the mirror daemon and engine.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     REGMIRROR_ROOT=/srv/mirror                                         │
//! │     REGMIRROR_REGISTRY_URL=http://registry.example.com/npm             │
//! │     REGMIRROR_LOCKER_URL=http://localhost:8042                         │
//! │     REGMIRROR_SYNC_INTERVAL_SECS=600                                   │
//! │     REGMIRROR_NPM=/usr/local/bin/npm                                   │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/regmirror/mirror.toml (Linux)                            │
//! │     ~/Library/Application Support/org.regmirror.regmirror/mirror.toml  │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # mirror.toml
//! [paths]
//! root = "/srv/mirror"
//! packages_dir = "node_modules"
//!
//! [registry]
//! base_url = "http://registry.singly.com/npm"
//! sync_interval_secs = 3600
//! request_timeout_secs = 30
//! fetch_max_elapsed_secs = 60
//!
//! [locker]
//! base_url = "http://localhost:8042"
//! manifest_prefix = "Me/node_modules"
//!
//! [publish]
//! accepted_statuses = [200, 201, 409]
//!
//! [installer]
//! program = "npm"
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use regmirror_core::{DEFAULT_SYNC_INTERVAL_SECS, PACKAGES_DIR};
use regmirror_store::StoreLayout;

use crate::error::{SyncError, SyncResult};

// =============================================================================
// Paths
// =============================================================================

/// Where the installation root lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathSettings {
    /// Installation root holding `registry.json` and the packages directory.
    #[serde(default = "default_root")]
    pub root: PathBuf,

    /// Packages directory, relative to the root unless absolute.
    #[serde(default = "default_packages_dir")]
    pub packages_dir: PathBuf,
}

fn default_root() -> PathBuf {
    directories::ProjectDirs::from("org", "regmirror", "regmirror")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

fn default_packages_dir() -> PathBuf {
    PathBuf::from(PACKAGES_DIR)
}

impl Default for PathSettings {
    fn default() -> Self {
        PathSettings {
            root: default_root(),
            packages_dir: default_packages_dir(),
        }
    }
}

// =============================================================================
// Registry
// =============================================================================

/// Remote registry settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrySettings {
    /// Registry base URL (the npm registry root).
    #[serde(default = "default_registry_url")]
    pub base_url: String,

    /// Interval between recurring syncs (seconds).
    #[serde(default = "default_sync_interval")]
    pub sync_interval_secs: u64,

    /// Per-request timeout (seconds).
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Total time budget for retrying one fetch (seconds).
    /// Set to 0 to disable retries.
    #[serde(default = "default_fetch_max_elapsed")]
    pub fetch_max_elapsed_secs: u64,
}

fn default_registry_url() -> String {
    "http://registry.singly.com/npm".to_string()
}

fn default_sync_interval() -> u64 {
    DEFAULT_SYNC_INTERVAL_SECS
}

fn default_request_timeout() -> u64 {
    30
}

fn default_fetch_max_elapsed() -> u64 {
    60
}

impl Default for RegistrySettings {
    fn default() -> Self {
        RegistrySettings {
            base_url: default_registry_url(),
            sync_interval_secs: default_sync_interval(),
            request_timeout_secs: default_request_timeout(),
            fetch_max_elapsed_secs: default_fetch_max_elapsed(),
        }
    }
}

// =============================================================================
// Locker
// =============================================================================

/// Settings for the local service that indexes packages and owns the profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockerSettings {
    /// Base URL of the locker service.
    #[serde(default = "default_locker_url")]
    pub base_url: String,

    /// Prefix under which the locker sees the packages directory.
    #[serde(default = "default_manifest_prefix")]
    pub manifest_prefix: String,
}

fn default_locker_url() -> String {
    "http://localhost:8042".to_string()
}

fn default_manifest_prefix() -> String {
    "Me/node_modules".to_string()
}

impl Default for LockerSettings {
    fn default() -> Self {
        LockerSettings {
            base_url: default_locker_url(),
            manifest_prefix: default_manifest_prefix(),
        }
    }
}

// =============================================================================
// Publish & Installer
// =============================================================================

/// Publish settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishSettings {
    /// Status codes of the user-provisioning PUT that count as success.
    /// 409 means the user already exists.
    #[serde(default = "default_accepted_statuses")]
    pub accepted_statuses: Vec<u16>,
}

fn default_accepted_statuses() -> Vec<u16> {
    vec![200, 201, 409]
}

impl Default for PublishSettings {
    fn default() -> Self {
        PublishSettings {
            accepted_statuses: default_accepted_statuses(),
        }
    }
}

impl PublishSettings {
    pub fn accepts(&self, status: u16) -> bool {
        self.accepted_statuses.contains(&status)
    }
}

/// Package tool settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallerSettings {
    /// Program used for install, update, version and publish.
    #[serde(default = "default_program")]
    pub program: String,
}

fn default_program() -> String {
    "npm".to_string()
}

impl Default for InstallerSettings {
    fn default() -> Self {
        InstallerSettings {
            program: default_program(),
        }
    }
}

// =============================================================================
// Main Configuration
// =============================================================================

/// Complete mirror configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MirrorConfig {
    #[serde(default)]
    pub paths: PathSettings,

    #[serde(default)]
    pub registry: RegistrySettings,

    #[serde(default)]
    pub locker: LockerSettings,

    #[serde(default)]
    pub publish: PublishSettings,

    #[serde(default)]
    pub installer: InstallerSettings,
}

impl MirrorConfig {
    /// Creates a config with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (mirror.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> SyncResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading mirror config from file");
                let contents = std::fs::read_to_string(&path)
                    .map_err(|e| SyncError::ConfigLoadFailed(format!("{}: {}", path.display(), e)))?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load mirror config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> SyncResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| SyncError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| SyncError::ConfigSaveFailed(e.to_string()))?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents).map_err(|e| SyncError::ConfigSaveFailed(e.to_string()))?;

        info!(?path, "Mirror config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> SyncResult<()> {
        parse_http_url("registry.base_url", &self.registry.base_url)?;
        parse_http_url("locker.base_url", &self.locker.base_url)?;

        if self.registry.sync_interval_secs == 0 {
            return Err(SyncError::InvalidConfig(
                "sync_interval_secs must be greater than 0".into(),
            ));
        }

        if self.registry.request_timeout_secs == 0 {
            return Err(SyncError::InvalidConfig(
                "request_timeout_secs must be greater than 0".into(),
            ));
        }

        if self.publish.accepted_statuses.is_empty() {
            return Err(SyncError::InvalidConfig(
                "accepted_statuses must list at least one status".into(),
            ));
        }

        if self.installer.program.trim().is_empty() {
            return Err(SyncError::InvalidConfig("installer program is empty".into()));
        }

        if self.paths.root.as_os_str().is_empty() {
            return Err(SyncError::InvalidConfig("paths.root is empty".into()));
        }

        Ok(())
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(root) = std::env::var("REGMIRROR_ROOT") {
            debug!(root = %root, "Overriding root from environment");
            self.paths.root = PathBuf::from(root);
        }

        if let Ok(url) = std::env::var("REGMIRROR_REGISTRY_URL") {
            debug!(url = %url, "Overriding registry URL from environment");
            self.registry.base_url = url;
        }

        if let Ok(url) = std::env::var("REGMIRROR_LOCKER_URL") {
            debug!(url = %url, "Overriding locker URL from environment");
            self.locker.base_url = url;
        }

        if let Ok(interval) = std::env::var("REGMIRROR_SYNC_INTERVAL_SECS") {
            match interval.parse::<u64>() {
                Ok(secs) => self.registry.sync_interval_secs = secs,
                Err(_) => warn!(value = %interval, "Ignoring invalid REGMIRROR_SYNC_INTERVAL_SECS"),
            }
        }

        if let Ok(program) = std::env::var("REGMIRROR_NPM") {
            self.installer.program = program;
        }
    }

    /// Returns the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("org", "regmirror", "regmirror")
            .map(|dirs| dirs.config_dir().join("mirror.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    /// Store layout for the configured root.
    pub fn layout(&self) -> StoreLayout {
        StoreLayout::new(&self.paths.root).with_packages_dir(&self.paths.packages_dir)
    }

    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.registry.sync_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.registry.request_timeout_secs)
    }

    /// Retry budget for one fetch; `None` disables retries.
    pub fn fetch_max_elapsed(&self) -> Option<Duration> {
        match self.registry.fetch_max_elapsed_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

/// Parses an http(s) URL, naming the offending field on failure.
pub(crate) fn parse_http_url(field: &str, raw: &str) -> SyncResult<Url> {
    let url = Url::parse(raw).map_err(|e| SyncError::InvalidUrl(format!("{}: {} ({})", field, raw, e)))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(SyncError::InvalidUrl(format!(
            "{} must be http:// or https://, got {}://",
            field, other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = MirrorConfig::default();
        assert_eq!(config.registry.sync_interval_secs, 3600);
        assert_eq!(config.publish.accepted_statuses, vec![200, 201, 409]);
        assert_eq!(config.installer.program, "npm");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = MirrorConfig::default();

        config.registry.base_url = "ftp://registry".into();
        assert!(config.validate().unwrap_err().is_config_error());

        config.registry.base_url = "not a url".into();
        assert!(config.validate().is_err());

        config.registry.base_url = "https://registry.example.com/npm".into();
        assert!(config.validate().is_ok());

        config.registry.sync_interval_secs = 0;
        assert!(config.validate().is_err());
        config.registry.sync_interval_secs = 60;

        config.publish.accepted_statuses.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: MirrorConfig = toml::from_str(
            r#"
            [paths]
            root = "/srv/mirror"

            [registry]
            sync_interval_secs = 600
            fetch_max_elapsed_secs = 0
            "#,
        )
        .unwrap();

        assert_eq!(config.paths.root, PathBuf::from("/srv/mirror"));
        assert_eq!(config.paths.packages_dir, PathBuf::from("node_modules"));
        assert_eq!(config.sync_interval(), Duration::from_secs(600));
        assert_eq!(config.fetch_max_elapsed(), None);
        assert_eq!(config.locker.manifest_prefix, "Me/node_modules");
        assert_eq!(
            config.layout().registry_path(),
            PathBuf::from("/srv/mirror/registry.json")
        );
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conf").join("mirror.toml");

        let mut config = MirrorConfig::default();
        config.paths.root = dir.path().join("root");
        config.publish.accepted_statuses = vec![201];
        config.save(Some(path.clone())).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("[registry]"));
        assert!(text.contains("[publish]"));

        let loaded: MirrorConfig = toml::from_str(&text).unwrap();
        assert_eq!(loaded.publish.accepted_statuses, vec![201]);
        assert!(loaded.publish.accepts(201));
        assert!(!loaded.publish.accepts(409));
    }
}
