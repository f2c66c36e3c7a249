//! # Package Manifests
//!
//! The manifest is the structured metadata record describing one package.
//! It is read from each installed package's `package.json` and, in a reduced
//! form, appears inside registry records.
//!
//! ## Relevant Subset
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  {                                                                      │
//! │    "name": "links",              ← unique key of the installed set      │
//! │    "version": "1.0.0",           ← compared against dist-tags.latest    │
//! │    "repository": {                                                      │
//! │      "type": "viewer",           ← viewers are listed separately        │
//! │      "update": "auto",           ← opt-in to automatic updates          │
//! │      "url": "http://github.com/octocat/links"                           │
//! │    },                                                                   │
//! │    ...                           ← everything else kept verbatim        │
//! │  }                                                                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::error::{CoreError, CoreResult};

// =============================================================================
// Update Mode
// =============================================================================

/// Whether a package may be upgraded without user action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpdateMode {
    /// Upgraded by the sync engine when the registry has a newer version.
    Auto,

    /// Only upgraded on explicit request.
    #[default]
    Manual,
}

impl UpdateMode {
    /// Reads the `repository.update` flag. Only the exact value `auto` opts in.
    pub fn from_flag(flag: Option<&str>) -> Self {
        match flag {
            Some("auto") => UpdateMode::Auto,
            _ => UpdateMode::Manual,
        }
    }
}

impl std::fmt::Display for UpdateMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UpdateMode::Auto => write!(f, "auto"),
            UpdateMode::Manual => write!(f, "manual"),
        }
    }
}

// =============================================================================
// Repository Block
// =============================================================================

/// The `repository` block of a manifest or registry record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RepositoryInfo {
    /// Package kind, e.g. `viewer`.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    /// Update flag; `auto` enables automatic updates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update: Option<String>,

    /// Source URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Display title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Registry handle.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handle: Option<String>,

    /// Author display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,

    /// Viewer category for viewer packages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viewer: Option<String>,

    /// `"true"` for packages served as static files.
    #[serde(rename = "static", default, skip_serializing_if = "Option::is_none")]
    pub static_files: Option<String>,

    /// Any other fields, preserved on round-trip.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RepositoryInfo {
    /// Returns the declared update mode.
    pub fn update_mode(&self) -> UpdateMode {
        UpdateMode::from_flag(self.update.as_deref())
    }

    /// Returns true if this block describes a viewer package.
    pub fn is_viewer(&self) -> bool {
        self.kind.as_deref() == Some("viewer")
    }
}

/// A `repository` field as found in the wild.
///
/// npm also allows a bare URL string, and hand-written blocks carry
/// non-string `author`/`static` values. Those decode as [`Repository::Other`]
/// and are written back unchanged; `type` and `update` are still read from
/// them when they are objects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Repository {
    /// An object block with the expected field types.
    Info(RepositoryInfo),

    /// Any other JSON value.
    Other(Value),
}

impl Repository {
    /// The typed block, if the field had the expected shape.
    pub fn info(&self) -> Option<&RepositoryInfo> {
        match self {
            Repository::Info(info) => Some(info),
            Repository::Other(_) => None,
        }
    }

    /// Returns the declared update mode.
    pub fn update_mode(&self) -> UpdateMode {
        match self {
            Repository::Info(info) => info.update_mode(),
            Repository::Other(value) => {
                UpdateMode::from_flag(value.get("update").and_then(Value::as_str))
            }
        }
    }

    /// Returns true if this field describes a viewer package.
    pub fn is_viewer(&self) -> bool {
        match self {
            Repository::Info(info) => info.is_viewer(),
            Repository::Other(value) => value.get("type").and_then(Value::as_str) == Some("viewer"),
        }
    }
}

impl From<RepositoryInfo> for Repository {
    fn from(info: RepositoryInfo) -> Self {
        Repository::Info(info)
    }
}

// =============================================================================
// Package Manifest
// =============================================================================

/// A package manifest (`package.json`).
///
/// `name` and `version` default to empty strings so a manifest lacking them
/// still decodes and is then rejected by
/// [`validate_manifest`](crate::validation::validate_manifest).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PackageManifest {
    /// Package name, the unique key in the installed set.
    #[serde(default)]
    pub name: String,

    /// Installed version.
    #[serde(default)]
    pub version: String,

    /// Repository field.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<Repository>,

    /// Any other fields, preserved on round-trip.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PackageManifest {
    /// Parses a manifest from JSON text.
    pub fn from_json(json: &str) -> CoreResult<Self> {
        serde_json::from_str(json).map_err(|e| CoreError::InvalidManifest(e.to_string()))
    }

    /// Serializes the manifest to pretty JSON.
    pub fn to_json_pretty(&self) -> CoreResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| CoreError::InvalidManifest(e.to_string()))
    }

    /// Returns the declared update mode (`Manual` without a repository block).
    pub fn update_mode(&self) -> UpdateMode {
        self.repository
            .as_ref()
            .map(Repository::update_mode)
            .unwrap_or_default()
    }

    /// Synthesizes a minimal manifest for a directory that has none.
    ///
    /// The name is `app-{login}-{dir}` lowercased, the package is a viewer
    /// opted into automatic updates, and the version starts at `0.0.0` so the
    /// first patch bump publishes `0.0.1`.
    pub fn bootstrap(author: &str, login: &str, dir_name: &str, options: &BootstrapOptions) -> Self {
        let handle = format!("app-{}-{}", login, dir_name).to_lowercase();

        let repository = RepositoryInfo {
            kind: Some("viewer".to_string()),
            update: Some(UpdateMode::Auto.to_string()),
            url: Some(format!("http://github.com/{}/{}", login, dir_name)),
            title: Some(options.title.clone().unwrap_or_else(|| "blank".to_string())),
            handle: Some(handle.clone()),
            author: Some(author.to_string()),
            viewer: Some(options.viewer.clone().unwrap_or_else(|| "links".to_string())),
            static_files: Some("true".to_string()),
            extra: Map::new(),
        };

        let mut extra = Map::new();
        let mut author_block = Map::new();
        author_block.insert("name".to_string(), Value::String(author.to_string()));
        extra.insert("author".to_string(), Value::Object(author_block));
        extra.insert(
            "description".to_string(),
            Value::String(
                options
                    .description
                    .clone()
                    .unwrap_or_else(|| "auto generated".to_string()),
            ),
        );
        extra.insert("dependencies".to_string(), Value::Object(Map::new()));
        extra.insert("devDependencies".to_string(), Value::Object(Map::new()));
        let mut engines = Map::new();
        engines.insert("node".to_string(), Value::String("*".to_string()));
        extra.insert("engines".to_string(), Value::Object(engines));

        PackageManifest {
            name: handle,
            version: "0.0.0".to_string(),
            repository: Some(repository.into()),
            extra,
        }
    }
}

/// Optional fields for [`PackageManifest::bootstrap`].
#[derive(Debug, Clone, Default)]
pub struct BootstrapOptions {
    /// Package description (default: "auto generated").
    pub description: Option<String>,

    /// Display title (default: "blank").
    pub title: Option<String>,

    /// Viewer category (default: "links").
    pub viewer: Option<String>,
}

// =============================================================================
// Installed Set
// =============================================================================

/// Locally installed packages keyed by manifest name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstalledSet(BTreeMap<String, PackageManifest>);

impl InstalledSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a manifest under its own name, replacing any prior entry.
    pub fn insert(&mut self, manifest: PackageManifest) -> Option<PackageManifest> {
        self.0.insert(manifest.name.clone(), manifest)
    }

    /// Looks up an installed package.
    pub fn get(&self, name: &str) -> Option<&PackageManifest> {
        self.0.get(name)
    }

    /// Returns true if the package is installed.
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Number of installed packages.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if nothing is installed.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over installed manifests in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &PackageManifest)> {
        self.0.iter()
    }
}

impl FromIterator<PackageManifest> for InstalledSet {
    fn from_iter<I: IntoIterator<Item = PackageManifest>>(iter: I) -> Self {
        let mut set = InstalledSet::new();
        for manifest in iter {
            set.insert(manifest);
        }
        set
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_mode_flag() {
        assert_eq!(UpdateMode::from_flag(Some("auto")), UpdateMode::Auto);
        assert_eq!(UpdateMode::from_flag(Some("manual")), UpdateMode::Manual);
        assert_eq!(UpdateMode::from_flag(Some("AUTO")), UpdateMode::Manual);
        assert_eq!(UpdateMode::from_flag(None), UpdateMode::Manual);
    }

    #[test]
    fn test_manifest_preserves_unknown_fields() {
        let json = r#"{
            "name": "links",
            "version": "1.0.0",
            "main": "index.js",
            "repository": {"type": "viewer", "update": "auto", "stars": 3}
        }"#;
        let manifest = PackageManifest::from_json(json).unwrap();
        assert_eq!(manifest.update_mode(), UpdateMode::Auto);
        assert_eq!(manifest.extra.get("main"), Some(&Value::from("index.js")));

        let repo = manifest.repository.as_ref().unwrap();
        assert!(repo.is_viewer());
        assert_eq!(repo.info().unwrap().extra.get("stars"), Some(&Value::from(3)));

        let back = PackageManifest::from_json(&manifest.to_json_pretty().unwrap()).unwrap();
        assert_eq!(back, manifest);
    }

    #[test]
    fn test_manifest_without_repository_is_manual() {
        let manifest = PackageManifest::from_json(r#"{"name":"a","version":"1.0.0"}"#).unwrap();
        assert_eq!(manifest.update_mode(), UpdateMode::Manual);
    }

    #[test]
    fn test_manifest_with_url_repository() {
        let json = r#"{
            "name": "express",
            "version": "2.5.0",
            "repository": "git://github.com/visionmedia/express.git"
        }"#;
        let manifest = PackageManifest::from_json(json).unwrap();
        assert_eq!(manifest.name, "express");
        assert_eq!(manifest.update_mode(), UpdateMode::Manual);

        let repo = manifest.repository.as_ref().unwrap();
        assert!(repo.info().is_none());
        assert!(!repo.is_viewer());

        let back = PackageManifest::from_json(&manifest.to_json_pretty().unwrap()).unwrap();
        assert_eq!(back, manifest);
    }

    #[test]
    fn test_manifest_repository_with_loose_fields() {
        let json = r#"{
            "name": "links",
            "version": "1.0.0",
            "repository": {
                "type": "viewer",
                "update": "auto",
                "static": true,
                "author": {"name": "The Octocat"}
            }
        }"#;
        let manifest = PackageManifest::from_json(json).unwrap();
        assert_eq!(manifest.update_mode(), UpdateMode::Auto);

        let repo = manifest.repository.as_ref().unwrap();
        assert!(repo.is_viewer());
        assert!(matches!(repo, Repository::Other(v) if v["static"] == Value::Bool(true)));
    }

    #[test]
    fn test_missing_name_decodes_empty() {
        let manifest = PackageManifest::from_json(r#"{"version":"1.0.0"}"#).unwrap();
        assert!(manifest.name.is_empty());
    }

    #[test]
    fn test_bootstrap_manifest() {
        let manifest = PackageManifest::bootstrap(
            "The Octocat",
            "OctoCat",
            "Photos",
            &BootstrapOptions::default(),
        );

        assert_eq!(manifest.name, "app-octocat-photos");
        assert_eq!(manifest.version, "0.0.0");
        assert_eq!(manifest.update_mode(), UpdateMode::Auto);

        let repo = manifest.repository.as_ref().unwrap();
        assert!(repo.is_viewer());
        let repo = repo.info().unwrap();
        assert_eq!(repo.viewer.as_deref(), Some("links"));
        assert_eq!(repo.title.as_deref(), Some("blank"));
        assert_eq!(repo.url.as_deref(), Some("http://github.com/OctoCat/Photos"));
        assert_eq!(
            manifest.extra.get("description"),
            Some(&Value::from("auto generated"))
        );
    }

    #[test]
    fn test_bootstrap_manifest_options() {
        let options = BootstrapOptions {
            description: Some("My photos".to_string()),
            title: Some("Photos".to_string()),
            viewer: Some("photos".to_string()),
        };
        let manifest = PackageManifest::bootstrap("o", "o", "p", &options);
        let repo = manifest.repository.as_ref().and_then(Repository::info).unwrap();
        assert_eq!(repo.title.as_deref(), Some("Photos"));
        assert_eq!(repo.viewer.as_deref(), Some("photos"));
        assert_eq!(manifest.extra.get("description"), Some(&Value::from("My photos")));
    }

    #[test]
    fn test_installed_set_replaces_by_name() {
        let mut set = InstalledSet::new();
        let v1 = PackageManifest::from_json(r#"{"name":"a","version":"1.0.0"}"#).unwrap();
        let v2 = PackageManifest::from_json(r#"{"name":"a","version":"1.1.0"}"#).unwrap();

        assert!(set.insert(v1).is_none());
        let prior = set.insert(v2).unwrap();
        assert_eq!(prior.version, "1.0.0");
        assert_eq!(set.len(), 1);
        assert_eq!(set.get("a").unwrap().version, "1.1.0");
    }
}
