//! # Installation Root Layout
//!
//! Where every piece of local state lives.
//!
//! ```text
//! <root>/
//! ├── registry.json          RegistryIndex snapshot
//! ├── registry_auth.json     RegistryAuth bundle
//! ├── .regmirror_secret      publish password secret
//! └── node_modules/          packages directory
//!     ├── <pkg>/package.json
//!     └── ...
//! ```

use std::path::{Path, PathBuf};

use regmirror_core::{MANIFEST_FILE, PACKAGES_DIR, REGISTRY_AUTH_FILE, REGISTRY_FILE};

/// File name of the per-installation secret.
pub const SECRET_FILE: &str = ".regmirror_secret";

/// Resolved paths under one installation root.
///
/// ## Example
/// ```rust
/// use regmirror_store::StoreLayout;
///
/// let layout = StoreLayout::new("/srv/mirror");
/// assert!(layout.registry_path().ends_with("registry.json"));
/// assert!(layout.packages_dir().ends_with("node_modules"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreLayout {
    root: PathBuf,
    packages_dir: PathBuf,
}

impl StoreLayout {
    /// Layout with the default packages directory (`node_modules`).
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        StoreLayout {
            packages_dir: root.join(PACKAGES_DIR),
            root,
        }
    }

    /// Overrides the packages directory. Relative paths resolve against the root.
    pub fn with_packages_dir(mut self, dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        self.packages_dir = if dir.is_absolute() {
            dir.to_path_buf()
        } else {
            self.root.join(dir)
        };
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn packages_dir(&self) -> &Path {
        &self.packages_dir
    }

    pub fn registry_path(&self) -> PathBuf {
        self.root.join(REGISTRY_FILE)
    }

    pub fn auth_path(&self) -> PathBuf {
        self.root.join(REGISTRY_AUTH_FILE)
    }

    pub fn secret_path(&self) -> PathBuf {
        self.root.join(SECRET_FILE)
    }

    /// Directory of an installed package.
    pub fn package_dir(&self, name: &str) -> PathBuf {
        self.packages_dir.join(name)
    }

    /// Manifest path of an installed package.
    pub fn package_manifest(&self, name: &str) -> PathBuf {
        self.package_dir(name).join(MANIFEST_FILE)
    }

    /// Path of `path` relative to the root, if it lives under it.
    pub fn relative_to_root<'a>(&self, path: &'a Path) -> Option<&'a Path> {
        path.strip_prefix(&self.root).ok()
    }
}
