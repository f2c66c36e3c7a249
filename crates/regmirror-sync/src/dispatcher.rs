//! # Update Dispatcher
//!
//! Runs install/update for one package at a time per name and folds the
//! result back into the installed set.
//!
//! ## Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  install(name) / update(name)                                           │
//! │     │                                                                   │
//! │     ├── validate name ─────────────── invalid → InvalidArgument (no I/O)│
//! │     ├── lock(name)          same name: serialized                       │
//! │     │                       other names: concurrent                     │
//! │     ├── installer.install/update(name)   failure → warn!, continue      │
//! │     ├── scanner.load_package(name)       always, whatever happened      │
//! │     │      ├── Ok  → replace installed[name], return manifest           │
//! │     │      └── Err → installed[name] untouched, return the error        │
//! │     └── unlock(name)                                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

use regmirror_core::validation::validate_package_name;
use regmirror_core::PackageManifest;

use crate::capability::PackageInstaller;
use crate::error::{SyncError, SyncResult};
use crate::scanner::Scanner;
use crate::state::SharedState;

/// What to ask the installer for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Install,
    Update,
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::Install => write!(f, "install"),
            Action::Update => write!(f, "update"),
        }
    }
}

pub struct Dispatcher {
    installer: Arc<dyn PackageInstaller>,
    scanner: Arc<Scanner>,
    state: Arc<SharedState>,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl Dispatcher {
    pub fn new(installer: Arc<dyn PackageInstaller>, scanner: Arc<Scanner>, state: Arc<SharedState>) -> Self {
        Dispatcher {
            installer,
            scanner,
            state,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub async fn install(&self, name: &str) -> SyncResult<PackageManifest> {
        self.dispatch(Action::Install, name).await
    }

    pub async fn update(&self, name: &str) -> SyncResult<PackageManifest> {
        self.dispatch(Action::Update, name).await
    }

    async fn dispatch(&self, action: Action, name: &str) -> SyncResult<PackageManifest> {
        validate_package_name(name)
            .map_err(|e| SyncError::InvalidArgument(format!("cannot {} {:?}: {}", action, name, e)))?;

        let lock = self.lock_for(name).await;
        let result = {
            let _guard = lock.lock().await;
            self.run(action, name).await
        };
        drop(lock);
        self.release(name).await;

        result
    }

    async fn run(&self, action: Action, name: &str) -> SyncResult<PackageManifest> {
        let outcome = match action {
            Action::Install => self.installer.install(name).await,
            Action::Update => self.installer.update(name).await,
        };
        if let Err(e) = &outcome {
            warn!(package = %name, %action, error = %e, "Package tool failed, reloading manifest anyway");
        }

        match self.scanner.load_package(name).await {
            Ok(manifest) => {
                let prior = self.state.replace_installed(manifest.clone()).await;
                info!(
                    package = %name,
                    %action,
                    from = prior.as_ref().map(|m| m.version.as_str()).unwrap_or("-"),
                    to = %manifest.version,
                    "Installed set updated"
                );
                Ok(manifest)
            }
            Err(reload) => {
                warn!(
                    package = %name,
                    %action,
                    error = %reload,
                    tool_error = %outcome.as_ref().err().map(|e| e.to_string()).unwrap_or_default(),
                    "Manifest reload failed, keeping previous entry"
                );
                Err(reload)
            }
        }
    }

    async fn lock_for(&self, name: &str) -> Arc<Mutex<()>> {
        self.locks
            .lock()
            .await
            .entry(name.to_string())
            .or_default()
            .clone()
    }

    /// Drops the lock entry once nobody else holds or waits on it.
    async fn release(&self, name: &str) {
        let mut locks = self.locks.lock().await;
        if locks.get(name).map(|l| Arc::strong_count(l) == 1).unwrap_or(false) {
            locks.remove(name);
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{write_manifest, FakeIndexer, FakeInstaller};
    use regmirror_store::StoreLayout;
    use std::path::Path;

    fn dispatcher(root: &Path, installer: Arc<FakeInstaller>) -> (Dispatcher, Arc<SharedState>) {
        let layout = StoreLayout::new(root);
        let scanner = Arc::new(Scanner::new(layout, Arc::new(FakeIndexer::default())));
        let state = Arc::new(SharedState::default());
        (Dispatcher::new(installer, scanner, state.clone()), state)
    }

    #[tokio::test]
    async fn test_update_replaces_entry_on_success() {
        let dir = tempfile::tempdir().unwrap();
        let layout = StoreLayout::new(dir.path());
        write_manifest(&layout, "links", "1.0.0", "auto").await;

        let installer = Arc::new(FakeInstaller::new(layout.clone()));
        installer.upgrade_to("links", "1.1.0");
        let (dispatcher, state) = dispatcher(dir.path(), installer.clone());

        let manifest = dispatcher.update("links").await.unwrap();
        assert_eq!(manifest.version, "1.1.0");
        assert_eq!(state.installed_manifest("links").await.unwrap().version, "1.1.0");
        assert_eq!(installer.calls(), vec!["update:links"]);
    }

    #[tokio::test]
    async fn test_failed_reload_keeps_prior_entry() {
        let dir = tempfile::tempdir().unwrap();
        let layout = StoreLayout::new(dir.path());
        let installer = Arc::new(FakeInstaller::new(layout.clone()));
        installer.fail("update");
        let (dispatcher, state) = dispatcher(dir.path(), installer);

        state.replace_installed(crate::testing::manifest("links", "1.0.0", "auto")).await;

        // No manifest on disk: the tool failed and the reload fails too.
        let err = dispatcher.update("links").await.unwrap_err();
        assert!(matches!(err, SyncError::Store(_)));
        assert_eq!(state.installed_manifest("links").await.unwrap().version, "1.0.0");
    }

    #[tokio::test]
    async fn test_tool_failure_still_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let layout = StoreLayout::new(dir.path());
        write_manifest(&layout, "links", "1.0.0", "auto").await;

        let installer = Arc::new(FakeInstaller::new(layout.clone()));
        installer.fail("install");
        let (dispatcher, state) = dispatcher(dir.path(), installer);

        let manifest = dispatcher.install("links").await.unwrap();
        assert_eq!(manifest.version, "1.0.0");
        assert!(state.installed_manifest("links").await.is_some());
    }

    #[tokio::test]
    async fn test_invalid_name_rejected_before_io() {
        let dir = tempfile::tempdir().unwrap();
        let installer = Arc::new(FakeInstaller::new(StoreLayout::new(dir.path())));
        let (dispatcher, _) = dispatcher(dir.path(), installer.clone());

        assert!(dispatcher.install("").await.unwrap_err().is_input_error());
        assert!(dispatcher.update("../x").await.unwrap_err().is_input_error());
        assert!(installer.calls().is_empty());
    }

    #[tokio::test]
    async fn test_same_name_is_serialized() {
        let dir = tempfile::tempdir().unwrap();
        let layout = StoreLayout::new(dir.path());
        write_manifest(&layout, "links", "1.0.0", "auto").await;
        write_manifest(&layout, "photos", "1.0.0", "auto").await;

        let installer = Arc::new(FakeInstaller::new(layout.clone()).with_delay(std::time::Duration::from_millis(20)));
        let (dispatcher, _) = dispatcher(dir.path(), installer.clone());
        let dispatcher = Arc::new(dispatcher);

        let tasks: Vec<_> = ["links", "links", "links", "photos"]
            .into_iter()
            .map(|name| {
                let d = dispatcher.clone();
                tokio::spawn(async move { d.update(name).await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(installer.max_concurrent_for("links"), 1);
        assert_eq!(installer.calls().len(), 4);
        assert!(dispatcher.locks.lock().await.is_empty());
    }
}
