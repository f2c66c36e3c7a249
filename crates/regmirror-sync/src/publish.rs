//! # Publish Coordinator
//!
//! Turns a local directory into a published package.
//!
//! ## Chain
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  publish(request)                                                       │
//! │     │  empty / missing dir ─────────────────────► InvalidArgument       │
//! │     ▼                                                                   │
//! │  need-identity        profile with login + email                        │
//! │     ▼                                                                   │
//! │  need-registry-auth   registry_auth.json, or provision the user and     │
//! │     │                 persist the credentials                           │
//! │     ▼                                                                   │
//! │  need-manifest        package.json, synthesized if missing              │
//! │     ▼                                                                   │
//! │  bump-version         patch bump in the package dir                     │
//! │     ▼                                                                   │
//! │  publish              upload with the registry credentials              │
//! │     ▼                                                                   │
//! │  force-sync           always runs once publish has been attempted       │
//! │                                                                         │
//! │  A failing stage aborts with PublishFailed { stage, source }.           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use regmirror_core::{BootstrapOptions, GithubProfile, PackageManifest, RegistryAuth, UserDocument};
use regmirror_store::{AuthStore, ManifestStore};

use crate::capability::{PackageInstaller, PasswordDeriver, RegistryClient};
use crate::config::PublishSettings;
use crate::engine::{SyncEngine, SyncOutcome};
use crate::error::{SyncError, SyncResult};
use crate::identity::IdentityCache;

// =============================================================================
// Stages
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishStage {
    NeedIdentity,
    NeedRegistryAuth,
    NeedManifest,
    BumpVersion,
    Publish,
    ForceSync,
}

impl std::fmt::Display for PublishStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PublishStage::NeedIdentity => "need-identity",
            PublishStage::NeedRegistryAuth => "need-registry-auth",
            PublishStage::NeedManifest => "need-manifest",
            PublishStage::BumpVersion => "bump-version",
            PublishStage::Publish => "publish",
            PublishStage::ForceSync => "force-sync",
        };
        f.write_str(name)
    }
}

// =============================================================================
// Request & Report
// =============================================================================

/// A directory to publish, plus fields used if a manifest must be synthesized.
#[derive(Debug, Clone, Default)]
pub struct PublishRequest {
    pub dir: PathBuf,
    pub description: Option<String>,
    pub title: Option<String>,
    pub viewer: Option<String>,
}

impl PublishRequest {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        PublishRequest {
            dir: dir.into(),
            ..Default::default()
        }
    }

    fn bootstrap_options(&self) -> BootstrapOptions {
        BootstrapOptions {
            description: self.description.clone(),
            title: self.title.clone(),
            viewer: self.viewer.clone(),
        }
    }

    /// Directory base name, or an input error when there is none.
    fn dir_name(&self) -> SyncResult<String> {
        if self.dir.as_os_str().is_empty() {
            return Err(SyncError::InvalidArgument("missing base dir".into()));
        }
        self.dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .filter(|n| !n.is_empty())
            .ok_or_else(|| {
                SyncError::InvalidArgument(format!("{} has no directory name", self.dir.display()))
            })
    }
}

/// What a successful publish produced.
#[derive(Debug)]
pub struct PublishReport {
    pub name: String,
    pub version: String,
    /// Result of the sync forced after the upload.
    pub sync: SyncOutcome,
}

// =============================================================================
// Coordinator
// =============================================================================

pub struct PublishCoordinator {
    engine: Arc<SyncEngine>,
    identity: Arc<IdentityCache>,
    auth: AuthStore,
    registry: Arc<dyn RegistryClient>,
    installer: Arc<dyn PackageInstaller>,
    deriver: Arc<dyn PasswordDeriver>,
    settings: PublishSettings,
}

impl PublishCoordinator {
    pub fn new(
        engine: Arc<SyncEngine>,
        identity: Arc<IdentityCache>,
        auth: AuthStore,
        registry: Arc<dyn RegistryClient>,
        installer: Arc<dyn PackageInstaller>,
        deriver: Arc<dyn PasswordDeriver>,
    ) -> Self {
        PublishCoordinator {
            engine,
            identity,
            auth,
            registry,
            installer,
            deriver,
            settings: PublishSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: PublishSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Runs the whole chain for one directory.
    pub async fn publish(&self, request: PublishRequest) -> SyncResult<PublishReport> {
        let dir_name = request.dir_name()?;
        let dir = request.dir.as_path();
        if !tokio::fs::metadata(dir).await.map(|m| m.is_dir()).unwrap_or(false) {
            return Err(SyncError::InvalidArgument(format!(
                "{} is not a directory",
                dir.display()
            )));
        }
        info!(dir = %dir.display(), "Publishing package");

        Self::enter(PublishStage::NeedIdentity, dir);
        let profile = self
            .need_identity()
            .await
            .map_err(|e| e.at_stage(PublishStage::NeedIdentity))?;

        Self::enter(PublishStage::NeedRegistryAuth, dir);
        let auth = self
            .need_registry_auth(&profile)
            .await
            .map_err(|e| e.at_stage(PublishStage::NeedRegistryAuth))?;

        Self::enter(PublishStage::NeedManifest, dir);
        self.need_manifest(&request, &profile, &dir_name)
            .await
            .map_err(|e| e.at_stage(PublishStage::NeedManifest))?;

        Self::enter(PublishStage::BumpVersion, dir);
        let manifest = self
            .bump_version(dir)
            .await
            .map_err(|e| e.at_stage(PublishStage::BumpVersion))?;

        Self::enter(PublishStage::Publish, dir);
        let published = self
            .installer
            .publish(dir, &auth)
            .await
            .map_err(|e| e.at_stage(PublishStage::Publish));
        if let Err(e) = &published {
            warn!(package = %manifest.name, error = %e, "Publish failed, syncing anyway");
        }

        Self::enter(PublishStage::ForceSync, dir);
        let sync = self.engine.sync().await;
        published?;

        info!(package = %manifest.name, version = %manifest.version, "Package published");
        Ok(PublishReport {
            name: manifest.name,
            version: manifest.version,
            sync,
        })
    }

    fn enter(stage: PublishStage, dir: &Path) {
        info!(%stage, dir = %dir.display(), "Publish stage");
    }

    async fn need_identity(&self) -> SyncResult<GithubProfile> {
        let profile = self
            .identity
            .get()
            .await?
            .ok_or_else(|| SyncError::IdentityUnavailable("no connected account".into()))?;

        let has_email = profile.email.as_deref().map(|e| !e.trim().is_empty()).unwrap_or(false);
        if !has_email {
            return Err(SyncError::IdentityUnavailable(format!(
                "account {} has no email",
                profile.login
            )));
        }
        Ok(profile)
    }

    async fn need_registry_auth(&self, profile: &GithubProfile) -> SyncResult<RegistryAuth> {
        match self.auth.load().await {
            Ok(Some(auth)) => return Ok(auth),
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Ignoring unreadable registry credentials"),
        }

        let email = profile.email.as_deref().unwrap_or_default();
        let password = self.deriver.derive(email);
        let user = UserDocument::new(&profile.login, &password, email, Utc::now())?;

        let status = self.registry.add_user(&user).await?;
        if !self.settings.accepts(status) {
            return Err(SyncError::ProvisioningRejected { status });
        }
        info!(user = %profile.login, status, "Registry user provisioned");

        let auth = RegistryAuth::basic(&profile.login, &password)?;
        self.auth.save(&auth).await?;
        Ok(auth)
    }

    async fn need_manifest(
        &self,
        request: &PublishRequest,
        profile: &GithubProfile,
        dir_name: &str,
    ) -> SyncResult<()> {
        if ManifestStore.exists(&request.dir).await {
            return Ok(());
        }

        let manifest = PackageManifest::bootstrap(
            profile.display_name(),
            &profile.login,
            dir_name,
            &request.bootstrap_options(),
        );
        let path = ManifestStore.write(&request.dir, &manifest).await?;
        info!(package = %manifest.name, path = %path.display(), "Manifest synthesized");
        Ok(())
    }

    async fn bump_version(&self, dir: &Path) -> SyncResult<PackageManifest> {
        self.installer.bump_patch(dir).await?;
        Ok(ManifestStore.read(dir).await?)
    }
}

impl std::fmt::Debug for PublishCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PublishCoordinator")
            .field("auth", &self.auth)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{
        manifest, profile, EventLog, FakeIdentity, FakeInstaller, FakeRegistry, FixedPassword,
    };
    use regmirror_store::{Store, StoreLayout};
    use std::sync::Mutex;

    struct Fixture {
        _dir: tempfile::TempDir,
        root: PathBuf,
        log: EventLog,
        registry: Arc<FakeRegistry>,
        installer: Arc<FakeInstaller>,
        coordinator: PublishCoordinator,
    }

    async fn fixture(identity: FakeIdentity) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_path_buf();
        let log: EventLog = Arc::new(Mutex::new(Vec::new()));
        let layout = StoreLayout::new(&root);

        let registry = Arc::new(FakeRegistry::new().with_log(log.clone()));
        let installer = Arc::new(FakeInstaller::new(layout.clone()).with_log(log.clone()));
        let store = Store::open(layout).await.unwrap();
        let auth = store.auth().clone();

        let engine = SyncEngine::builder(store)
            .with_registry(registry.clone())
            .with_installer(installer.clone())
            .build()
            .await
            .unwrap();

        let coordinator = PublishCoordinator::new(
            Arc::new(engine),
            Arc::new(IdentityCache::new(Arc::new(identity))),
            auth,
            registry.clone(),
            installer.clone(),
            Arc::new(FixedPassword("derived-pw".into())),
        );

        Fixture {
            _dir: dir,
            root,
            log,
            registry,
            installer,
            coordinator,
        }
    }

    impl Fixture {
        fn app_dir(&self, name: &str) -> PathBuf {
            let dir = self.root.join("apps").join(name);
            std::fs::create_dir_all(&dir).unwrap();
            dir
        }

        fn events(&self) -> Vec<String> {
            self.log.lock().unwrap().clone()
        }
    }

    #[tokio::test]
    async fn test_full_chain_in_order() {
        let fx = fixture(FakeIdentity::new(Some(profile("Octocat")))).await;
        let dir = fx.app_dir("MyApp");

        let report = fx.coordinator.publish(PublishRequest::new(&dir)).await.unwrap();

        assert_eq!(report.name, "app-octocat-myapp");
        assert_eq!(report.version, "0.0.1");
        assert!(matches!(report.sync, SyncOutcome::NoChanges));
        assert_eq!(
            fx.events(),
            vec!["add_user:Octocat", "bump:MyApp", "publish:MyApp", "fetch:0"]
        );

        let written = ManifestStore.read(&dir).await.unwrap();
        let repo = written.repository.as_ref().and_then(|r| r.info()).unwrap();
        assert_eq!(repo.author.as_deref(), Some("Octocat Example"));
        assert_eq!(repo.viewer.as_deref(), Some("links"));
        assert_eq!(repo.url.as_deref(), Some("http://github.com/Octocat/MyApp"));

        let saved = AuthStore::new(fx.root.join("registry_auth.json"), fx.root.join(".x"))
            .load()
            .await
            .unwrap()
            .unwrap();
        assert_eq!(saved, RegistryAuth::basic("Octocat", "derived-pw").unwrap());
        assert_eq!(fx.installer.published_with(), vec![saved]);
    }

    #[tokio::test]
    async fn test_existing_manifest_and_auth_are_reused() {
        let fx = fixture(FakeIdentity::new(Some(profile("octocat")))).await;
        let dir = fx.app_dir("links");
        ManifestStore.write(&dir, &manifest("links", "1.2.3", "auto")).await.unwrap();

        let existing = RegistryAuth::basic("octocat", "older-pw").unwrap();
        fx.coordinator.auth.save(&existing).await.unwrap();

        let report = fx.coordinator.publish(PublishRequest::new(&dir)).await.unwrap();
        assert_eq!(report.name, "links");
        assert_eq!(report.version, "1.2.4");
        assert!(fx.registry.users().is_empty());
        assert_eq!(fx.installer.published_with(), vec![existing]);
    }

    #[tokio::test]
    async fn test_force_sync_runs_after_publish_failure() {
        let fx = fixture(FakeIdentity::new(Some(profile("octocat")))).await;
        fx.installer.fail("publish");
        let dir = fx.app_dir("links");

        let err = fx.coordinator.publish(PublishRequest::new(&dir)).await.unwrap_err();
        assert_eq!(err.publish_stage(), Some(PublishStage::Publish));
        assert_eq!(fx.registry.fetches().len(), 1);
        assert_eq!(fx.events().last().map(String::as_str), Some("fetch:0"));
    }

    #[tokio::test]
    async fn test_bump_failure_aborts_before_publish() {
        let fx = fixture(FakeIdentity::new(Some(profile("octocat")))).await;
        fx.installer.fail("bump");
        let dir = fx.app_dir("links");

        let err = fx.coordinator.publish(PublishRequest::new(&dir)).await.unwrap_err();
        assert_eq!(err.publish_stage(), Some(PublishStage::BumpVersion));
        assert!(fx.installer.published_with().is_empty());
        assert!(fx.registry.fetches().is_empty());
    }

    #[tokio::test]
    async fn test_no_identity_aborts_first() {
        let fx = fixture(FakeIdentity::new(None)).await;
        let dir = fx.app_dir("links");

        let err = fx.coordinator.publish(PublishRequest::new(&dir)).await.unwrap_err();
        assert_eq!(err.publish_stage(), Some(PublishStage::NeedIdentity));
        assert!(fx.events().is_empty());
        assert!(!dir.join("package.json").exists());
    }

    #[tokio::test]
    async fn test_profile_without_email_is_rejected() {
        let mut nameless = profile("octocat");
        nameless.email = None;
        let fx = fixture(FakeIdentity::new(Some(nameless))).await;
        let dir = fx.app_dir("links");

        let err = fx.coordinator.publish(PublishRequest::new(&dir)).await.unwrap_err();
        assert_eq!(err.publish_stage(), Some(PublishStage::NeedIdentity));
    }

    #[tokio::test]
    async fn test_rejected_provisioning_persists_nothing() {
        let fx = fixture(FakeIdentity::new(Some(profile("octocat")))).await;
        fx.registry.set_user_status(Some(500));
        let dir = fx.app_dir("links");

        let err = fx.coordinator.publish(PublishRequest::new(&dir)).await.unwrap_err();
        assert_eq!(err.publish_stage(), Some(PublishStage::NeedRegistryAuth));
        match err {
            SyncError::PublishFailed { source, .. } => {
                assert!(matches!(*source, SyncError::ProvisioningRejected { status: 500 }))
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!fx.root.join("registry_auth.json").exists());
        assert!(fx.installer.calls().is_empty());
    }

    #[tokio::test]
    async fn test_conflict_status_is_accepted() {
        let fx = fixture(FakeIdentity::new(Some(profile("octocat")))).await;
        fx.registry.set_user_status(Some(409));
        let dir = fx.app_dir("links");

        fx.coordinator.publish(PublishRequest::new(&dir)).await.unwrap();
        assert!(fx.root.join("registry_auth.json").exists());
    }

    #[tokio::test]
    async fn test_missing_dir_rejected_before_io() {
        let fx = fixture(FakeIdentity::new(Some(profile("octocat")))).await;

        let err = fx.coordinator.publish(PublishRequest::default()).await.unwrap_err();
        assert!(err.is_input_error());

        let err = fx
            .coordinator
            .publish(PublishRequest::new(fx.root.join("nope")))
            .await
            .unwrap_err();
        assert!(err.is_input_error());
        assert!(fx.events().is_empty());
    }

    #[test]
    fn test_stage_names() {
        assert_eq!(PublishStage::NeedRegistryAuth.to_string(), "need-registry-auth");
        assert_eq!(PublishStage::ForceSync.to_string(), "force-sync");
    }
}
