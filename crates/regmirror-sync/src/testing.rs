//! In-memory collaborators for unit tests.

use async_trait::async_trait;
use serde_json::{json, Map};
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

use regmirror_core::{
    parse_version, GithubProfile, PackageManifest, RegistryAuth, RegistryDelta, RegistryRecord,
    SyncWatermark, UserDocument,
};
use regmirror_store::{ManifestStore, StoreLayout};

use crate::capability::{
    IdentityProvider, PackageIndexer, PackageInstaller, PasswordDeriver, RegistryClient,
};
use crate::error::{SyncError, SyncResult};

/// Ordered record of calls shared between fakes.
pub type EventLog = Arc<Mutex<Vec<String>>>;

fn log_event(log: &Option<EventLog>, event: String) {
    if let Some(log) = log {
        log.lock().unwrap().push(event);
    }
}

fn dir_label(dir: &Path) -> String {
    dir.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

// =============================================================================
// Builders
// =============================================================================

pub fn profile(login: &str) -> GithubProfile {
    GithubProfile {
        login: login.to_string(),
        name: Some(format!("{} Example", login)),
        email: Some(format!("{}@example.com", login)),
        extra: Map::new(),
    }
}

pub fn manifest(name: &str, version: &str, update: &str) -> PackageManifest {
    serde_json::from_value(json!({
        "name": name,
        "version": version,
        "repository": {"update": update}
    }))
    .unwrap()
}

pub fn record(modified: &str, latest: &str) -> RegistryRecord {
    serde_json::from_value(json!({
        "time": {"modified": modified},
        "dist-tags": {"latest": latest}
    }))
    .unwrap()
}

pub fn viewer_record(modified: &str, latest: &str) -> RegistryRecord {
    serde_json::from_value(json!({
        "time": {"modified": modified},
        "dist-tags": {"latest": latest},
        "repository": {"type": "viewer", "viewer": "links"}
    }))
    .unwrap()
}

pub async fn write_manifest(layout: &StoreLayout, name: &str, version: &str, update: &str) {
    let dir = layout.package_dir(name);
    tokio::fs::create_dir_all(&dir).await.unwrap();
    ManifestStore.write(&dir, &manifest(name, version, update)).await.unwrap();
}

// =============================================================================
// Registry
// =============================================================================

pub struct FakeRegistry {
    results: Mutex<VecDeque<SyncResult<RegistryDelta>>>,
    fetches: Mutex<Vec<SyncWatermark>>,
    gate: Mutex<Option<Arc<Notify>>>,
    running: AtomicUsize,
    max_running: AtomicUsize,
    user_status: Mutex<Option<u16>>,
    users: Mutex<Vec<UserDocument>>,
    log: Option<EventLog>,
}

impl FakeRegistry {
    pub fn new() -> Self {
        FakeRegistry {
            results: Mutex::new(VecDeque::new()),
            fetches: Mutex::new(Vec::new()),
            gate: Mutex::new(None),
            running: AtomicUsize::new(0),
            max_running: AtomicUsize::new(0),
            user_status: Mutex::new(Some(201)),
            users: Mutex::new(Vec::new()),
            log: None,
        }
    }

    pub fn with_log(mut self, log: EventLog) -> Self {
        self.log = Some(log);
        self
    }

    /// Queues the result of the next fetch. Exhausted queues return empty deltas.
    pub fn push(&self, result: SyncResult<RegistryDelta>) {
        self.results.lock().unwrap().push_back(result);
    }

    /// Makes every fetch wait for a `notify_one` on the returned gate.
    pub fn hold_fetches(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    /// `None` makes `add_user` fail with a connection error.
    pub fn set_user_status(&self, status: Option<u16>) {
        *self.user_status.lock().unwrap() = status;
    }

    pub fn fetches(&self) -> Vec<SyncWatermark> {
        self.fetches.lock().unwrap().clone()
    }

    pub fn users(&self) -> Vec<UserDocument> {
        self.users.lock().unwrap().clone()
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_running.load(Ordering::SeqCst)
    }

    pub async fn wait_for_fetch(&self) {
        self.wait_for_fetches(1).await
    }

    pub async fn wait_for_fetches(&self, count: usize) {
        while self.fetches.lock().unwrap().len() < count {
            tokio::task::yield_now().await;
        }
    }
}

#[async_trait]
impl RegistryClient for FakeRegistry {
    async fn fetch_since(&self, since: SyncWatermark) -> SyncResult<RegistryDelta> {
        let running = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_running.fetch_max(running, Ordering::SeqCst);
        self.fetches.lock().unwrap().push(since);
        log_event(&self.log, format!("fetch:{}", since));

        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        self.running.fetch_sub(1, Ordering::SeqCst);
        self.results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(RegistryDelta::default()))
    }

    async fn add_user(&self, user: &UserDocument) -> SyncResult<u16> {
        log_event(&self.log, format!("add_user:{}", user.name));
        self.users.lock().unwrap().push(user.clone());
        let status = *self.user_status.lock().unwrap();
        status.ok_or_else(|| SyncError::ConnectionFailed("registry unreachable".into()))
    }
}

// =============================================================================
// Installer
// =============================================================================

pub struct FakeInstaller {
    layout: StoreLayout,
    upgrades: Mutex<HashMap<String, String>>,
    failing: Mutex<HashSet<String>>,
    broken: Mutex<HashSet<String>>,
    calls: Mutex<Vec<String>>,
    published: Mutex<Vec<RegistryAuth>>,
    delay: Option<Duration>,
    running: Mutex<HashMap<String, usize>>,
    max_running: Mutex<HashMap<String, usize>>,
    gate: Mutex<Option<Arc<Notify>>>,
    log: Option<EventLog>,
}

impl FakeInstaller {
    pub fn new(layout: StoreLayout) -> Self {
        FakeInstaller {
            layout,
            upgrades: Mutex::new(HashMap::new()),
            failing: Mutex::new(HashSet::new()),
            broken: Mutex::new(HashSet::new()),
            calls: Mutex::new(Vec::new()),
            published: Mutex::new(Vec::new()),
            delay: None,
            running: Mutex::new(HashMap::new()),
            max_running: Mutex::new(HashMap::new()),
            gate: Mutex::new(None),
            log: None,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_log(mut self, log: EventLog) -> Self {
        self.log = Some(log);
        self
    }

    /// Install/update of `name` writes a manifest at `version`.
    pub fn upgrade_to(&self, name: &str, version: &str) {
        self.upgrades
            .lock()
            .unwrap()
            .insert(name.to_string(), version.to_string());
    }

    /// `op` is one of `install`, `update`, `bump`, `publish`.
    pub fn fail(&self, op: &str) {
        self.failing.lock().unwrap().insert(op.to_string());
    }

    /// Update of `name` corrupts its manifest and fails.
    pub fn break_manifest_on_update(&self, name: &str) {
        self.broken.lock().unwrap().insert(name.to_string());
    }

    /// Makes every update wait for a `notify_one` on the returned gate.
    pub fn hold_updates(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn published_with(&self) -> Vec<RegistryAuth> {
        self.published.lock().unwrap().clone()
    }

    pub fn max_concurrent_for(&self, name: &str) -> usize {
        self.max_running.lock().unwrap().get(name).copied().unwrap_or(0)
    }

    fn record_call(&self, op: &str, target: &str) {
        let event = format!("{}:{}", op, target);
        self.calls.lock().unwrap().push(event.clone());
        log_event(&self.log, event);
    }

    fn failure(&self, op: &str, target: &str) -> SyncResult<()> {
        if self.failing.lock().unwrap().contains(op) {
            return Err(SyncError::CommandFailed {
                command: format!("fake {} {}", op, target),
                reason: "exit status: 1".into(),
            });
        }
        Ok(())
    }

    async fn enter(&self, name: &str) {
        {
            let mut running = self.running.lock().unwrap();
            let now = running.entry(name.to_string()).or_insert(0);
            *now += 1;
            let mut max = self.max_running.lock().unwrap();
            let peak = max.entry(name.to_string()).or_insert(0);
            *peak = (*peak).max(*now);
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn leave(&self, name: &str) {
        if let Some(now) = self.running.lock().unwrap().get_mut(name) {
            *now -= 1;
        }
    }

    async fn apply(&self, op: &str, name: &str) -> SyncResult<()> {
        self.record_call(op, name);
        self.enter(name).await;
        if op == "update" {
            let gate = self.gate.lock().unwrap().clone();
            if let Some(gate) = gate {
                gate.notified().await;
            }
        }
        self.leave(name);

        self.failure(op, name)?;

        let dir = self.layout.package_dir(name);
        if op == "update" && self.broken.lock().unwrap().contains(name) {
            tokio::fs::write(ManifestStore::path_in(&dir), b"{ truncated").await.unwrap();
            return Err(SyncError::CommandFailed {
                command: format!("fake update {}", name),
                reason: "left a broken manifest".into(),
            });
        }

        let version = self.upgrades.lock().unwrap().get(name).cloned();
        if let Some(version) = version {
            let mut current = match ManifestStore.read(&dir).await {
                Ok(current) => current,
                Err(_) => manifest(name, &version, "auto"),
            };
            current.version = version;
            tokio::fs::create_dir_all(&dir).await.unwrap();
            ManifestStore.write(&dir, &current).await.unwrap();
        }
        Ok(())
    }
}

#[async_trait]
impl PackageInstaller for FakeInstaller {
    async fn install(&self, name: &str) -> SyncResult<()> {
        self.apply("install", name).await
    }

    async fn update(&self, name: &str) -> SyncResult<()> {
        self.apply("update", name).await
    }

    async fn bump_patch(&self, dir: &Path) -> SyncResult<()> {
        self.record_call("bump", &dir_label(dir));
        self.failure("bump", &dir_label(dir))?;

        let mut current = ManifestStore.read(dir).await?;
        let mut version = parse_version(&current.version)?;
        version.patch += 1;
        current.version = version.to_string();
        ManifestStore.write(dir, &current).await?;
        Ok(())
    }

    async fn publish(&self, dir: &Path, auth: &RegistryAuth) -> SyncResult<()> {
        self.record_call("publish", &dir_label(dir));
        self.published.lock().unwrap().push(auth.clone());
        self.failure("publish", &dir_label(dir))
    }
}

// =============================================================================
// Indexer & Identity
// =============================================================================

#[derive(Default)]
pub struct FakeIndexer {
    upserts: Mutex<Vec<String>>,
    failing: bool,
}

impl FakeIndexer {
    pub fn failing() -> Self {
        FakeIndexer {
            upserts: Mutex::new(Vec::new()),
            failing: true,
        }
    }

    pub fn upserts(&self) -> Vec<String> {
        self.upserts.lock().unwrap().clone()
    }
}

#[async_trait]
impl PackageIndexer for FakeIndexer {
    async fn upsert(&self, package: &str) -> SyncResult<()> {
        if self.failing {
            return Err(SyncError::ConnectionFailed("indexer down".into()));
        }
        self.upserts.lock().unwrap().push(package.to_string());
        Ok(())
    }
}

pub struct FakeIdentity {
    profile: Mutex<Option<GithubProfile>>,
    failing: bool,
    calls: AtomicUsize,
}

impl FakeIdentity {
    pub fn new(profile: Option<GithubProfile>) -> Self {
        FakeIdentity {
            profile: Mutex::new(profile),
            failing: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        FakeIdentity {
            failing: true,
            ..FakeIdentity::new(None)
        }
    }

    pub fn set_profile(&self, profile: Option<GithubProfile>) {
        *self.profile.lock().unwrap() = profile;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityProvider for FakeIdentity {
    async fn fetch_profile(&self) -> SyncResult<Option<GithubProfile>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing {
            return Err(SyncError::ConnectionFailed("locker down".into()));
        }
        Ok(self.profile.lock().unwrap().clone())
    }
}

/// Password deriver returning a fixed value.
pub struct FixedPassword(pub String);

impl PasswordDeriver for FixedPassword {
    fn derive(&self, _email: &str) -> String {
        self.0.clone()
    }
}
