//! # Sync Engine
//!
//! Main orchestrator: pulls registry changes, merges them into the index,
//! triggers auto-updates and persists the result.
//!
//! ## One Sync Run
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        SyncEngine::sync()                               │
//! │                                                                         │
//! │  run lock (one run at a time; try_sync() skips if held)                 │
//! │     │                                                                   │
//! │     ▼                                                                   │
//! │  1. since = index.watermark()             0 on cold start               │
//! │  2. delta = registry.fetch_since(since)                                 │
//! │  3. error or empty ───────────────────────► no-op, nothing written      │
//! │  4. index.merge(delta)                    last writer wins              │
//! │  5. for name in delta ∩ installed:                                      │
//! │        evaluate_update(installed, record) ─► queue.submit(name)         │
//! │  6. cache.persist(index)                  failure logged, run succeeds  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Timer
//! `spawn(interval)` runs `try_sync()` immediately and then every interval.
//! Missed ticks are skipped, never bunched.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use regmirror_core::{
    evaluate_update, InstalledSet, PackageManifest, RegistryIndex, RegistryRecord, SyncWatermark,
    UpdateDecision,
};
use regmirror_store::{RegistryCache, Store};

use crate::capability::{PackageIndexer, PackageInstaller, RegistryClient};
use crate::dispatcher::Dispatcher;
use crate::error::{SyncError, SyncResult};
use crate::queue::UpdateQueue;
use crate::scanner::Scanner;
use crate::state::{SharedState, SyncStatus};

// =============================================================================
// Outcome
// =============================================================================

/// What a merging run did.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncReport {
    /// Watermark the fetch started from.
    pub since: SyncWatermark,
    /// Watermark after the merge.
    pub watermark: SyncWatermark,
    /// Records written into the index.
    pub merged: usize,
    /// Entries dropped because they did not decode.
    pub skipped: usize,
    /// Packages whose auto-update was submitted by this run.
    pub updates: Vec<String>,
    /// Whether the snapshot reached disk.
    pub persisted: bool,
}

/// Result of one sync attempt.
#[derive(Debug)]
pub enum SyncOutcome {
    /// Another run was in flight (`try_sync` only).
    Skipped,
    /// The registry returned nothing new.
    NoChanges,
    /// The fetch failed; nothing was changed.
    Failed(SyncError),
    /// Records were merged.
    Merged(SyncReport),
}

impl SyncOutcome {
    pub fn report(&self) -> Option<&SyncReport> {
        match self {
            SyncOutcome::Merged(report) => Some(report),
            _ => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, SyncOutcome::Failed(_))
    }
}

// =============================================================================
// Sync Engine
// =============================================================================

pub struct SyncEngine {
    registry: Arc<dyn RegistryClient>,
    cache: RegistryCache,
    state: Arc<SharedState>,
    dispatcher: Arc<Dispatcher>,
    queue: UpdateQueue,
    run_lock: Mutex<()>,
}

impl SyncEngine {
    /// Starts building an engine over an opened store.
    pub fn builder(store: Store) -> SyncEngineBuilder {
        SyncEngineBuilder::new(store)
    }

    /// Runs a sync, waiting for any in-flight run first.
    pub async fn sync(&self) -> SyncOutcome {
        let _guard = self.run_lock.lock().await;
        self.run_locked().await
    }

    /// Runs a sync unless one is already in flight.
    pub async fn try_sync(&self) -> SyncOutcome {
        match self.run_lock.try_lock() {
            Ok(_guard) => self.run_locked().await,
            Err(_) => {
                debug!("Sync already running, skipping");
                SyncOutcome::Skipped
            }
        }
    }

    async fn run_locked(&self) -> SyncOutcome {
        self.state.update_status(|s| s.in_progress = true).await;
        let outcome = self.run_once().await;

        let finished = Utc::now();
        self.state
            .update_status(|s| {
                s.in_progress = false;
                match &outcome {
                    SyncOutcome::Failed(e) => s.last_error = Some(e.to_string()),
                    SyncOutcome::Merged(report) => {
                        s.last_sync = Some(finished);
                        s.last_error = None;
                        s.updates_triggered += report.updates.len() as u64;
                    }
                    SyncOutcome::NoChanges => {
                        s.last_sync = Some(finished);
                        s.last_error = None;
                    }
                    SyncOutcome::Skipped => {}
                }
            })
            .await;

        outcome
    }

    async fn run_once(&self) -> SyncOutcome {
        let since = self.state.watermark().await;
        debug!(%since, "Sync starting");

        let delta = match self.registry.fetch_since(since).await {
            Ok(delta) => delta,
            Err(e) => {
                warn!(%since, error = %e, retryable = e.is_retryable(), "Registry fetch failed");
                return SyncOutcome::Failed(e);
            }
        };

        for skipped in delta.skipped() {
            warn!(package = %skipped.name, reason = %skipped.reason, "Skipping non-object registry entry");
        }

        if delta.is_empty() {
            debug!(%since, "No registry changes");
            return SyncOutcome::NoChanges;
        }

        let (merged, snapshot) = self.state.merge(&delta).await;

        let installed = self.state.installed().await;
        let mut updates = Vec::new();
        for (name, record) in delta.entries() {
            let Some(current) = installed.get(name) else {
                continue;
            };
            if self.consider_update(name, current, record) {
                updates.push(name.clone());
            }
        }

        let persisted = match self.cache.persist(&snapshot).await {
            Ok(()) => true,
            Err(e) => {
                error!(path = %self.cache.path().display(), error = %e, "Failed to persist registry index");
                false
            }
        };

        let report = SyncReport {
            since,
            watermark: snapshot.watermark(),
            merged,
            skipped: delta.skipped().len(),
            updates,
            persisted,
        };
        info!(
            since = %report.since,
            watermark = %report.watermark,
            merged = report.merged,
            skipped = report.skipped,
            updates = report.updates.len(),
            "Sync complete"
        );
        SyncOutcome::Merged(report)
    }

    /// Submits an update if the policy allows; true if one was submitted.
    fn consider_update(&self, name: &str, installed: &PackageManifest, record: &RegistryRecord) -> bool {
        match evaluate_update(installed, record) {
            UpdateDecision::Update { from, to } => {
                let submitted = self.queue.submit(name);
                if submitted {
                    info!(package = %name, %from, %to, "Auto-update triggered");
                }
                submitted
            }
            UpdateDecision::Undecidable(reason) => {
                debug!(package = %name, %reason, "Cannot compare versions");
                false
            }
            UpdateDecision::NotOptedIn | UpdateDecision::UpToDate => false,
        }
    }

    /// Starts the recurring sync timer.
    pub fn spawn(self: &Arc<Self>, interval: Duration) -> SyncEngineHandle {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        let engine = Arc::clone(self);

        let task = tokio::spawn(async move {
            info!(interval_secs = interval.as_secs(), "Sync timer started");
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let SyncOutcome::Skipped = engine.try_sync().await {
                            debug!("Timer tick skipped, sync in flight");
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        info!("Sync timer received shutdown");
                        break;
                    }
                }
            }
        });

        SyncEngineHandle { shutdown_tx, task }
    }

    // =========================================================================
    // Dispatch & Accessors
    // =========================================================================

    pub async fn install(&self, name: &str) -> SyncResult<PackageManifest> {
        self.dispatcher.install(name).await
    }

    pub async fn update(&self, name: &str) -> SyncResult<PackageManifest> {
        self.dispatcher.update(name).await
    }

    pub async fn installed(&self) -> InstalledSet {
        self.state.installed().await
    }

    pub async fn registry(&self) -> RegistryIndex {
        self.state.index().await
    }

    pub async fn package(&self, name: &str) -> Option<RegistryRecord> {
        self.state.record(name).await
    }

    pub async fn viewers(&self) -> Vec<(String, RegistryRecord)> {
        self.state.viewers().await
    }

    pub async fn status(&self) -> SyncStatus {
        self.state.status().await
    }

    pub fn queue(&self) -> &UpdateQueue {
        &self.queue
    }

    pub fn state(&self) -> &Arc<SharedState> {
        &self.state
    }
}

impl std::fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("cache", &self.cache)
            .field("queue", &self.queue)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Handle
// =============================================================================

/// Handle for stopping a running sync timer.
pub struct SyncEngineHandle {
    shutdown_tx: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

impl SyncEngineHandle {
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Stops the timer and waits for it to exit. A run in progress finishes first.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
        if let Err(e) = self.task.await {
            error!(error = %e, "Sync timer task ended abnormally");
        }
    }
}

// =============================================================================
// Builder Pattern
// =============================================================================

/// Builder for [`SyncEngine`].
pub struct SyncEngineBuilder {
    store: Store,
    registry: Option<Arc<dyn RegistryClient>>,
    installer: Option<Arc<dyn PackageInstaller>>,
    indexer: Option<Arc<dyn PackageIndexer>>,
}

impl SyncEngineBuilder {
    pub fn new(store: Store) -> Self {
        SyncEngineBuilder {
            store,
            registry: None,
            installer: None,
            indexer: None,
        }
    }

    pub fn with_registry(mut self, registry: Arc<dyn RegistryClient>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn with_installer(mut self, installer: Arc<dyn PackageInstaller>) -> Self {
        self.installer = Some(installer);
        self
    }

    /// Defaults to [`NoopIndexer`](crate::capability::NoopIndexer).
    pub fn with_indexer(mut self, indexer: Arc<dyn PackageIndexer>) -> Self {
        self.indexer = Some(indexer);
        self
    }

    /// Scans installed packages, loads the persisted index and wires the engine.
    pub async fn build(self) -> SyncResult<SyncEngine> {
        let registry = self
            .registry
            .ok_or_else(|| SyncError::InvalidConfig("Registry client required".into()))?;
        let installer = self
            .installer
            .ok_or_else(|| SyncError::InvalidConfig("Package installer required".into()))?;
        let indexer = self
            .indexer
            .unwrap_or_else(|| Arc::new(crate::capability::NoopIndexer));

        let scanner = Arc::new(Scanner::new(self.store.layout().clone(), indexer));
        let installed = scanner.scan().await?;
        let index = self.store.registry().load().await;

        info!(
            installed = installed.len(),
            indexed = index.len(),
            watermark = %index.watermark(),
            "Sync engine state loaded"
        );

        let state = Arc::new(SharedState::new(installed, index));
        let dispatcher = Arc::new(Dispatcher::new(installer, scanner, state.clone()));
        let queue = UpdateQueue::new(dispatcher.clone());

        Ok(SyncEngine {
            registry,
            cache: self.store.registry().clone(),
            state,
            dispatcher,
            queue,
            run_lock: Mutex::new(()),
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
