//! # Update Queue
//!
//! Background auto-updates, at most one queued or running per package.
//!
//! ```text
//! submit("links") ──► pending = {links} ──► spawn(dispatcher.update("links"))
//! submit("links") ──► already pending   ──► false (dropped)
//!                                             │
//!                          task ends ─────────┘ pending = {}  → wake wait_idle()
//! ```

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;
use tracing::{debug, info, warn};

use crate::dispatcher::Dispatcher;

struct QueueInner {
    dispatcher: Arc<Dispatcher>,
    pending: Mutex<HashSet<String>>,
    idle: Notify,
}

impl QueueInner {
    fn pending(&self) -> MutexGuard<'_, HashSet<String>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Removes a name from the pending set when its task ends, however it ends.
struct InFlightGuard {
    inner: Arc<QueueInner>,
    name: String,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let now_idle = {
            let mut pending = self.inner.pending();
            pending.remove(&self.name);
            pending.is_empty()
        };
        if now_idle {
            self.inner.idle.notify_waiters();
        }
    }
}

#[derive(Clone)]
pub struct UpdateQueue {
    inner: Arc<QueueInner>,
}

impl UpdateQueue {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        UpdateQueue {
            inner: Arc::new(QueueInner {
                dispatcher,
                pending: Mutex::new(HashSet::new()),
                idle: Notify::new(),
            }),
        }
    }

    /// Starts a background update of `name`.
    ///
    /// Returns false if an update for `name` is already queued or running.
    /// Must be called from within a Tokio runtime.
    pub fn submit(&self, name: &str) -> bool {
        if !self.inner.pending().insert(name.to_string()) {
            debug!(package = %name, "Update already in flight");
            return false;
        }

        let guard = InFlightGuard {
            inner: self.inner.clone(),
            name: name.to_string(),
        };

        tokio::spawn(async move {
            match guard.inner.dispatcher.update(&guard.name).await {
                Ok(manifest) => {
                    info!(package = %guard.name, version = %manifest.version, "Auto-update finished")
                }
                Err(e) => warn!(package = %guard.name, error = %e, "Auto-update failed"),
            }
            drop(guard);
        });

        true
    }

    pub fn in_flight(&self) -> usize {
        self.inner.pending().len()
    }

    pub fn is_pending(&self, name: &str) -> bool {
        self.inner.pending().contains(name)
    }

    /// Waits until no update is queued or running.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.in_flight() == 0 {
                return;
            }
            notified.await;
        }
    }
}

impl std::fmt::Debug for UpdateQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdateQueue")
            .field("in_flight", &self.in_flight())
            .finish()
    }
}
