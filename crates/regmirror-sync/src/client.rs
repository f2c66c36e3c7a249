//! # Registry HTTP Client
//!
//! Talks to the two registry endpoints the mirror uses.
//!
//! ## Endpoints
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  GET  {base}/-/all/since?stale=update_after&startkey={watermark}        │
//! │       → { "<name>": <record>, ..., "_updated": <meta> }                 │
//! │                                                                         │
//! │  PUT  {base}/-/user/org.couchdb.user:{name}                             │
//! │       body: UserDocument → raw status returned to the caller            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Retry
//! A fetch that fails with a retryable error (connection, timeout, 429,
//! 5xx) is retried with exponential backoff until the retry budget is
//! spent; the next timer tick is the outer retry.

use async_trait::async_trait;
use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use regmirror_core::{RegistryDelta, SyncWatermark, UserDocument};

use crate::capability::RegistryClient;
use crate::config::{parse_http_url, MirrorConfig};
use crate::error::{SyncError, SyncResult};

/// Builds the shared HTTP client.
pub(crate) fn build_client(timeout: Duration) -> SyncResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("regmirror/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| SyncError::InvalidConfig(format!("HTTP client: {}", e)))
}

/// Appends path segments to a base URL, keeping the base's own path.
pub(crate) fn join_segments(base: &Url, segments: &[&str]) -> SyncResult<Url> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| SyncError::InvalidUrl(format!("{} cannot be a base", base)))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

// =============================================================================
// HTTP Registry
// =============================================================================

/// [`RegistryClient`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpRegistry {
    client: reqwest::Client,
    base: Url,
    retry_budget: Option<Duration>,
}

impl HttpRegistry {
    /// Client for `base_url` without fetch retries.
    pub fn new(base_url: &str, timeout: Duration) -> SyncResult<Self> {
        Ok(HttpRegistry {
            client: build_client(timeout)?,
            base: parse_http_url("registry.base_url", base_url)?,
            retry_budget: None,
        })
    }

    pub fn from_config(config: &MirrorConfig) -> SyncResult<Self> {
        Ok(Self::new(&config.registry.base_url, config.request_timeout())?
            .with_retry_budget(config.fetch_max_elapsed()))
    }

    /// Total time a single fetch may spend retrying; `None` disables retries.
    pub fn with_retry_budget(mut self, budget: Option<Duration>) -> Self {
        self.retry_budget = budget;
        self
    }

    pub fn since_url(&self, since: SyncWatermark) -> SyncResult<Url> {
        let mut url = join_segments(&self.base, &["-", "all", "since"])?;
        url.query_pairs_mut()
            .append_pair("stale", "update_after")
            .append_pair("startkey", &since.to_string());
        Ok(url)
    }

    pub fn user_url(&self, name: &str) -> SyncResult<Url> {
        join_segments(&self.base, &["-", "user", &UserDocument::doc_id(name)])
    }

    fn create_backoff(&self) -> Option<ExponentialBackoff> {
        self.retry_budget.map(|budget| ExponentialBackoff {
            initial_interval: Duration::from_millis(500),
            max_interval: Duration::from_secs(10),
            max_elapsed_time: Some(budget),
            ..ExponentialBackoff::default()
        })
    }

    async fn fetch_once(&self, url: &Url) -> SyncResult<RegistryDelta> {
        let response = self.client.get(url.clone()).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body: Value = response.json().await?;
        let entries: Map<String, Value> = match body {
            Value::Object(map) => map,
            other => {
                return Err(SyncError::InvalidResponse(format!(
                    "expected an object keyed by package name, got {}",
                    json_kind(&other)
                )))
            }
        };

        Ok(RegistryDelta::from_response(entries))
    }
}

#[async_trait]
impl RegistryClient for HttpRegistry {
    async fn fetch_since(&self, since: SyncWatermark) -> SyncResult<RegistryDelta> {
        let url = self.since_url(since)?;
        let mut backoff = self.create_backoff();
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            debug!(url = %url, attempt, "Fetching registry changes");

            let err = match self.fetch_once(&url).await {
                Ok(delta) => return Ok(delta),
                Err(e) => e,
            };

            if !err.is_retryable() {
                return Err(err);
            }

            match backoff.as_mut().and_then(|b| b.next_backoff()) {
                Some(wait) => {
                    warn!(error = %err, attempt, ?wait, "Registry fetch failed, retrying");
                    tokio::time::sleep(wait).await;
                }
                None => return Err(err),
            }
        }
    }

    async fn add_user(&self, user: &UserDocument) -> SyncResult<u16> {
        let url = self.user_url(&user.name)?;
        info!(user = %user.name, "Provisioning registry user");

        let response = self.client.put(url).json(user).send().await?;
        Ok(response.status().as_u16())
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
