//! # Sync Error Types
//!
//! Error types for sync, update and publish operations.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sync Error Categories                             │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Configuration  │  │     Remote      │  │     Caller Input        │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  InvalidConfig  │  │  Connection     │  │  InvalidArgument        │ │
//! │  │  InvalidUrl     │  │  Timeout        │  │  Validation             │ │
//! │  │  ConfigLoad/Save│  │  HttpStatus     │  │                         │ │
//! │  └─────────────────┘  │  InvalidResponse│  └─────────────────────────┘ │
//! │                       └─────────────────┘                              │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Local State    │  │   Installer     │  │      Publish            │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  Store          │  │  CommandFailed  │  │  IdentityUnavailable    │ │
//! │  │                 │  │                 │  │  ProvisioningRejected   │ │
//! │  │                 │  │                 │  │  PublishFailed{stage}   │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use regmirror_core::{CoreError, ValidationError};
use regmirror_store::StoreError;

use crate::publish::PublishStage;

/// Result type alias for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Sync error type covering all engine failures.
#[derive(Debug, Error)]
pub enum SyncError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid configuration value.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Invalid endpoint URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Failed to load config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// Failed to save config file.
    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    // =========================================================================
    // Remote Errors
    // =========================================================================
    /// Could not reach the remote endpoint.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Request took longer than the configured timeout.
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Remote answered with an unexpected status code.
    #[error("{url} answered with HTTP {status}")]
    HttpStatus { status: u16, url: String },

    /// Remote answered with a body we could not use.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    // =========================================================================
    // Caller Input Errors
    // =========================================================================
    /// Rejected before any I/O.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Field-level validation failure.
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    // =========================================================================
    // Local State Errors
    // =========================================================================
    /// Local file state could not be read or written.
    #[error(transparent)]
    Store(#[from] StoreError),

    // =========================================================================
    // Installer Errors
    // =========================================================================
    /// The package tool exited unsuccessfully or could not be started.
    #[error("`{command}` failed: {reason}")]
    CommandFailed { command: String, reason: String },

    // =========================================================================
    // Publish Errors
    // =========================================================================
    /// No connected account (or it lacks an email).
    #[error("Identity unavailable: {0}")]
    IdentityUnavailable(String),

    /// User provisioning answered with a status outside the accepted set.
    #[error("Registry rejected user provisioning with HTTP {status}")]
    ProvisioningRejected { status: u16 },

    /// A publish stage failed; the chain was aborted there.
    #[error("Publish failed at {stage}: {source}")]
    PublishFailed {
        stage: PublishStage,
        #[source]
        source: Box<SyncError>,
    },

    // =========================================================================
    // Internal Errors
    // =========================================================================
    /// Serialization of an outgoing body failed.
    #[error("Serialization failed: {0}")]
    SerializationFailed(String),

    /// Internal engine error.
    #[error("Internal error: {0}")]
    Internal(String),

    /// Engine is shutting down.
    #[error("Sync engine is shutting down")]
    ShuttingDown,
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<CoreError> for SyncError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation(v) => SyncError::Validation(v),
            other => SyncError::InvalidResponse(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::SerializationFailed(err.to_string())
    }
}

impl From<url::ParseError> for SyncError {
    fn from(err: url::ParseError) -> Self {
        SyncError::InvalidUrl(err.to_string())
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        let url = err
            .url()
            .map(|u| u.to_string())
            .unwrap_or_else(|| "request".to_string());

        if err.is_timeout() {
            SyncError::Timeout(url)
        } else if let Some(status) = err.status() {
            SyncError::HttpStatus {
                status: status.as_u16(),
                url,
            }
        } else if err.is_decode() {
            SyncError::InvalidResponse(err.to_string())
        } else {
            SyncError::ConnectionFailed(err.to_string())
        }
    }
}

impl From<toml::de::Error> for SyncError {
    fn from(err: toml::de::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for SyncError {
    fn from(err: toml::ser::Error) -> Self {
        SyncError::ConfigSaveFailed(err.to_string())
    }
}

// =============================================================================
// Error Categorization (for retry logic)
// =============================================================================

impl SyncError {
    /// Wraps an error as the failure of a publish stage.
    pub fn at_stage(self, stage: PublishStage) -> Self {
        match self {
            already @ SyncError::PublishFailed { .. } => already,
            other => SyncError::PublishFailed {
                stage,
                source: Box::new(other),
            },
        }
    }

    /// Returns true if the operation can be retried.
    ///
    /// ## Retryable Errors
    /// - Connection failures and timeouts
    /// - HTTP 429 and 5xx
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::ConnectionFailed(_) | SyncError::Timeout(_) => true,
            SyncError::HttpStatus { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// Returns true if this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            SyncError::InvalidConfig(_)
                | SyncError::InvalidUrl(_)
                | SyncError::ConfigLoadFailed(_)
                | SyncError::ConfigSaveFailed(_)
        )
    }

    /// Returns true if the caller passed something unusable.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            SyncError::InvalidArgument(_) | SyncError::Validation(_)
        )
    }

    /// Stage at which a publish failed, if this is a publish failure.
    pub fn publish_stage(&self) -> Option<PublishStage> {
        match self {
            SyncError::PublishFailed { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(SyncError::ConnectionFailed("reset".into()).is_retryable());
        assert!(SyncError::Timeout("http://r/".into()).is_retryable());
        assert!(SyncError::HttpStatus { status: 503, url: "u".into() }.is_retryable());
        assert!(SyncError::HttpStatus { status: 429, url: "u".into() }.is_retryable());

        assert!(!SyncError::HttpStatus { status: 404, url: "u".into() }.is_retryable());
        assert!(!SyncError::InvalidConfig("bad".into()).is_retryable());
        assert!(!SyncError::InvalidArgument("".into()).is_retryable());
    }

    #[test]
    fn test_categories() {
        assert!(SyncError::InvalidUrl("x".into()).is_config_error());
        assert!(SyncError::InvalidArgument("x".into()).is_input_error());
        let validation = ValidationError::Required { field: "name".into() };
        assert!(SyncError::from(validation).is_input_error());
    }

    #[test]
    fn test_at_stage_wraps_once() {
        let err = SyncError::IdentityUnavailable("none".into())
            .at_stage(PublishStage::NeedIdentity)
            .at_stage(PublishStage::Publish);

        assert_eq!(err.publish_stage(), Some(PublishStage::NeedIdentity));
        assert!(err.to_string().contains("need-identity"));
    }
}
