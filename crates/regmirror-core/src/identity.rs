//! # Identity and Registry Credentials
//!
//! Types for the account that publishes packages: the connected profile, the
//! persisted registry credential bundle, and the user document sent when the
//! account is first provisioned on the registry.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha1::{Digest, Sha1};

use crate::error::CoreResult;
use crate::validation::validate_password;

/// Salt used for provisioned registry users.
pub const USER_SALT: &str = "na";

// =============================================================================
// Profile
// =============================================================================

/// The connected GitHub profile that drives publishing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GithubProfile {
    /// Account login, also used as the registry username.
    pub login: String,

    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Email; required to derive the registry password.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Remaining profile fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl GithubProfile {
    /// Display name, falling back to the login.
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(&self.login)
    }
}

// =============================================================================
// Registry Auth
// =============================================================================

/// Persisted registry credentials (`registry_auth.json`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryAuth {
    /// Base64 of `username:password`.
    #[serde(rename = "_auth")]
    pub auth: String,

    /// Registry username.
    pub username: String,
}

impl RegistryAuth {
    /// Builds basic-auth credentials for a user.
    pub fn basic(username: &str, password: &str) -> CoreResult<Self> {
        validate_password(password)?;
        Ok(RegistryAuth {
            auth: STANDARD.encode(format!("{}:{}", username, password)),
            username: username.to_string(),
        })
    }
}

// =============================================================================
// User Document
// =============================================================================

/// Body of the user-provisioning request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserDocument {
    pub name: String,
    pub salt: String,
    pub password_sha: String,
    pub email: String,
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub roles: Vec<String>,
    pub date: String,
}

impl UserDocument {
    /// Builds the document for `name`, hashing the password with the fixed salt.
    ///
    /// Passwords containing `:` are rejected.
    pub fn new(name: &str, password: &str, email: &str, date: DateTime<Utc>) -> CoreResult<Self> {
        validate_password(password)?;

        let mut hasher = Sha1::new();
        hasher.update(password.as_bytes());
        hasher.update(USER_SALT.as_bytes());
        let password_sha = hex::encode(hasher.finalize());

        Ok(UserDocument {
            name: name.to_string(),
            salt: USER_SALT.to_string(),
            password_sha,
            email: email.to_string(),
            id: Self::doc_id(name),
            kind: "user".to_string(),
            roles: Vec::new(),
            date: date.to_rfc3339_opts(SecondsFormat::Millis, true),
        })
    }

    /// Document id for a username.
    pub fn doc_id(name: &str) -> String {
        format!("org.couchdb.user:{}", name)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
