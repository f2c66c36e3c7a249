//! # Auto-Update Policy
//!
//! Decides whether an installed package should be upgraded after a registry
//! record for it arrives.
//!
//! ## Decision Table
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  installed.repository.update │ installed vs latest │ decision           │
//! │  ────────────────────────────┼─────────────────────┼─────────────────── │
//! │  "auto"                      │ 1.0.0 < 1.1.0       │ Update             │
//! │  "auto"                      │ 1.0.0 = 1.0.0       │ UpToDate           │
//! │  "auto"                      │ 1.0.0 > 0.9.0       │ UpToDate           │
//! │  "manual" / absent           │ any                 │ NotOptedIn         │
//! │  "auto"                      │ unparsable / no tag │ Undecidable        │
//! │                                                                         │
//! │  Versions compare as semver, never as strings: "1.10.0" > "1.9.0".     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use semver::Version;

use crate::error::{CoreError, CoreResult};
use crate::manifest::{PackageManifest, UpdateMode};
use crate::registry::RegistryRecord;

// =============================================================================
// Version Parsing
// =============================================================================

/// Parses a version string, tolerating surrounding whitespace and a leading
/// `v` or `=` the way registry clients commonly do.
pub fn parse_version(raw: &str) -> CoreResult<Version> {
    let cleaned = raw.trim();
    let cleaned = cleaned
        .strip_prefix('=')
        .or_else(|| cleaned.strip_prefix('v'))
        .unwrap_or(cleaned);

    Version::parse(cleaned).map_err(|e| CoreError::InvalidVersion {
        value: raw.to_string(),
        reason: e.to_string(),
    })
}

// =============================================================================
// Update Decision
// =============================================================================

/// Outcome of evaluating one installed package against a registry record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateDecision {
    /// The package opted in and the registry has a newer version.
    Update { from: Version, to: Version },

    /// The package did not opt into automatic updates.
    NotOptedIn,

    /// Installed version is equal to or newer than the registry's latest.
    UpToDate,

    /// A version was missing or not semver.
    Undecidable(String),
}

impl UpdateDecision {
    /// Returns true if an update should be triggered.
    pub fn should_update(&self) -> bool {
        matches!(self, UpdateDecision::Update { .. })
    }
}

/// Evaluates the auto-update rule for an installed package.
pub fn evaluate_update(installed: &PackageManifest, record: &RegistryRecord) -> UpdateDecision {
    if installed.update_mode() != UpdateMode::Auto {
        return UpdateDecision::NotOptedIn;
    }

    let latest = match record.latest_version() {
        Ok(Some(version)) => version,
        Ok(None) => return UpdateDecision::Undecidable("registry record has no latest tag".into()),
        Err(e) => return UpdateDecision::Undecidable(e.to_string()),
    };

    let current = match parse_version(&installed.version) {
        Ok(version) => version,
        Err(e) => return UpdateDecision::Undecidable(e.to_string()),
    };

    if current < latest {
        UpdateDecision::Update {
            from: current,
            to: latest,
        }
    } else {
        UpdateDecision::UpToDate
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn installed(version: &str, update: &str) -> PackageManifest {
        serde_json::from_value(json!({
            "name": "a",
            "version": version,
            "repository": {"update": update}
        }))
        .unwrap()
    }

    fn latest(version: &str) -> RegistryRecord {
        serde_json::from_value(json!({"dist-tags": {"latest": version}})).unwrap()
    }

    #[test]
    fn test_auto_and_newer_triggers_update() {
        let decision = evaluate_update(&installed("1.0.0", "auto"), &latest("1.1.0"));
        assert_eq!(
            decision,
            UpdateDecision::Update {
                from: Version::new(1, 0, 0),
                to: Version::new(1, 1, 0),
            }
        );
        assert!(decision.should_update());
    }

    #[test]
    fn test_manual_never_updates() {
        let decision = evaluate_update(&installed("1.0.0", "manual"), &latest("1.1.0"));
        assert_eq!(decision, UpdateDecision::NotOptedIn);
    }

    #[test]
    fn test_older_registry_version_does_not_update() {
        let decision = evaluate_update(&installed("1.0.0", "auto"), &latest("0.9.0"));
        assert_eq!(decision, UpdateDecision::UpToDate);
    }

    #[test]
    fn test_equal_version_does_not_update() {
        let decision = evaluate_update(&installed("1.1.0", "auto"), &latest("1.1.0"));
        assert_eq!(decision, UpdateDecision::UpToDate);
    }

    #[test]
    fn test_semver_not_lexical() {
        // Lexically "1.10.0" < "1.9.0"; as versions it is newer.
        let decision = evaluate_update(&installed("1.9.0", "auto"), &latest("1.10.0"));
        assert!(decision.should_update());
    }

    #[test]
    fn test_prerelease_orders_before_release() {
        let decision = evaluate_update(&installed("2.0.0-beta.1", "auto"), &latest("2.0.0"));
        assert!(decision.should_update());
    }

    #[test]
    fn test_undecidable_versions() {
        let decision = evaluate_update(&installed("banana", "auto"), &latest("1.0.0"));
        assert!(matches!(decision, UpdateDecision::Undecidable(_)));

        let no_tag: RegistryRecord = serde_json::from_value(json!({})).unwrap();
        let decision = evaluate_update(&installed("1.0.0", "auto"), &no_tag);
        assert!(matches!(decision, UpdateDecision::Undecidable(_)));
    }

    #[test]
    fn test_parse_version_prefixes() {
        assert_eq!(parse_version(" v1.2.3 ").unwrap(), Version::new(1, 2, 3));
        assert_eq!(parse_version("=1.2.3").unwrap(), Version::new(1, 2, 3));
        assert!(parse_version("1.2").is_err());
    }
}
