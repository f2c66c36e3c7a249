//! # Registry Index
//!
//! In-memory mirror of what the remote registry knows: one record per
//! package name, merged from incremental fetches.
//!
//! ## Watermark Derivation
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Incremental Fetch                               │
//! │                                                                         │
//! │  RegistryIndex                                                          │
//! │  ┌───────────┬──────────────────────────────┐                           │
//! │  │ links     │ modified 2011-11-02T19:29Z   │                           │
//! │  │ photos    │ modified 2011-11-04T08:00Z   │ ◄── max = watermark       │
//! │  │ contacts  │ (no time block)              │     (not stored, derived) │
//! │  └───────────┴──────────────────────────────┘                           │
//! │                     │                                                   │
//! │                     ▼                                                   │
//! │  GET /-/all/since?stale=update_after&startkey=<watermark ms>            │
//! │                     │                                                   │
//! │                     ▼                                                   │
//! │  RegistryDelta ──merge──► RegistryIndex (overwrite per key)             │
//! │                                                                         │
//! │  Merging only inserts or overwrites, so the derived watermark never    │
//! │  moves backwards across successful syncs. Empty index → watermark 0.   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::DateTime;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::error::{CoreError, CoreResult};
use crate::manifest::Repository;
use crate::policy::parse_version;

// =============================================================================
// Registry Record
// =============================================================================

/// The `time` block of a registry record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordTime {
    /// Last modification, RFC 3339.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified: Option<String>,

    /// Per-version publish times and anything else.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The `dist-tags` block of a registry record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DistTags {
    /// Version tagged `latest`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest: Option<String>,

    /// Other tags.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A registry's stored metadata for one package.
///
/// Any JSON object decodes. A known block whose shape is unexpected stays in
/// [`extra`](Self::extra) under its original key, so it is neither lost nor
/// able to reject the rest of the record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Map<String, Value>")]
pub struct RegistryRecord {
    /// Modification times.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<RecordTime>,

    /// Version tags.
    #[serde(rename = "dist-tags", default, skip_serializing_if = "Option::is_none")]
    pub dist_tags: Option<DistTags>,

    /// Repository field as published.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<Repository>,

    /// Any other fields, preserved so the persisted snapshot is complete.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RegistryRecord {
    /// Last-modified time as epoch milliseconds, if present and parsable.
    pub fn modified_millis(&self) -> Option<i64> {
        let modified = self.time.as_ref()?.modified.as_deref()?;
        DateTime::parse_from_rfc3339(modified)
            .ok()
            .map(|dt| dt.timestamp_millis())
    }

    /// Raw `dist-tags.latest` value.
    pub fn latest_tag(&self) -> Option<&str> {
        self.dist_tags.as_ref()?.latest.as_deref()
    }

    /// `dist-tags.latest` as a semantic version.
    ///
    /// Returns `Ok(None)` when the record has no latest tag.
    pub fn latest_version(&self) -> CoreResult<Option<semver::Version>> {
        self.latest_tag().map(parse_version).transpose()
    }

    /// Returns true if the record describes a viewer package.
    pub fn is_viewer(&self) -> bool {
        self.repository
            .as_ref()
            .map(Repository::is_viewer)
            .unwrap_or(false)
    }
}

impl From<Map<String, Value>> for RegistryRecord {
    fn from(mut extra: Map<String, Value>) -> Self {
        RegistryRecord {
            time: take_typed(&mut extra, "time"),
            dist_tags: take_typed(&mut extra, "dist-tags"),
            repository: take_typed(&mut extra, "repository"),
            extra,
        }
    }
}

/// Moves `key` out of `fields` if its value decodes as `T`.
fn take_typed<T: DeserializeOwned>(fields: &mut Map<String, Value>, key: &str) -> Option<T> {
    let typed = T::deserialize(fields.get(key)?).ok()?;
    fields.remove(key);
    Some(typed)
}

// =============================================================================
// Sync Watermark
// =============================================================================

/// Lower bound (epoch milliseconds) for the next incremental fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SyncWatermark(i64);

impl SyncWatermark {
    /// The cold-start watermark: fetch everything.
    pub const ZERO: SyncWatermark = SyncWatermark(0);

    /// Creates a watermark from epoch milliseconds.
    #[inline]
    pub const fn from_millis(millis: i64) -> Self {
        SyncWatermark(millis)
    }

    /// Returns the watermark in epoch milliseconds.
    #[inline]
    pub const fn millis(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for SyncWatermark {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Registry Delta
// =============================================================================

/// An entry from a fetch response that could not be decoded.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedEntry {
    /// Package name the entry was keyed under.
    pub name: String,
    /// Why it was skipped.
    pub reason: String,
}

/// Records returned by one incremental fetch.
#[derive(Debug, Clone, Default)]
pub struct RegistryDelta {
    entries: BTreeMap<String, RegistryRecord>,
    skipped: Vec<SkippedEntry>,
}

impl RegistryDelta {
    /// Decodes a fetch response body (`name → record`).
    ///
    /// Keys starting with `_` are registry metadata (e.g. `_updated`) and are
    /// dropped silently. Every object is kept as a record; entries that are
    /// not objects are collected in [`skipped`](Self::skipped) and do not
    /// fail the batch.
    pub fn from_response(body: Map<String, Value>) -> Self {
        let mut delta = RegistryDelta::default();

        for (name, value) in body {
            if name.starts_with('_') {
                continue;
            }
            match value {
                Value::Object(fields) => {
                    delta.entries.insert(name, RegistryRecord::from(fields));
                }
                other => delta.skipped.push(SkippedEntry {
                    name,
                    reason: format!("expected an object, found {}", json_kind(&other)),
                }),
            }
        }

        delta
    }

    /// Builds a delta from already-decoded records.
    pub fn from_records<I>(records: I) -> Self
    where
        I: IntoIterator<Item = (String, RegistryRecord)>,
    {
        RegistryDelta {
            entries: records.into_iter().collect(),
            skipped: Vec::new(),
        }
    }

    /// Decoded records in name order.
    pub fn entries(&self) -> impl Iterator<Item = (&String, &RegistryRecord)> {
        self.entries.iter()
    }

    /// Entries that failed to decode.
    pub fn skipped(&self) -> &[SkippedEntry] {
        &self.skipped
    }

    /// Number of decoded records.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing usable was returned.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
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

// =============================================================================
// Registry Index
// =============================================================================

/// Package name → latest known registry record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegistryIndex(BTreeMap<String, RegistryRecord>);

impl RegistryIndex {
    /// Creates an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a persisted snapshot.
    pub fn from_json(json: &str) -> CoreResult<Self> {
        serde_json::from_str(json).map_err(|e| CoreError::InvalidRecord {
            name: "registry index".to_string(),
            reason: e.to_string(),
        })
    }

    /// Serializes the index for persistence.
    pub fn to_json(&self) -> CoreResult<String> {
        serde_json::to_string(self).map_err(|e| CoreError::InvalidRecord {
            name: "registry index".to_string(),
            reason: e.to_string(),
        })
    }

    /// Maximum `time.modified` across all records, or zero when none.
    pub fn watermark(&self) -> SyncWatermark {
        self.0
            .values()
            .filter_map(RegistryRecord::modified_millis)
            .max()
            .map(SyncWatermark::from_millis)
            .unwrap_or(SyncWatermark::ZERO)
    }

    /// Overwrites or inserts every record of the delta.
    ///
    /// Returns the number of records written.
    pub fn merge(&mut self, delta: &RegistryDelta) -> usize {
        for (name, record) in delta.entries() {
            self.0.insert(name.clone(), record.clone());
        }
        delta.len()
    }

    /// Inserts a single record.
    pub fn insert(&mut self, name: impl Into<String>, record: RegistryRecord) {
        self.0.insert(name.into(), record);
    }

    /// Looks up a package.
    pub fn get(&self, name: &str) -> Option<&RegistryRecord> {
        self.0.get(name)
    }

    /// Number of known packages.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if nothing is known yet.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over records in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &RegistryRecord)> {
        self.0.iter()
    }

    /// Records whose repository type is `viewer`.
    pub fn viewers(&self) -> Vec<(&String, &RegistryRecord)> {
        self.0.iter().filter(|(_, record)| record.is_viewer()).collect()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
