//! Change-detection state and its persistence.
//!
//! The persisted document maps a listing identity to what was last
//! delivered for it:
//!
//! ```text
//! {
//!   "seen_ids": {
//!     "https://ucuzaucak.net/ilan/istanbul-tokyo": {
//!       "first_seen": "2025-11-02T08:10:04Z",
//!       "last_seen": "2025-11-09T08:10:11Z",
//!       "url": "https://ucuzaucak.net/ilan/istanbul-tokyo/",
//!       "price": 19920,
//!       "price_hash": "5f0c...",
//!       "last_dates_preview": ["24 Kasım – 01 Aralık (7 Gün)"]
//!     }
//!   }
//! }
//! ```
//!
//! Older files may use `"posts"` instead of `"seen_ids"`, plain `true` flags
//! instead of objects, or objects without `price_hash`. All of them load;
//! entries without a fingerprint are treated as changed on next sight.

pub mod local;

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{AppError, Result};
use crate::models::Record;
use crate::utils::url::canonical_identity;

// Re-export for convenience
pub use local::LocalStateStore;

/// Date lines kept per entry for diagnostics.
pub const PREVIEW_LEN: usize = 5;

/// What was last delivered for one identity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeenEntry {
    #[serde(
        default,
        deserialize_with = "lenient_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub first_seen: Option<DateTime<Utc>>,

    #[serde(
        default,
        deserialize_with = "lenient_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_seen: Option<DateTime<Utc>>,

    #[serde(default)]
    pub url: String,

    /// Last delivered price; 0 when unresolved
    #[serde(default)]
    pub price: u64,

    /// Fingerprint of the last delivered content; absent for legacy entries
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_hash: Option<String>,

    /// Most recent date lines, never read back for decisions
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub last_dates_preview: Vec<String>,
}

impl SeenEntry {
    /// Entry recorded by an older format without a content fingerprint.
    pub fn is_legacy(&self) -> bool {
        self.price_hash.is_none()
    }
}

/// Outcome of comparing a record against persisted state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    /// Identity never delivered
    New,
    /// Delivered before with different content, or fingerprint unknown
    Changed,
    /// Delivered with the same fingerprint
    Unchanged,
}

impl Change {
    pub fn needs_notification(self) -> bool {
        !matches!(self, Change::Unchanged)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Change::New => "new",
            Change::Changed => "changed",
            Change::Unchanged => "unchanged",
        }
    }
}

/// In-memory view of the state file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PersistedState {
    pub seen_ids: BTreeMap<String, SeenEntry>,
}

/// Entry shapes found in state files written by earlier versions.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawEntry {
    Flag(bool),
    Entry(SeenEntry),
    Unknown(serde_json::Value),
}

#[derive(Deserialize)]
struct RawState {
    #[serde(default)]
    seen_ids: BTreeMap<String, RawEntry>,
    #[serde(default)]
    posts: BTreeMap<String, RawEntry>,
}

impl PersistedState {
    /// Parse a state document, accepting every historical layout.
    ///
    /// Fails only when the document is not a JSON object at all.
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        let raw: RawState = serde_json::from_slice(bytes)
            .map_err(|e| AppError::state(format!("unreadable state document: {e}")))?;

        let mut seen_ids: BTreeMap<String, SeenEntry> = BTreeMap::new();
        // Keys are re-canonicalized, so older raw-address keys merge with
        // current ones. `seen_ids` wins over `posts`, and a fingerprinted
        // entry is never replaced by a legacy one.
        for (key, entry) in raw.posts.into_iter().chain(raw.seen_ids) {
            let entry = match entry {
                RawEntry::Flag(false) => continue,
                RawEntry::Flag(true) | RawEntry::Unknown(_) => SeenEntry::default(),
                RawEntry::Entry(entry) => entry,
            };
            let identity = canonical_identity(&key);
            let keep_existing = seen_ids
                .get(&identity)
                .is_some_and(|existing| !existing.is_legacy() && entry.is_legacy());
            if !keep_existing {
                seen_ids.insert(identity, entry);
            }
        }
        Ok(Self { seen_ids })
    }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    pub fn len(&self) -> usize {
        self.seen_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen_ids.is_empty()
    }

    pub fn get(&self, identity: &str) -> Option<&SeenEntry> {
        self.seen_ids.get(identity)
    }

    /// Compare a record's fingerprint with the stored one for its identity.
    pub fn change_for(&self, record: &Record) -> Change {
        match self.seen_ids.get(&record.identity) {
            None => Change::New,
            Some(entry) => match &entry.price_hash {
                Some(hash) if *hash == record.fingerprint() => Change::Unchanged,
                _ => Change::Changed,
            },
        }
    }

    /// Overwrite the entry for a delivered record, keeping its first sighting.
    pub fn record_delivery(&mut self, record: &Record, now: DateTime<Utc>) {
        let entry = self.seen_ids.entry(record.identity.clone()).or_default();
        entry.first_seen = Some(entry.first_seen.unwrap_or(now));
        entry.last_seen = Some(now);
        entry.url = record.url.clone();
        entry.price = record.price;
        entry.price_hash = Some(record.fingerprint());

        let labels = record.date_labels();
        let skip = labels.len().saturating_sub(PREVIEW_LEN);
        entry.last_dates_preview = labels[skip..].iter().map(|l| l.to_string()).collect();
    }

    /// Entries without a content fingerprint.
    pub fn legacy_count(&self) -> usize {
        self.seen_ids.values().filter(|e| e.is_legacy()).count()
    }

    /// Most recently delivered entry.
    pub fn newest(&self) -> Option<(&str, &SeenEntry)> {
        self.seen_ids
            .iter()
            .filter(|(_, e)| e.last_seen.or(e.first_seen).is_some())
            .max_by_key(|(_, e)| e.last_seen.or(e.first_seen))
            .map(|(id, e)| (id.as_str(), e))
    }
}

/// Persistence boundary for change detection.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Decide whether a record is new, changed or unchanged.
    fn check(&self, record: &Record) -> Change;

    /// Record a successful delivery and persist the full state.
    ///
    /// Idempotent: committing the same record twice leaves the same entry.
    async fn commit(&mut self, record: &Record) -> Result<()>;

    /// Current in-memory state.
    fn state(&self) -> &PersistedState;
}

/// Parse RFC 3339, or a naive ISO timestamp taken as UTC; anything else is dropped.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|t| t.and_utc())
        })
}

fn lenient_timestamp<'de, D>(deserializer: D) -> std::result::Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(parse_timestamp))
}
