//! Storage record format.
//!
//! A record is the persisted form of one entity's sibling set: the
//! aggregate rating plus two index-aligned lists, `choices[i]` being the
//! value written under `clocks[i]`. Records are decoded through serde with
//! unknown fields rejected and then checked with [`RatingRecord::validate`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Current on-disk format number. Bump when the record layout changes.
pub const FORMAT_VERSION: u32 = 1;

/// Prefix under which rating records are keyed.
pub const KEY_PREFIX: &str = "/rating/";

/// Storage key for an entity.
pub fn storage_key(entity: &str) -> String {
    format!("{}{}", KEY_PREFIX, entity)
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RecordError {
    #[error("unsupported record format {found}")]
    UnsupportedFormat { found: u32 },
    #[error("choices ({choices}) and clocks ({clocks}) are not index-aligned")]
    Misaligned { choices: usize, clocks: usize },
    #[error("record holds no versions")]
    Empty,
    #[error("record holds a non-finite value")]
    NonFinite,
}

/// The persisted sibling set for one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RatingRecord {
    /// Layout version; see [`FORMAT_VERSION`].
    pub format: u32,
    /// Aggregate of `choices`, stored alongside for readers.
    pub rating: f64,
    /// Sibling values, in insertion order.
    pub choices: Vec<f64>,
    /// Sibling clocks: writer id -> counter, aligned with `choices`.
    pub clocks: Vec<BTreeMap<String, u64>>,
}

impl RatingRecord {
    /// Create a record in the current format.
    pub fn new(rating: f64, choices: Vec<f64>, clocks: Vec<BTreeMap<String, u64>>) -> Self {
        Self {
            format: FORMAT_VERSION,
            rating,
            choices,
            clocks,
        }
    }

    /// Check the invariants every stored record must satisfy.
    pub fn validate(&self) -> Result<(), RecordError> {
        if self.format != FORMAT_VERSION {
            return Err(RecordError::UnsupportedFormat { found: self.format });
        }
        if self.choices.len() != self.clocks.len() {
            return Err(RecordError::Misaligned {
                choices: self.choices.len(),
                clocks: self.clocks.len(),
            });
        }
        if self.choices.is_empty() {
            return Err(RecordError::Empty);
        }
        if !self.rating.is_finite() || self.choices.iter().any(|c| !c.is_finite()) {
            return Err(RecordError::NonFinite);
        }
        Ok(())
    }
}

/// A record together with the revision the store assigned when it was
/// written. Revisions only ever increase within one store.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord {
    pub revision: u64,
    pub record: RatingRecord,
}

/// One WAL entry: either the full record written for a key, or the removal
/// of that key (`record == None`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LogEntry {
    pub key: String,
    pub revision: u64,
    pub record: Option<RatingRecord>,
    /// Wall-clock timestamp (millis since epoch).
    pub timestamp_ms: u64,
}

impl LogEntry {
    pub fn put(key: String, revision: u64, record: RatingRecord) -> Self {
        Self {
            key,
            revision,
            record: Some(record),
            timestamp_ms: now_ms(),
        }
    }

    pub fn removal(key: String, revision: u64) -> Self {
        Self {
            key,
            revision,
            record: None,
            timestamp_ms: now_ms(),
        }
    }

    pub fn is_removal(&self) -> bool {
        self.record.is_none()
    }
}

fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
