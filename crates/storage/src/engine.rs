//! Storage engine: combines WAL + Memtable behind compare-and-swap.
//!
//! All writes go through the WAL first (for durability), then into the
//! in-memory memtable (for fast reads). Every write is stamped with a fresh
//! revision; a writer must present the revision it read to replace a
//! record, so two writers racing on the same key cannot both succeed.

use crate::memtable::Memtable;
use crate::record::{LogEntry, RatingRecord, RecordError, StoredRecord};
use crate::wal::{FsyncPolicy, Wal, WalError};
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("WAL error: {0}")]
    Wal(#[from] WalError),
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("refusing to store invalid record: {0}")]
    Record(#[from] RecordError),
}

/// Result of a compare-and-swap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CasResult {
    /// The record was written under this new revision.
    Stored { revision: u64 },
    /// The key's revision no longer matched; nothing was written.
    Conflict { current: Option<u64> },
}

impl CasResult {
    pub fn is_stored(&self) -> bool {
        matches!(self, CasResult::Stored { .. })
    }
}

/// The storage engine. All operations are synchronous; the async
/// boundary is at the caller (see [`crate::store::RatingStore`]).
#[derive(Debug)]
pub struct StorageEngine {
    memtable: Memtable,
    /// `None` for a purely in-memory engine.
    wal: Option<Wal>,
    next_revision: u64,
}

impl StorageEngine {
    /// Open or create a durable storage engine at the given directory.
    pub fn open(data_dir: &Path, fsync: FsyncPolicy) -> Result<Self, StorageError> {
        std::fs::create_dir_all(data_dir)?;
        let wal_path = data_dir.join("wal.log");

        // Replay WAL to rebuild memtable
        let replay = Wal::replay(&wal_path)?;
        let last_revision = replay.entries.iter().map(|e| e.revision).max().unwrap_or(0);
        let mut memtable = Memtable::new();
        for entry in replay.entries {
            memtable.load_from_wal(entry);
        }

        // New frames must follow the last intact one or the next replay
        // would stop short of them.
        let dropped = Wal::truncate_tail(&wal_path, replay.valid_len)?;
        if dropped > 0 {
            tracing::warn!(
                "truncated {} bytes of damaged WAL tail at {:?} (kept {} bytes)",
                dropped,
                wal_path,
                replay.valid_len
            );
        }

        let wal = Wal::open(&wal_path, fsync)?;

        tracing::info!(
            "storage engine opened: {} keys recovered from WAL at {:?}",
            memtable.len(),
            wal_path
        );

        Ok(Self {
            memtable,
            wal: Some(wal),
            next_revision: last_revision + 1,
        })
    }

    /// A non-durable engine, for tests and `backend: memory`.
    pub fn in_memory() -> Self {
        Self {
            memtable: Memtable::new(),
            wal: None,
            next_revision: 1,
        }
    }

    pub fn is_durable(&self) -> bool {
        self.wal.is_some()
    }

    /// Get the stored record for a key.
    pub fn get(&self, key: &str) -> Option<StoredRecord> {
        self.memtable.get(key)
    }

    /// Replace the record for `key` if its current revision is `expected`
    /// (`None` meaning "absent").
    pub fn compare_and_swap(
        &mut self,
        key: &str,
        expected: Option<u64>,
        record: RatingRecord,
    ) -> Result<CasResult, StorageError> {
        let current = self.memtable.revision(key);
        if current != expected {
            return Ok(CasResult::Conflict { current });
        }
        record.validate()?;

        let revision = self.take_revision();
        if let Some(wal) = self.wal.as_mut() {
            wal.append(&LogEntry::put(key.to_string(), revision, record.clone()))?;
        }
        self.memtable.insert(key.to_string(), revision, record);
        Ok(CasResult::Stored { revision })
    }

    /// Remove a key entirely. Returns whether anything was stored.
    pub fn remove(&mut self, key: &str) -> Result<bool, StorageError> {
        if self.memtable.revision(key).is_none() {
            return Ok(false);
        }
        let revision = self.take_revision();
        if let Some(wal) = self.wal.as_mut() {
            wal.append(&LogEntry::removal(key.to_string(), revision))?;
        }
        self.memtable.remove(key);
        Ok(true)
    }

    /// Number of distinct keys.
    pub fn key_count(&self) -> usize {
        self.memtable.len()
    }

    /// Sync the WAL to disk (for batch fsync mode). No-op in memory.
    pub fn sync(&mut self) -> Result<(), StorageError> {
        if let Some(wal) = self.wal.as_mut() {
            wal.sync()?;
        }
        Ok(())
    }

    fn take_revision(&mut self) -> u64 {
        let revision = self.next_revision;
        self.next_revision += 1;
        revision
    }
}
