//! In-memory table for fast key lookups.
//!
//! Holds the latest record and revision for every live key. The memtable
//! does no conflict resolution of its own: sibling merging happens in the
//! service before a record reaches storage.

use crate::record::{LogEntry, RatingRecord, StoredRecord};
use std::collections::HashMap;

/// In-memory key -> latest stored record.
#[derive(Debug, Default)]
pub struct Memtable {
    data: HashMap<String, StoredRecord>,
}

impl Memtable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the stored record for a key.
    pub fn get(&self, key: &str) -> Option<StoredRecord> {
        self.data.get(key).cloned()
    }

    /// Current revision of a key, `None` if absent.
    pub fn revision(&self, key: &str) -> Option<u64> {
        self.data.get(key).map(|s| s.revision)
    }

    /// Replace the record for a key unconditionally.
    pub fn insert(&mut self, key: String, revision: u64, record: RatingRecord) {
        self.data.insert(key, StoredRecord { revision, record });
    }

    /// Remove a key, returning what was stored.
    pub fn remove(&mut self, key: &str) -> Option<StoredRecord> {
        self.data.remove(key)
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Apply an entry during WAL replay. Entries arrive in WAL order, so the
    /// last entry for a key is the truth.
    pub fn load_from_wal(&mut self, entry: LogEntry) {
        match entry.record {
            Some(record) => self.insert(entry.key, entry.revision, record),
            None => {
                self.data.remove(&entry.key);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn record(value: f64, writer: &str) -> RatingRecord {
        let clock: BTreeMap<String, u64> = [(writer.to_string(), 1)].into_iter().collect();
        RatingRecord::new(value, vec![value], vec![clock])
    }

    #[test]
    fn test_memtable_insert_get() {
        let mut mt = Memtable::new();
        mt.insert("k1".into(), 1, record(5.0, "c0"));

        let stored = mt.get("k1").unwrap();
        assert_eq!(stored.revision, 1);
        assert_eq!(stored.record.choices, vec![5.0]);
        assert_eq!(mt.revision("k1"), Some(1));
    }

    #[test]
    fn test_memtable_insert_replaces() {
        let mut mt = Memtable::new();
        mt.insert("k1".into(), 1, record(5.0, "c0"));
        mt.insert("k1".into(), 2, record(3.0, "c1"));

        let stored = mt.get("k1").unwrap();
        assert_eq!(stored.revision, 2);
        assert_eq!(stored.record.rating, 3.0);
        assert_eq!(mt.len(), 1);
    }

    #[test]
    fn test_memtable_not_found() {
        let mt = Memtable::new();
        assert!(mt.get("nonexistent").is_none());
        assert_eq!(mt.revision("nonexistent"), None);
    }

    #[test]
    fn test_memtable_remove() {
        let mut mt = Memtable::new();
        mt.insert("k1".into(), 1, record(5.0, "c0"));
        assert!(mt.remove("k1").is_some());
        assert!(mt.remove("k1").is_none());
        assert!(mt.is_empty());
    }

    #[test]
    fn test_memtable_load_from_wal_removal() {
        let mut mt = Memtable::new();
        mt.load_from_wal(LogEntry::put("k1".into(), 1, record(5.0, "c0")));
        assert_eq!(mt.len(), 1);

        mt.load_from_wal(LogEntry::removal("k1".into(), 2));
        assert_eq!(mt.len(), 0);
        assert!(mt.get("k1").is_none());
    }
}
