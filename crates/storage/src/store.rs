//! Abstraction over the backing store the rating service reads and writes.
//!
//! The service never touches a concrete store: it is generic over
//! [`RatingStore`], so tests can substitute an in-memory engine or a store
//! that injects conflicts and failures.

use crate::engine::{CasResult, StorageEngine, StorageError};
use crate::record::{RatingRecord, StoredRecord};
use tokio::sync::RwLock;

/// Per-key record storage with an optimistic compare-and-swap primitive.
#[async_trait::async_trait]
pub trait RatingStore: Send + Sync + 'static {
    /// Load the record and revision stored under `key`.
    async fn load(&self, key: &str) -> Result<Option<StoredRecord>, StorageError>;

    /// Write `record` under `key` only if the key's revision still equals
    /// `expected` (`None` meaning the key must be absent).
    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<u64>,
        record: RatingRecord,
    ) -> Result<CasResult, StorageError>;

    /// Remove everything stored under `key`. Returns whether it existed.
    async fn remove(&self, key: &str) -> Result<bool, StorageError>;
}

/// A shared engine: reads take the read lock, writes the write lock, so
/// each compare-and-swap is atomic with respect to every other.
#[async_trait::async_trait]
impl RatingStore for RwLock<StorageEngine> {
    async fn load(&self, key: &str) -> Result<Option<StoredRecord>, StorageError> {
        Ok(self.read().await.get(key))
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<u64>,
        record: RatingRecord,
    ) -> Result<CasResult, StorageError> {
        self.write().await.compare_and_swap(key, expected, record)
    }

    async fn remove(&self, key: &str) -> Result<bool, StorageError> {
        self.write().await.remove(key)
    }
}
