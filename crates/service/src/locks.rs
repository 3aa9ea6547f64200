//! Per-key async locks.
//!
//! Each key maps to its own `tokio::sync::Mutex`, so writers on different
//! keys never wait on each other. Entries are dropped from the map when the
//! last holder releases them.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

#[derive(Debug, Default)]
pub struct KeyLocks {
    inner: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl KeyLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait up to `timeout` for exclusive access to `key`. Returns `None`
    /// if the lock could not be taken in time.
    pub async fn lock(&self, key: &str, timeout: Duration) -> Option<KeyGuard<'_>> {
        let mutex = {
            let mut map = self.inner.lock();
            map.entry(key.to_string()).or_default().clone()
        };

        match tokio::time::timeout(timeout, mutex.lock_owned()).await {
            Ok(guard) => Some(KeyGuard {
                locks: self,
                key: key.to_string(),
                guard: Some(guard),
            }),
            Err(_) => None,
        }
    }

    /// Number of keys with a live lock entry.
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

/// Exclusive access to one key; released on drop.
#[derive(Debug)]
pub struct KeyGuard<'a> {
    locks: &'a KeyLocks,
    key: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl KeyGuard<'_> {
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for KeyGuard<'_> {
    fn drop(&mut self) {
        // Clones of the entry are only taken under the map lock, so a count
        // of one here means nobody else is holding or waiting on it.
        let mut map = self.locks.inner.lock();
        drop(self.guard.take());
        if map
            .get(&self.key)
            .is_some_and(|entry| Arc::strong_count(entry) == 1)
        {
            map.remove(&self.key);
        }
    }
}
