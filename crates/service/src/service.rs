//! Rating service: handles PUT/GET/DELETE for one entity at a time.
//!
//! A put runs read-merge-write:
//! 1. Take the entity's key lock (bounded by `lock_timeout`)
//! 2. Load the stored sibling set and its revision
//! 3. Merge the incoming version and aggregate the result
//! 4. Compare-and-swap the new record against the revision read in (2)
//! 5. On a revision conflict, go back to (2), at most `max_retries` times
//!
//! The key lock serializes writers inside this process; the revision check
//! catches writers that share the store from elsewhere.

use crate::locks::KeyLocks;
use ratings_core::{aggregate, merge, AggregateError, SiblingError, SiblingSet, VectorClock, Version};
use ratings_metrics::metrics;
use ratings_storage::record::storage_key;
use ratings_storage::{CasResult, RatingRecord, RatingStore, StorageError};
use std::sync::Arc;
use std::time::Duration;

/// Write-path tuning.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// How long a put waits for its key lock.
    pub lock_timeout: Duration,
    /// Read-merge-write attempts before giving up on a contended key. At
    /// least one attempt is always made, so `0` behaves like `1`.
    pub max_retries: usize,
    /// Upper bound on siblings per entity. `0` means unbounded.
    pub max_siblings: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            lock_timeout: Duration::from_millis(2000),
            max_retries: 5,
            max_siblings: 128,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("too much contention on '{entity}', retry later")]
    Contention { entity: String },
    #[error("write would leave {siblings} siblings, limit is {limit}")]
    TooManySiblings { siblings: usize, limit: usize },
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("stored siblings are corrupt: {0}")]
    Corrupt(#[from] SiblingError),
    #[error("invariant violated: {0}")]
    Invariant(#[from] AggregateError),
}

impl ServiceError {
    /// Whether the same request may succeed if sent again later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ServiceError::Contention { .. })
    }
}

/// Current state of one entity as seen by a reader.
#[derive(Debug, Clone, PartialEq)]
pub struct RatingView {
    /// Mean of every sibling value.
    pub rating: f64,
    /// Sibling values, index-aligned with `clocks`.
    pub choices: Vec<f64>,
    pub clocks: Vec<VectorClock>,
}

impl RatingView {
    fn new(rating: f64, siblings: SiblingSet) -> Self {
        let (choices, clocks) = siblings
            .into_versions()
            .into_iter()
            .map(|v| (v.value, v.clock))
            .unzip();
        Self {
            rating,
            choices,
            clocks,
        }
    }
}

/// Rating service over a store `S`.
///
/// Generic over `S: RatingStore` so tests can inject stores that conflict,
/// stall or fail.
pub struct RatingService<S: RatingStore> {
    store: Arc<S>,
    locks: KeyLocks,
    config: ServiceConfig,
}

impl<S: RatingStore> std::fmt::Debug for RatingService<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RatingService")
            .field("config", &self.config)
            .field("locked_keys", &self.locks.len())
            .finish_non_exhaustive()
    }
}

impl<S: RatingStore> RatingService<S> {
    pub fn new(store: Arc<S>, config: ServiceConfig) -> Self {
        Self {
            store,
            locks: KeyLocks::new(),
            config,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    // -----------------------------------------------------------------------
    // PUT
    // -----------------------------------------------------------------------

    /// Apply a rating written under `clock` and return the entity's new
    /// aggregate. A stale write changes nothing and returns the current
    /// aggregate.
    pub async fn put(
        &self,
        entity: &str,
        value: f64,
        clock: VectorClock,
    ) -> Result<f64, ServiceError> {
        let _timer = ratings_metrics::start_op_timer("put");
        metrics().puts.inc();

        let key = storage_key(entity);
        let Some(_guard) = self.locks.lock(&key, self.config.lock_timeout).await else {
            tracing::warn!(
                key = %key,
                timeout_ms = self.config.lock_timeout.as_millis() as u64,
                "timed out waiting for key lock"
            );
            metrics().contention_failures.inc();
            return Err(ServiceError::Contention {
                entity: entity.to_string(),
            });
        };

        let incoming = Version::new(value, clock);
        let attempts = self.config.max_retries.max(1);
        for attempt in 1..=attempts {
            let (expected, current) = match self.store.load(&key).await? {
                Some(stored) => (Some(stored.revision), siblings_of(&stored.record)?),
                None => (None, SiblingSet::new()),
            };

            let resolution = merge(current, incoming.clone());
            let outcome = resolution.outcome;
            let siblings = resolution.into_siblings();
            let rating = aggregate(&siblings)?;

            if !outcome.is_applied() {
                metrics().stale_writes.inc();
                tracing::debug!(
                    key = %key,
                    outcome = outcome.as_str(),
                    siblings = siblings.len(),
                    "write already covered, nothing stored"
                );
                return Ok(rating);
            }

            let limit = self.config.max_siblings;
            if limit > 0 && siblings.len() > limit {
                tracing::debug!(key = %key, siblings = siblings.len(), limit, "sibling limit reached");
                return Err(ServiceError::TooManySiblings {
                    siblings: siblings.len(),
                    limit,
                });
            }

            match self
                .store
                .compare_and_swap(&key, expected, record_of(rating, &siblings))
                .await?
            {
                CasResult::Stored { revision } => {
                    tracing::debug!(
                        key = %key,
                        outcome = outcome.as_str(),
                        siblings = siblings.len(),
                        revision,
                        rating,
                        "rating stored"
                    );
                    return Ok(rating);
                }
                CasResult::Conflict { current } => {
                    tracing::debug!(
                        key = %key,
                        attempt,
                        expected = ?expected,
                        current = ?current,
                        "revision moved underneath us"
                    );
                    if attempt < attempts {
                        metrics().cas_retries.inc();
                    }
                }
            }
        }

        tracing::warn!(
            key = %key,
            attempts,
            "giving up after repeated revision conflicts"
        );
        metrics().contention_failures.inc();
        Err(ServiceError::Contention {
            entity: entity.to_string(),
        })
    }

    // -----------------------------------------------------------------------
    // GET
    // -----------------------------------------------------------------------

    /// Current aggregate and siblings of `entity`, or `None` if nothing was
    /// ever written (or it was deleted).
    pub async fn get(&self, entity: &str) -> Result<Option<RatingView>, ServiceError> {
        let _timer = ratings_metrics::start_op_timer("get");
        metrics().gets.inc();

        let key = storage_key(entity);
        let Some(stored) = self.store.load(&key).await? else {
            tracing::debug!(key = %key, "no rating stored");
            return Ok(None);
        };

        let siblings = siblings_of(&stored.record)?;
        let rating = aggregate(&siblings)?;
        tracing::debug!(key = %key, siblings = siblings.len(), rating, "rating read");
        Ok(Some(RatingView::new(rating, siblings)))
    }

    // -----------------------------------------------------------------------
    // DELETE
    // -----------------------------------------------------------------------

    /// Drop every sibling of `entity`. Returns whether anything existed.
    pub async fn delete(&self, entity: &str) -> Result<bool, ServiceError> {
        let _timer = ratings_metrics::start_op_timer("delete");
        metrics().deletes.inc();

        let key = storage_key(entity);
        let existed = self.store.remove(&key).await?;
        tracing::debug!(key = %key, existed, "rating deleted");
        Ok(existed)
    }
}

/// Rebuild the sibling set a stored record describes.
fn siblings_of(record: &RatingRecord) -> Result<SiblingSet, SiblingError> {
    let versions = record
        .choices
        .iter()
        .zip(&record.clocks)
        .map(|(value, clock)| Version::new(*value, VectorClock::from_map(clock.clone())))
        .collect();
    SiblingSet::from_versions(versions)
}

fn record_of(rating: f64, siblings: &SiblingSet) -> RatingRecord {
    RatingRecord::new(
        rating,
        siblings.values().collect(),
        siblings.clocks().map(|c| c.entries().clone()).collect(),
    )
}
