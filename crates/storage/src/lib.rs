//! Storage for rating sibling sets: versioned records, WAL + memtable.
//!
//! Each entity key holds one [`RatingRecord`] (aggregate, choices, clocks)
//! stamped with a store-assigned revision. Writers replace a record only
//! through compare-and-swap on that revision. The WAL provides durability;
//! the memtable provides fast reads.

pub mod engine;
pub mod memtable;
pub mod record;
pub mod store;
pub mod wal;

pub use engine::{CasResult, StorageEngine, StorageError};
pub use record::{RatingRecord, RecordError, StoredRecord};
pub use store::RatingStore;
pub use wal::FsyncPolicy;
