//! Conflict-resolution core for causally versioned ratings.
//!
//! Provides: vector clocks with a partial-order comparator, sibling sets
//! that keep mutually concurrent versions, the merge algorithm that folds
//! an incoming write into a sibling set, and the mean aggregator.
//!
//! Everything in this crate is pure and synchronous. Storage and
//! serialization of whole sibling sets live in `ratings-storage`.

pub mod aggregate;
pub mod resolver;
pub mod sibling;
pub mod vclock;

pub use aggregate::{aggregate, AggregateError};
pub use resolver::{merge, MergeOutcome, Resolution};
pub use sibling::{SiblingError, SiblingSet, Version};
pub use vclock::{ClockOrder, VectorClock};
