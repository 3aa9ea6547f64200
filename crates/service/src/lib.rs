//! Rating service: serializes read-merge-write per entity over a
//! [`RatingStore`](ratings_storage::RatingStore).

pub mod locks;
pub mod service;

pub use locks::{KeyGuard, KeyLocks};
pub use service::{RatingService, RatingView, ServiceConfig, ServiceError};
