//! HTTP/1.1 JSON surface for the rating service.
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `PUT` | `/rating/{entity}` | Write a rating under a vector clock |
//! | `GET` | `/rating/{entity}` | Aggregate rating plus every sibling |
//! | `DELETE` | `/rating/{entity}` | Drop all state for the entity |

pub mod error;
pub mod negotiate;
pub mod router;
pub mod server;
pub mod wire;

pub use error::RequestError;
pub use router::handle;
pub use server::serve;
pub use wire::{PutRatingRequest, RatingResponse, RatingStateResponse};
