//! Representative value of a sibling set.

use crate::sibling::SiblingSet;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AggregateError {
    #[error("cannot aggregate an empty sibling set")]
    Empty,
}

/// Unweighted arithmetic mean of every sibling value.
///
/// Callers must treat an absent entity separately; asking for the mean of
/// zero siblings is a contract violation and panics in debug builds.
pub fn aggregate(siblings: &SiblingSet) -> Result<f64, AggregateError> {
    debug_assert!(!siblings.is_empty(), "aggregate of an empty sibling set");
    if siblings.is_empty() {
        return Err(AggregateError::Empty);
    }
    let sum: f64 = siblings.values().sum();
    Ok(sum / siblings.len() as f64)
}
