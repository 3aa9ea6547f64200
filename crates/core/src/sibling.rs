//! Versions and sibling sets.
//!
//! A [`SiblingSet`] holds every version of one entity that is still
//! current: no member's clock is causally ordered with another's. Members
//! keep their insertion order so that callers see choices in the order the
//! writes arrived.

use crate::vclock::VectorClock;
use serde::{Deserialize, Serialize};

/// A single write: a rating value stamped with the writer's clock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Version {
    pub value: f64,
    pub clock: VectorClock,
}

impl Version {
    pub fn new(value: f64, clock: VectorClock) -> Self {
        Self { value, clock }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SiblingError {
    #[error("siblings {first} and {second} are causally ordered")]
    NotAntichain { first: usize, second: usize },
}

/// The mutually concurrent versions of one entity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SiblingSet {
    versions: Vec<Version>,
}

impl SiblingSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// A set holding exactly one version.
    pub fn single(version: Version) -> Self {
        Self {
            versions: vec![version],
        }
    }

    /// Build a set from versions loaded from storage, checking that no two
    /// of them are causally ordered.
    pub fn from_versions(versions: Vec<Version>) -> Result<Self, SiblingError> {
        if let Some((first, second)) = first_ordered_pair(&versions) {
            return Err(SiblingError::NotAntichain { first, second });
        }
        Ok(Self { versions })
    }

    /// Build a set the resolver has already proven to be an antichain.
    pub(crate) fn from_antichain(versions: Vec<Version>) -> Self {
        debug_assert!(first_ordered_pair(&versions).is_none());
        Self { versions }
    }

    pub fn len(&self) -> usize {
        self.versions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Version> {
        self.versions.iter()
    }

    pub fn versions(&self) -> &[Version] {
        &self.versions
    }

    pub fn into_versions(self) -> Vec<Version> {
        self.versions
    }

    /// Member values, index-aligned with [`clocks`](Self::clocks).
    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.versions.iter().map(|v| v.value)
    }

    /// Member clocks, index-aligned with [`values`](Self::values).
    pub fn clocks(&self) -> impl Iterator<Item = &VectorClock> + '_ {
        self.versions.iter().map(|v| &v.clock)
    }

    /// Element-wise max of every member clock. A writer that advances this
    /// context supersedes all current siblings at once.
    pub fn context(&self) -> VectorClock {
        self.versions
            .iter()
            .fold(VectorClock::new(), |acc, v| acc.merge(&v.clock))
    }

    /// Whether no two members are causally ordered.
    pub fn is_antichain(&self) -> bool {
        first_ordered_pair(&self.versions).is_none()
    }
}

impl<'a> IntoIterator for &'a SiblingSet {
    type Item = &'a Version;
    type IntoIter = std::slice::Iter<'a, Version>;

    fn into_iter(self) -> Self::IntoIter {
        self.versions.iter()
    }
}

fn first_ordered_pair(versions: &[Version]) -> Option<(usize, usize)> {
    for (i, a) in versions.iter().enumerate() {
        for (j, b) in versions.iter().enumerate().skip(i + 1) {
            if !a.clock.is_concurrent(&b.clock) {
                return Some((i, j));
            }
        }
    }
    None
}
