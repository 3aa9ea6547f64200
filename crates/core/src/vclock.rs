//! Vector clock implementation for causal versioning.
//!
//! Entries are kept in a `BTreeMap` so iteration, comparison and
//! serialization all walk writers in the same sorted order. A writer that
//! is absent from a clock has an implicit counter of 0.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

/// A vector clock: maps writer identifiers to monotonic counters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VectorClock {
    entries: BTreeMap<String, u64>,
}

/// Outcome of comparing two vector clocks under the causal partial order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClockOrder {
    /// `self < other`: every counter is `<=` and at least one is `<`.
    Less,
    /// `self > other`.
    Greater,
    /// Identical once absent writers are read as 0.
    Equal,
    /// Neither clock is `<=` the other.
    Concurrent,
}

impl VectorClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create from a raw map.
    pub fn from_map(entries: BTreeMap<String, u64>) -> Self {
        Self { entries }
    }

    /// Get the counter for a writer (0 if not present).
    pub fn get(&self, writer: &str) -> u64 {
        self.entries.get(writer).copied().unwrap_or(0)
    }

    /// Return a clock whose `writer` entry is `max(current, count)`.
    ///
    /// Clocks never move backward: advancing to a smaller count than the
    /// one already recorded leaves the clock unchanged.
    pub fn advance(&self, writer: &str, count: u64) -> Self {
        let mut next = self.clone();
        let counter = next.entries.entry(writer.to_string()).or_insert(0);
        *counter = (*counter).max(count);
        next
    }

    /// Increment the counter for a writer and return the new clock.
    pub fn increment(&self, writer: &str) -> Self {
        self.advance(writer, self.get(writer).saturating_add(1))
    }

    /// Merge two vector clocks (element-wise max).
    ///
    /// The result is `>=` both inputs, which makes it usable as a causal
    /// context that supersedes every version it was built from.
    pub fn merge(&self, other: &Self) -> Self {
        let mut merged = self.entries.clone();
        for (writer, &count) in &other.entries {
            let entry = merged.entry(writer.clone()).or_insert(0);
            *entry = (*entry).max(count);
        }
        Self { entries: merged }
    }

    /// Compare two vector clocks in a single sorted walk over the union of
    /// their writers.
    pub fn compare(&self, other: &Self) -> ClockOrder {
        let mut self_le = true; // self[k] <= other[k] for every k seen so far
        let mut other_le = true;

        let mut lhs = self.entries.iter().peekable();
        let mut rhs = other.entries.iter().peekable();

        loop {
            let step = match (lhs.peek(), rhs.peek()) {
                (None, None) => break,
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (Some((a, _)), Some((b, _))) => a.cmp(b),
            };
            let (mine, theirs) = match step {
                Ordering::Less => (next_count(&mut lhs), 0),
                Ordering::Greater => (0, next_count(&mut rhs)),
                Ordering::Equal => (next_count(&mut lhs), next_count(&mut rhs)),
            };

            if mine > theirs {
                self_le = false;
            }
            if theirs > mine {
                other_le = false;
            }
            if !self_le && !other_le {
                return ClockOrder::Concurrent;
            }
        }

        match (self_le, other_le) {
            (true, true) => ClockOrder::Equal,
            (true, false) => ClockOrder::Less,
            (false, true) => ClockOrder::Greater,
            (false, false) => ClockOrder::Concurrent,
        }
    }

    /// `self <= other` under the causal order.
    pub fn is_causally_before_or_equal(&self, other: &Self) -> bool {
        matches!(self.compare(other), ClockOrder::Less | ClockOrder::Equal)
    }

    /// Dominates: self >= other on all entries, > on at least one.
    pub fn dominates(&self, other: &Self) -> bool {
        self.compare(other) == ClockOrder::Greater
    }

    /// Are these clocks concurrent (neither is `<=` the other)?
    pub fn is_concurrent(&self, other: &Self) -> bool {
        self.compare(other) == ClockOrder::Concurrent
    }

    /// Iterate entries in writer order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.entries.iter().map(|(k, &v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Return the raw entries.
    pub fn entries(&self) -> &BTreeMap<String, u64> {
        &self.entries
    }

    /// Convert to raw map (for the storage layer).
    pub fn into_map(self) -> BTreeMap<String, u64> {
        self.entries
    }
}

fn next_count<'a, I>(iter: &mut std::iter::Peekable<I>) -> u64
where
    I: Iterator<Item = (&'a String, &'a u64)>,
{
    iter.next().map_or(0, |(_, &count)| count)
}

impl PartialEq for VectorClock {
    fn eq(&self, other: &Self) -> bool {
        self.compare(other) == ClockOrder::Equal
    }
}

impl Eq for VectorClock {}

impl PartialOrd for VectorClock {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match self.compare(other) {
            ClockOrder::Less => Some(Ordering::Less),
            ClockOrder::Greater => Some(Ordering::Greater),
            ClockOrder::Equal => Some(Ordering::Equal),
            ClockOrder::Concurrent => None,
        }
    }
}

impl<K: Into<String>> FromIterator<(K, u64)> for VectorClock {
    fn from_iter<T: IntoIterator<Item = (K, u64)>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

impl From<BTreeMap<String, u64>> for VectorClock {
    fn from(entries: BTreeMap<String, u64>) -> Self {
        Self::from_map(entries)
    }
}

impl fmt::Display for VectorClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (writer, count)) in self.entries.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}:{}", writer, count)?;
        }
        write!(f, "}}")
    }
}
