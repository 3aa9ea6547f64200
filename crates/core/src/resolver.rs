//! Conflict resolution: fold an incoming write into a sibling set.
//!
//! The incoming clock is classified against *every* current sibling before
//! anything is committed, so the result never depends on the order in
//! which siblings are stored:
//!
//! 1. If any sibling is `>=` the incoming clock, the write is stale and the
//!    set is returned unchanged.
//! 2. Otherwise siblings strictly below the incoming clock are dropped,
//!    concurrent ones are kept, and the incoming version is appended once.

use crate::sibling::{SiblingSet, Version};
use crate::vclock::ClockOrder;

/// What a merge did to the sibling set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The set was empty; the write became its only member.
    Created,
    /// An existing sibling already covers the write. Nothing changed.
    Stale,
    /// The write is concurrent with every sibling and was added beside them.
    Sibling,
    /// The write superseded `dropped` siblings (and kept any concurrent ones).
    Superseded { dropped: usize },
}

impl MergeOutcome {
    /// Whether the resulting set differs from the input.
    pub fn is_applied(&self) -> bool {
        !matches!(self, MergeOutcome::Stale)
    }

    /// Short label for logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            MergeOutcome::Created => "created",
            MergeOutcome::Stale => "stale",
            MergeOutcome::Sibling => "sibling",
            MergeOutcome::Superseded { .. } => "superseded",
        }
    }
}

/// Result of [`merge`]: the next sibling set and how it was reached.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub siblings: SiblingSet,
    pub outcome: MergeOutcome,
}

impl Resolution {
    pub fn into_siblings(self) -> SiblingSet {
        self.siblings
    }
}

/// Compute the sibling set that results from applying `incoming` to
/// `current`.
pub fn merge(current: SiblingSet, incoming: Version) -> Resolution {
    if current.is_empty() {
        return Resolution {
            siblings: SiblingSet::single(incoming),
            outcome: MergeOutcome::Created,
        };
    }

    // Pass 1: classify against the complete prior snapshot.
    let relations: Vec<ClockOrder> = current
        .iter()
        .map(|existing| incoming.clock.compare(&existing.clock))
        .collect();

    if relations
        .iter()
        .any(|r| matches!(r, ClockOrder::Less | ClockOrder::Equal))
    {
        return Resolution {
            siblings: current,
            outcome: MergeOutcome::Stale,
        };
    }

    // Pass 2: commit.
    let mut retained = Vec::with_capacity(current.len() + 1);
    let mut dropped = 0usize;
    for (existing, relation) in current.into_versions().into_iter().zip(relations) {
        match relation {
            ClockOrder::Greater => dropped += 1,
            _ => retained.push(existing),
        }
    }
    retained.push(incoming);

    let outcome = if dropped == 0 {
        MergeOutcome::Sibling
    } else {
        MergeOutcome::Superseded { dropped }
    };

    Resolution {
        siblings: SiblingSet::from_antichain(retained),
        outcome,
    }
}
