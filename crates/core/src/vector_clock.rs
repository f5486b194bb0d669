// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Vector clocks for causal ordering across replicas
//!
//! A clock maps replica ids to monotonically increasing counters. Absent
//! replicas count as zero, so zero entries are never stored and `{A:0}`
//! equals the empty clock.

use crate::ids::ReplicaId;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

/// Immutable vector clock.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "BTreeMap<ReplicaId, u64>", into = "BTreeMap<ReplicaId, u64>")]
pub struct VectorClock {
    counters: BTreeMap<ReplicaId, u64>,
}

impl VectorClock {
    /// The empty clock (bottom element).
    pub fn new() -> Self {
        Self::default()
    }

    /// A clock with a single replica at `count`.
    pub fn of(replica: impl Into<ReplicaId>, count: u64) -> Self {
        Self::from_map([(replica.into(), count)])
    }

    pub fn from_map(entries: impl IntoIterator<Item = (ReplicaId, u64)>) -> Self {
        let counters = entries.into_iter().filter(|(_, count)| *count > 0).collect();
        Self { counters }
    }

    /// Counter for `replica`, zero when absent.
    pub fn get(&self, replica: &ReplicaId) -> u64 {
        self.counters.get(replica).copied().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }

    /// Sum of all counters.
    pub fn sum(&self) -> u64 {
        self.counters.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ReplicaId, u64)> {
        self.counters.iter().map(|(replica, count)| (replica, *count))
    }

    /// Returns a new clock with `replica` advanced by exactly one.
    #[must_use]
    pub fn increment(&self, replica: &ReplicaId) -> Self {
        let mut counters = self.counters.clone();
        *counters.entry(replica.clone()).or_insert(0) += 1;
        Self { counters }
    }

    /// Pointwise maximum of two clocks.
    #[must_use]
    pub fn merge(&self, other: &Self) -> Self {
        let mut counters = self.counters.clone();
        for (replica, count) in &other.counters {
            let entry = counters.entry(replica.clone()).or_insert(0);
            *entry = (*entry).max(*count);
        }
        Self { counters }
    }

    /// `self >= other` on every replica.
    pub fn is_newer_or_equal(&self, other: &Self) -> bool {
        other
            .counters
            .iter()
            .all(|(replica, count)| self.get(replica) >= *count)
    }

    /// Strict causal dominance.
    pub fn is_newer_than(&self, other: &Self) -> bool {
        self.is_newer_or_equal(other) && self != other
    }

    pub fn is_concurrent_with(&self, other: &Self) -> bool {
        !self.is_newer_or_equal(other) && !other.is_newer_or_equal(self)
    }

    /// Replica holding this clock's maximum counter.
    ///
    /// Ties between replicas sharing the maximum go to the lexicographically
    /// greatest id. `None` for the empty clock.
    pub fn max_replica(&self) -> Option<&ReplicaId> {
        self.counters
            .iter()
            .max_by(|(ra, ca), (rb, cb)| ca.cmp(cb).then_with(|| ra.cmp(rb)))
            .map(|(replica, _)| replica)
    }

    /// Total tie-break order for concurrent clocks.
    ///
    /// Compares the counter sums, then the replica holding each clock's
    /// maximum counter. Equal results are possible for distinct clocks.
    pub fn deterministic_compare(a: &Self, b: &Self) -> Ordering {
        a.sum()
            .cmp(&b.sum())
            .then_with(|| a.max_replica().cmp(&b.max_replica()))
    }

    /// Ordering used to pick a winner between two writes.
    ///
    /// Causal order when the clocks are comparable, otherwise
    /// [`deterministic_compare`](Self::deterministic_compare), otherwise the
    /// canonical order of the sorted entries. `Equal` only for equal clocks.
    pub fn resolution_cmp(a: &Self, b: &Self) -> Ordering {
        if a == b {
            return Ordering::Equal;
        }
        if a.is_newer_or_equal(b) {
            return Ordering::Greater;
        }
        if b.is_newer_or_equal(a) {
            return Ordering::Less;
        }
        Self::deterministic_compare(a, b).then_with(|| a.counters.iter().cmp(b.counters.iter()))
    }
}

impl From<BTreeMap<ReplicaId, u64>> for VectorClock {
    fn from(map: BTreeMap<ReplicaId, u64>) -> Self {
        Self::from_map(map)
    }
}

impl From<VectorClock> for BTreeMap<ReplicaId, u64> {
    fn from(clock: VectorClock) -> Self {
        clock.counters
    }
}

impl fmt::Display for VectorClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (replica, count)) in self.counters.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{replica}:{count}")?;
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
#[path = "vector_clock_tests.rs"]
mod tests;
