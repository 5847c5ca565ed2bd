//! Grow-only Counter (G-Counter).
//!
//! A mapping from node id to a non-negative integer; the counter's value
//! is the sum of all per-node entries. Merge takes the element-wise
//! maximum, so a replica's view of any other node's contribution never
//! regresses.

use crate::Error;
use edgemesh_types::NodeId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A Grow-only Counter CRDT.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GCounter {
    counts: BTreeMap<NodeId, u64>,
}

impl GCounter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `amount` to `node`'s own entry. `amount` must be non-negative.
    pub fn increment(&mut self, node: NodeId, amount: i64) -> Result<(), Error> {
        if amount < 0 {
            return Err(Error::InvalidAmount(amount));
        }
        *self.counts.entry(node).or_insert(0) += amount as u64;
        Ok(())
    }

    /// Total value: the sum of all per-node entries.
    #[must_use]
    pub fn value(&self) -> u64 {
        self.counts.values().sum()
    }

    /// Read-only view of the per-node entries, in sorted key order
    /// (used verbatim in the fingerprint leaf).
    #[must_use]
    pub fn counts(&self) -> &BTreeMap<NodeId, u64> {
        &self.counts
    }

    /// Merges another counter into this one by taking the per-node max.
    pub fn merge(&mut self, other: &Self) {
        for (node, &count) in &other.counts {
            let entry = self.counts.entry(node.clone()).or_insert(0);
            *entry = (*entry).max(count);
        }
    }

    #[must_use]
    pub fn merged(&self, other: &Self) -> Self {
        let mut result = self.clone();
        result.merge(other);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str) -> NodeId {
        NodeId::new(id).unwrap()
    }

    #[test]
    fn new_counter_is_zero() {
        assert_eq!(GCounter::new().value(), 0);
    }

    #[test]
    fn increment_accumulates_per_node() {
        let mut c = GCounter::new();
        c.increment(node("n1"), 5).unwrap();
        c.increment(node("n1"), 3).unwrap();
        assert_eq!(c.value(), 8);
    }

    #[test]
    fn negative_amount_is_rejected() {
        let mut c = GCounter::new();
        assert!(c.increment(node("n1"), -1).is_err());
        assert_eq!(c.value(), 0);
    }

    #[test]
    fn merge_takes_per_node_maximum() {
        let mut a = GCounter::new();
        a.increment(node("n1"), 5).unwrap();
        let mut b = GCounter::new();
        b.increment(node("n1"), 3).unwrap();
        b.increment(node("n2"), 7).unwrap();

        let merged = a.merged(&b);
        assert_eq!(merged.value(), 12); // max(5,3) + 7
    }

    #[test]
    fn merge_is_commutative_associative_idempotent() {
        let mut a = GCounter::new();
        a.increment(node("n1"), 2).unwrap();
        let mut b = GCounter::new();
        b.increment(node("n2"), 3).unwrap();
        let mut c = GCounter::new();
        c.increment(node("n3"), 4).unwrap();

        assert_eq!(a.merged(&b), b.merged(&a));
        assert_eq!(a.merged(&b).merged(&c), a.merged(&b.merged(&c)));
        assert_eq!(a.merged(&a), a);
    }

    #[test]
    fn per_node_entries_are_monotone_under_merge() {
        let mut a = GCounter::new();
        a.increment(node("n1"), 10).unwrap();
        let b = GCounter::new();
        let merged = a.merged(&b);
        assert_eq!(merged.counts().get(&node("n1")), Some(&10));
    }
}
