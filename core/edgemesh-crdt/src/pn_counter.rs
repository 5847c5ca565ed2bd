//! Positive-Negative Counter CRDT.
//!
//! A pair of grow-only counters, P and N; the value is `P.value() - N.value()`.
//! Increment and decrement affect P and N independently, so the two
//! halves merge (and converge) exactly as two independent G-Counters.

use crate::{Error, GCounter};
use edgemesh_types::NodeId;
use serde::{Deserialize, Serialize};

/// A Positive-Negative Counter CRDT.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PnCounter {
    positive: GCounter,
    negative: GCounter,
}

impl PnCounter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Increments P by `amount` for `node`. `amount` must be non-negative.
    pub fn increment(&mut self, node: NodeId, amount: i64) -> Result<(), Error> {
        self.positive.increment(node, amount)
    }

    /// Increments N by `amount` for `node`. `amount` must be non-negative.
    pub fn decrement(&mut self, node: NodeId, amount: i64) -> Result<(), Error> {
        self.negative.increment(node, amount)
    }

    /// Current value, `P.value() - N.value()`; may be negative.
    #[must_use]
    pub fn value(&self) -> i64 {
        self.positive.value() as i64 - self.negative.value() as i64
    }

    #[must_use]
    pub fn positive(&self) -> &GCounter {
        &self.positive
    }

    #[must_use]
    pub fn negative(&self) -> &GCounter {
        &self.negative
    }

    /// Merges P and N independently, each by per-node maximum.
    pub fn merge(&mut self, other: &Self) {
        self.positive.merge(&other.positive);
        self.negative.merge(&other.negative);
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
        assert_eq!(PnCounter::new().value(), 0);
    }

    #[test]
    fn increment_increases_value() {
        let mut c = PnCounter::new();
        c.increment(node("n1"), 5).unwrap();
        assert_eq!(c.value(), 5);
        c.increment(node("n1"), 3).unwrap();
        assert_eq!(c.value(), 8);
    }

    #[test]
    fn decrement_decreases_value() {
        let mut c = PnCounter::new();
        c.increment(node("n1"), 10).unwrap();
        c.decrement(node("n1"), 3).unwrap();
        assert_eq!(c.value(), 7);
    }

    #[test]
    fn value_can_go_negative() {
        let mut c = PnCounter::new();
        c.decrement(node("n1"), 5).unwrap();
        assert_eq!(c.value(), -5);
    }

    #[test]
    fn negative_amount_is_rejected_on_either_side() {
        let mut c = PnCounter::new();
        assert!(c.increment(node("n1"), -1).is_err());
        assert!(c.decrement(node("n1"), -1).is_err());
    }

    #[test]
    fn merge_is_commutative() {
        let mut a = PnCounter::new();
        a.increment(node("n1"), 3).unwrap();
        a.decrement(node("n2"), 1).unwrap();

        let mut b = PnCounter::new();
        b.increment(node("n2"), 5).unwrap();
        b.decrement(node("n1"), 2).unwrap();

        let ab = a.merged(&b);
        let ba = b.merged(&a);
        assert_eq!(ab, ba);
        assert_eq!(ab.value(), ba.value());
    }

    #[test]
    fn merge_is_associative() {
        let mut a = PnCounter::new();
        a.increment(node("n1"), 1).unwrap();
        let mut b = PnCounter::new();
        b.increment(node("n2"), 2).unwrap();
        let mut c = PnCounter::new();
        c.decrement(node("n3"), 1).unwrap();

        assert_eq!(a.merged(&b).merged(&c), a.merged(&b.merged(&c)));
    }

    #[test]
    fn merge_is_idempotent() {
        let mut a = PnCounter::new();
        a.increment(node("n1"), 5).unwrap();
        a.decrement(node("n2"), 2).unwrap();

        let aa = a.merged(&a);
        assert_eq!(a, aa);
    }

    #[test]
    fn merge_takes_max_per_node_on_both_sides() {
        let mut a = PnCounter::new();
        a.increment(node("n1"), 5).unwrap();
        a.decrement(node("n1"), 10).unwrap();

        let mut b = PnCounter::new();
        b.increment(node("n1"), 3).unwrap();
        b.decrement(node("n1"), 3).unwrap();

        let merged = a.merged(&b);
        assert_eq!(merged.value(), 5i64 - 10); // max(5,3) - max(10,3)
    }

    #[test]
    fn three_node_convergence() {
        let mut a = PnCounter::new();
        let mut b = PnCounter::new();
        let mut c = PnCounter::new();

        a.increment(node("n1"), 10).unwrap();
        b.increment(node("n2"), 20).unwrap();
        b.decrement(node("n2"), 5).unwrap();
        c.decrement(node("n3"), 3).unwrap();

        let a_snap = a.clone();
        let b_snap = b.clone();
        let c_snap = c.clone();

        a.merge(&b_snap);
        a.merge(&c_snap);
        b.merge(&a_snap);
        b.merge(&c_snap);
        c.merge(&a_snap);
        c.merge(&b_snap);

        assert_eq!(a, b);
        assert_eq!(b, c);
        assert_eq!(a.value(), 22);
    }

    #[test]
    fn serialization_roundtrip() {
        let mut c = PnCounter::new();
        c.increment(node("n1"), 10).unwrap();
        c.increment(node("n2"), 5).unwrap();
        c.decrement(node("n1"), 3).unwrap();

        let json = serde_json::to_string(&c).unwrap();
        let parsed: PnCounter = serde_json::from_str(&json).unwrap();
        assert_eq!(c, parsed);
        assert_eq!(parsed.value(), 12);
    }

    #[test]
    fn merge_with_empty_is_identity() {
        let mut c = PnCounter::new();
        c.increment(node("n1"), 7).unwrap();
        c.decrement(node("n2"), 2).unwrap();

        let empty = PnCounter::new();
        assert_eq!(c.merged(&empty), c);
        assert_eq!(empty.merged(&c), c);
    }

    #[test]
    fn equality_is_state_based_not_value_based() {
        let mut a = PnCounter::new();
        a.increment(node("n1"), 5).unwrap();
        let mut b = PnCounter::new();
        b.increment(node("n2"), 5).unwrap();

        assert_eq!(a.value(), b.value());
        assert_ne!(a, b);
    }
}
