//! Last-Writer-Wins Register (LWW-Register).
//!
//! Stores at most one value, resolved by a strict total order over
//! (timestamp, writer): the higher timestamp wins; on a tie, the
//! lexicographically greater writer id wins. An empty register (no
//! write has ever been observed) has no value.
//!
//! A local `set` carries no explicit timestamp: it ticks the register's
//! own clock forward, so it is always strictly greater than whatever is
//! currently stored and therefore always wins — this is how a node's own
//! overwrite of its own earlier write is guaranteed to apply without a
//! same-writer tie-break special case.

use edgemesh_types::{NodeId, Timestamp};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Entry<T> {
    value: T,
    timestamp: Timestamp,
    writer: NodeId,
}

/// A Last-Writer-Wins Register over an arbitrary serializable value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LwwRegister<T> {
    entry: Option<Entry<T>>,
}

impl<T> LwwRegister<T> {
    /// Creates an empty register.
    #[must_use]
    pub fn new() -> Self {
        Self { entry: None }
    }

    /// Returns the current value, or `None` if the register is empty.
    #[must_use]
    pub fn value(&self) -> Option<&T> {
        self.entry.as_ref().map(|e| &e.value)
    }

    #[must_use]
    pub fn timestamp(&self) -> Option<Timestamp> {
        self.entry.as_ref().map(|e| e.timestamp)
    }

    #[must_use]
    pub fn writer(&self) -> Option<&NodeId> {
        self.entry.as_ref().map(|e| &e.writer)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entry.is_none()
    }

    /// Local write: always wins, because the timestamp is ticked
    /// forward from whatever is currently stored.
    pub fn set(&mut self, value: T, writer: NodeId) {
        let timestamp = match &self.entry {
            Some(e) => e.timestamp.tick(),
            None => Timestamp::now(),
        };
        self.entry = Some(Entry {
            value,
            timestamp,
            writer,
        });
    }

    /// Replay/merge write with an explicit (timestamp, writer) pair.
    /// Applies only if the candidate strictly exceeds the stored pair
    /// under the register's total order. Returns whether it applied.
    pub fn set_at(&mut self, value: T, timestamp: Timestamp, writer: NodeId) -> bool {
        if self.should_replace(&timestamp, &writer) {
            self.entry = Some(Entry {
                value,
                timestamp,
                writer,
            });
            true
        } else {
            false
        }
    }

    fn should_replace(&self, timestamp: &Timestamp, writer: &NodeId) -> bool {
        match &self.entry {
            None => true,
            Some(e) => (timestamp, writer) > (&e.timestamp, &e.writer),
        }
    }
}

impl<T: Clone> LwwRegister<T> {
    /// Merges another register into this one; the winning (timestamp, writer)
    /// pair under the strict total order is kept.
    pub fn merge(&mut self, other: &Self) {
        if let Some(other_entry) = &other.entry {
            if self.should_replace(&other_entry.timestamp, &other_entry.writer) {
                self.entry = Some(other_entry.clone());
            }
        }
    }

    #[must_use]
    pub fn merged(&self, other: &Self) -> Self {
        let mut result = self.clone();
        result.merge(other);
        result
    }
}

impl<T> Default for LwwRegister<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: PartialEq> PartialEq for LwwRegister<T> {
    fn eq(&self, other: &Self) -> bool {
        self.entry == other.entry
    }
}

impl<T: Eq> Eq for LwwRegister<T> {}
