//! Append-only, tamper-evident hash-chain log.
//!
//! Each entry links to the previous entry's hash, so altering or
//! reordering any entry breaks the chain; [`HashChain::verify`] walks
//! the whole log and reports whether it still does.

use edgemesh_types::{EventId, NodeId, Timestamp};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// `prev_hash` of the first entry ever appended.
pub const GENESIS: &str = "genesis";

/// One link in the chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainEntry {
    pub sequence: u64,
    pub timestamp: String,
    pub event_id: EventId,
    pub event_type: String,
    pub data_hash: String,
    pub prev_hash: String,
    pub hash: String,
}

/// The fields that get hashed to seal an entry; everything but `hash`
/// itself. Serialized through `serde_json::Value` so the hash input has
/// sorted keys regardless of struct field declaration order.
#[derive(Serialize)]
struct Unsealed<'a> {
    sequence: u64,
    timestamp: &'a str,
    event_id: &'a EventId,
    event_type: &'a str,
    data_hash: &'a str,
    prev_hash: &'a str,
}

fn canonical_string(value: &impl Serialize) -> String {
    let value = serde_json::to_value(value).expect("entry fields always serialize");
    serde_json::to_string(&value).expect("a JSON value always serializes")
}

fn sha256_hex(input: &str) -> String {
    hex::encode(Sha256::digest(input.as_bytes()))
}

/// A per-node append-only hash-chained event log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HashChain {
    node_id: NodeId,
    entries: Vec<ChainEntry>,
}

impl HashChain {
    #[must_use]
    pub fn new(node_id: NodeId) -> Self {
        Self {
            node_id,
            entries: Vec::new(),
        }
    }

    #[must_use]
    pub fn node_id(&self) -> &NodeId {
        &self.node_id
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Appends a new entry. Construction order matters: `data_hash` is
    /// computed first, then the unsealed entry, then `hash` over the
    /// unsealed entry.
    pub fn append(
        &mut self,
        event_id: EventId,
        event_type: impl Into<String>,
        event_data: &serde_json::Value,
    ) -> ChainEntry {
        let sequence = self.entries.len() as u64;
        let timestamp = Timestamp::now().to_iso8601();
        let event_type = event_type.into();
        let data_hash = sha256_hex(&canonical_string(event_data));
        let prev_hash = self.latest_hash();

        let hash = sha256_hex(&canonical_string(&Unsealed {
            sequence,
            timestamp: &timestamp,
            event_id: &event_id,
            event_type: &event_type,
            data_hash: &data_hash,
            prev_hash: &prev_hash,
        }));

        let entry = ChainEntry {
            sequence,
            timestamp,
            event_id,
            event_type,
            data_hash,
            prev_hash,
            hash,
        };
        self.entries.push(entry.clone());
        entry
    }

    /// Walks the whole chain, checking every `prev_hash` link and every
    /// entry's recomputed `hash`. O(n); corruption is surfaced here, not
    /// auto-corrected.
    #[must_use]
    pub fn verify(&self) -> bool {
        let mut expected_prev = GENESIS.to_string();
        for entry in &self.entries {
            if entry.prev_hash != expected_prev {
                tracing::warn!(
                    node_id = %self.node_id,
                    sequence = entry.sequence,
                    "hash chain link broken: prev_hash mismatch"
                );
                return false;
            }

            let recomputed = sha256_hex(&canonical_string(&Unsealed {
                sequence: entry.sequence,
                timestamp: &entry.timestamp,
                event_id: &entry.event_id,
                event_type: &entry.event_type,
                data_hash: &entry.data_hash,
                prev_hash: &entry.prev_hash,
            }));
            if recomputed != entry.hash {
                tracing::warn!(
                    node_id = %self.node_id,
                    sequence = entry.sequence,
                    "hash chain entry tampered: hash mismatch"
                );
                return false;
            }

            expected_prev = entry.hash.clone();
        }
        true
    }

    /// Entries with `sequence >= since`.
    #[must_use]
    pub fn entries_since(&self, since: u64) -> &[ChainEntry] {
        let start = self.entries.partition_point(|e| e.sequence < since);
        &self.entries[start..]
    }

    /// The last entry's hash, or the genesis sentinel if the chain is empty.
    #[must_use]
    pub fn latest_hash(&self) -> String {
        self.entries
            .last()
            .map_or_else(|| GENESIS.to_string(), |e| e.hash.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn node(id: &str) -> NodeId {
        NodeId::new(id).unwrap()
    }

    #[test]
    fn empty_chain_latest_hash_is_genesis() {
        let chain = HashChain::new(node("n1"));
        assert_eq!(chain.latest_hash(), GENESIS);
        assert!(chain.verify());
    }

    #[test]
    fn append_links_to_previous_hash_and_increments_sequence() {
        let mut chain = HashChain::new(node("n1"));
        let first = chain.append(
            EventId::new("e1"),
            "water_level",
            &serde_json::json!({"value": 3.2}),
        );
        assert_eq!(first.sequence, 0);
        assert_eq!(first.prev_hash, GENESIS);

        let second = chain.append(
            EventId::new("e2"),
            "water_level",
            &serde_json::json!({"value": 3.4}),
        );
        assert_eq!(second.sequence, 1);
        assert_eq!(second.prev_hash, first.hash);
    }

    #[test]
    fn verify_passes_on_an_untouched_chain() {
        let mut chain = HashChain::new(node("n1"));
        for i in 0..5 {
            chain.append(
                EventId::new(format!("e{i}")),
                "water_level",
                &serde_json::json!({"value": i}),
            );
        }
        assert!(chain.verify());
    }

    #[test]
    fn verify_fails_if_an_entry_is_tampered_with() {
        let mut chain = HashChain::new(node("n1"));
        chain.append(EventId::new("e1"), "water_level", &serde_json::json!({"value": 1}));
        chain.append(EventId::new("e2"), "water_level", &serde_json::json!({"value": 2}));

        chain.entries[0].data_hash = "tampered".to_string();
        assert!(!chain.verify());
    }

    #[test]
    fn verify_fails_if_an_entry_is_reordered() {
        let mut chain = HashChain::new(node("n1"));
        chain.append(EventId::new("e1"), "water_level", &serde_json::json!({"value": 1}));
        chain.append(EventId::new("e2"), "water_level", &serde_json::json!({"value": 2}));

        chain.entries.swap(0, 1);
        assert!(!chain.verify());
    }

    #[test]
    fn entries_since_filters_by_sequence() {
        let mut chain = HashChain::new(node("n1"));
        for i in 0..5 {
            chain.append(EventId::new(format!("e{i}")), "t", &serde_json::json!(i));
        }
        let since = chain.entries_since(3);
        assert_eq!(since.len(), 2);
        assert_eq!(since[0].sequence, 3);
    }

    #[test]
    fn entries_since_zero_returns_everything() {
        let mut chain = HashChain::new(node("n1"));
        chain.append(EventId::new("e1"), "t", &serde_json::json!(1));
        assert_eq!(chain.entries_since(0).len(), 1);
    }

    #[test]
    fn data_hash_is_deterministic_regardless_of_key_insertion_order() {
        let mut a = HashChain::new(node("n1"));
        let entry_a = a.append(
            EventId::new("e1"),
            "t",
            &serde_json::json!({"a": 1, "b": 2}),
        );

        let mut b = HashChain::new(node("n1"));
        let entry_b = b.append(
            EventId::new("e1"),
            "t",
            &serde_json::json!({"b": 2, "a": 1}),
        );

        assert_eq!(entry_a.data_hash, entry_b.data_hash);
    }
}
