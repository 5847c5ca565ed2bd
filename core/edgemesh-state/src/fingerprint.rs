//! Canonical JSON and Merkle-style fingerprint reduction.

use serde::Serialize;
use sha2::{Digest, Sha256};

/// Renders `value` as canonical JSON: sorted keys, no insignificant
/// whitespace, shortest numeric form. Relies on `serde_json`'s default
/// (non-`preserve_order`) object representation, which is backed by a
/// `BTreeMap` and therefore always emits keys in sorted order.
pub fn canonical_json(value: &impl Serialize) -> String {
    serde_json::to_string(value).expect("canonical JSON values are always serializable")
}

fn sha256_hex(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    hex::encode(digest)
}

/// Hashes a single fingerprint leaf: `"{prefix}:{key}:{canonical_json(payload)}"`.
pub fn leaf(prefix: &str, key: &str, payload: &impl Serialize) -> String {
    let raw = format!("{prefix}:{key}:{}", canonical_json(payload));
    sha256_hex(&raw)
}

/// Reduces leaves pairwise into a single root. An odd leaf out is paired
/// with itself. Returns the fixed `"empty"` digest when there are no leaves.
pub fn reduce(mut leaves: Vec<String>) -> String {
    if leaves.is_empty() {
        return sha256_hex("empty");
    }

    while leaves.len() > 1 {
        let mut next = Vec::with_capacity(leaves.len().div_ceil(2));
        for pair in leaves.chunks(2) {
            let left = &pair[0];
            let right = pair.get(1).unwrap_or(left);
            next.push(sha256_hex(&format!("{left}{right}")));
        }
        leaves = next;
    }

    leaves.into_iter().next().expect("non-empty after reduction")
}
