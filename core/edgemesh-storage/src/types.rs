//! Record types returned by a [`crate::SnapshotSink`].

use serde::{Deserialize, Serialize};

/// A full merged-state snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: i64,
    pub timestamp: String,
    pub merkle_root: String,
    pub node_count: i64,
    pub source_nodes: Vec<String>,
    pub state: serde_json::Value,
}

/// A snapshot's metadata without the (potentially large) embedded state,
/// as returned by history listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotSummary {
    pub id: i64,
    pub timestamp: String,
    pub merkle_root: String,
    pub node_count: i64,
    pub source_nodes: Vec<String>,
}

/// One row of the divergence log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DivergenceEntry {
    pub id: i64,
    pub timestamp: String,
    pub is_divergent: bool,
    pub merkle_roots: serde_json::Value,
}

/// One recorded metric sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricEntry {
    pub timestamp: String,
    pub name: String,
    pub value: f64,
    pub metadata: serde_json::Value,
}
