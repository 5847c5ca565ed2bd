use crate::types::{DivergenceEntry, MetricEntry, Snapshot, SnapshotSummary};
use crate::Error;

/// Append-only persistence for merged snapshots, divergence events, and
/// numeric metrics. Implementations never update or delete existing rows;
/// every write is a new row, and every read is ordered most-recent-first.
pub trait SnapshotSink: Send + Sync {
    fn save_snapshot(
        &self,
        merkle_root: &str,
        node_count: i64,
        source_nodes: &[String],
        state: &serde_json::Value,
    ) -> Result<(), Error>;

    fn get_latest_snapshot(&self) -> Result<Option<Snapshot>, Error>;

    fn get_snapshot_history(&self, limit: i64) -> Result<Vec<SnapshotSummary>, Error>;

    fn log_divergence(
        &self,
        is_divergent: bool,
        merkle_roots: &serde_json::Value,
    ) -> Result<(), Error>;

    fn get_divergence_log(&self, limit: i64) -> Result<Vec<DivergenceEntry>, Error>;

    fn save_metric(
        &self,
        name: &str,
        value: f64,
        metadata: Option<&serde_json::Value>,
    ) -> Result<(), Error>;

    fn get_metrics(&self, name: Option<&str>, limit: i64) -> Result<Vec<MetricEntry>, Error>;
}
