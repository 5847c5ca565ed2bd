//! SQLite-backed [`SnapshotSink`].
//!
//! Three append-only tables: `snapshots`, `divergence_log`, `metrics`.
//! State and metric payloads are stored as opaque JSON text; this crate
//! never interprets their contents.

use crate::sink::SnapshotSink;
use crate::types::{DivergenceEntry, MetricEntry, Snapshot, SnapshotSummary};
use crate::Error;
use edgemesh_types::Timestamp;
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};

/// A [`SnapshotSink`] backed by a single SQLite file (or an in-memory
/// database for tests). Safe to share across tasks: every statement
/// takes the connection lock for the duration of one call.
pub struct SqliteSnapshotSink {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteSnapshotSink {
    /// Opens (or creates) a snapshot store at `path`.
    pub fn open(path: &str) -> Result<Self, Error> {
        let conn = Connection::open(path)
            .map_err(|e| Error::Storage(format!("failed to open snapshot store: {e}")))?;
        let sink = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        sink.init_schema()?;
        Ok(sink)
    }

    /// Opens an in-memory store, for tests.
    pub fn open_in_memory() -> Result<Self, Error> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::Storage(format!("failed to open in-memory snapshot store: {e}")))?;
        let sink = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        sink.init_schema()?;
        Ok(sink)
    }

    fn init_schema(&self) -> Result<(), Error> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS snapshots (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                merkle_root TEXT NOT NULL,
                node_count INTEGER NOT NULL,
                source_nodes TEXT NOT NULL,
                state_json TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS divergence_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                is_divergent INTEGER NOT NULL,
                merkle_roots_json TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS metrics (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                name TEXT NOT NULL,
                value REAL NOT NULL,
                metadata_json TEXT
            );
            ",
        )
        .map_err(|e| Error::Storage(format!("failed to init snapshot schema: {e}")))?;
        Ok(())
    }
}

impl SnapshotSink for SqliteSnapshotSink {
    fn save_snapshot(
        &self,
        merkle_root: &str,
        node_count: i64,
        source_nodes: &[String],
        state: &serde_json::Value,
    ) -> Result<(), Error> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO snapshots (timestamp, merkle_root, node_count, source_nodes, state_json)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                Timestamp::now().to_iso8601(),
                merkle_root,
                node_count,
                serde_json::to_string(source_nodes)?,
                serde_json::to_string(state)?,
            ],
        )
        .map_err(|e| Error::Storage(format!("failed to save snapshot: {e}")))?;
        Ok(())
    }

    fn get_latest_snapshot(&self) -> Result<Option<Snapshot>, Error> {
        let conn = self.conn.lock().unwrap();
        let result = conn.query_row(
            "SELECT id, timestamp, merkle_root, node_count, source_nodes, state_json
             FROM snapshots ORDER BY id DESC LIMIT 1",
            [],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                ))
            },
        );

        match result {
            Ok((id, timestamp, merkle_root, node_count, source_nodes, state_json)) => {
                Ok(Some(Snapshot {
                    id,
                    timestamp,
                    merkle_root,
                    node_count,
                    source_nodes: serde_json::from_str(&source_nodes)?,
                    state: serde_json::from_str(&state_json)?,
                }))
            }
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Error::Storage(format!("failed to load latest snapshot: {e}"))),
        }
    }

    fn get_snapshot_history(&self, limit: i64) -> Result<Vec<SnapshotSummary>, Error> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                "SELECT id, timestamp, merkle_root, node_count, source_nodes
                 FROM snapshots ORDER BY id DESC LIMIT ?1",
            )
            .map_err(|e| Error::Storage(format!("failed to prepare history query: {e}")))?;

        let rows = stmt
            .query_map(params![limit], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, String>(4)?,
                ))
            })
            .map_err(|e| Error::Storage(format!("failed to query snapshot history: {e}")))?;

        let mut summaries = Vec::new();
        for row in rows {
            let (id, timestamp, merkle_root, node_count, source_nodes) =
                row.map_err(|e| Error::Storage(format!("failed to read snapshot row: {e}")))?;
            summaries.push(SnapshotSummary {
                id,
                timestamp,
                merkle_root,
                node_count,
                source_nodes: serde_json::from_str(&source_nodes)?,
            });
        }
        Ok(summaries)
    }

    fn log_divergence(
        &self,
        is_divergent: bool,
        merkle_roots: &serde_json::Value,
    ) -> Result<(), Error> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO divergence_log (timestamp, is_divergent, merkle_roots_json)
             VALUES (?1, ?2, ?3)",
            params![
                Timestamp::now().to_iso8601(),
                i64::from(is_divergent),
                serde_json::to_string(merkle_roots)?,
            ],
        )
        .map_err(|e| Error::Storage(format!("failed to log divergence: {e}")))?;
        Ok(())
    }

    fn get_divergence_log(&self, limit: i64) -> Result<Vec<DivergenceEntry>, Error> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                "SELECT id, timestamp, is_divergent, merkle_roots_json
                 FROM divergence_log ORDER BY id DESC LIMIT ?1",
            )
            .map_err(|e| Error::Storage(format!("failed to prepare divergence query: {e}")))?;

        let rows = stmt
            .query_map(params![limit], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })
            .map_err(|e| Error::Storage(format!("failed to query divergence log: {e}")))?;

        let mut entries = Vec::new();
        for row in rows {
            let (id, timestamp, is_divergent, merkle_roots_json) =
                row.map_err(|e| Error::Storage(format!("failed to read divergence row: {e}")))?;
            entries.push(DivergenceEntry {
                id,
                timestamp,
                is_divergent: is_divergent != 0,
                merkle_roots: serde_json::from_str(&merkle_roots_json)?,
            });
        }
        Ok(entries)
    }

    fn save_metric(
        &self,
        name: &str,
        value: f64,
        metadata: Option<&serde_json::Value>,
    ) -> Result<(), Error> {
        let conn = self.conn.lock().unwrap();
        let metadata_json = serde_json::to_string(metadata.unwrap_or(&serde_json::json!({})))?;
        conn.execute(
            "INSERT INTO metrics (timestamp, name, value, metadata_json) VALUES (?1, ?2, ?3, ?4)",
            params![Timestamp::now().to_iso8601(), name, value, metadata_json],
        )
        .map_err(|e| Error::Storage(format!("failed to save metric: {e}")))?;
        Ok(())
    }

    fn get_metrics(&self, name: Option<&str>, limit: i64) -> Result<Vec<MetricEntry>, Error> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = if name.is_some() {
            conn.prepare(
                "SELECT timestamp, name, value, metadata_json FROM metrics
                 WHERE name = ?1 ORDER BY id DESC LIMIT ?2",
            )
        } else {
            conn.prepare(
                "SELECT timestamp, name, value, metadata_json FROM metrics
                 ORDER BY id DESC LIMIT ?1",
            )
        }
        .map_err(|e| Error::Storage(format!("failed to prepare metrics query: {e}")))?;

        let map_row = |row: &rusqlite::Row<'_>| -> rusqlite::Result<(String, String, f64, Option<String>)> {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, f64>(2)?,
                row.get::<_, Option<String>>(3)?,
            ))
        };

        let rows = if let Some(name) = name {
            stmt.query_map(params![name, limit], map_row)
        } else {
            stmt.query_map(params![limit], map_row)
        }
        .map_err(|e| Error::Storage(format!("failed to query metrics: {e}")))?;

        let mut metrics = Vec::new();
        for row in rows {
            let (timestamp, name, value, metadata_json) =
                row.map_err(|e| Error::Storage(format!("failed to read metric row: {e}")))?;
            let metadata = match metadata_json {
                Some(json) if !json.is_empty() => serde_json::from_str(&json)?,
                _ => serde_json::json!({}),
            };
            metrics.push(MetricEntry {
                timestamp,
                name,
                value,
                metadata,
            });
        }
        Ok(metrics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn latest_snapshot_is_none_when_empty() {
        let sink = SqliteSnapshotSink::open_in_memory().unwrap();
        assert!(sink.get_latest_snapshot().unwrap().is_none());
    }

    #[test]
    fn save_and_load_latest_snapshot_round_trips() {
        let sink = SqliteSnapshotSink::open_in_memory().unwrap();
        let source_nodes = vec!["node-001".to_string(), "node-002".to_string()];
        let state = serde_json::json!({"counters": 3});

        sink.save_snapshot("abc123", 2, &source_nodes, &state).unwrap();
        let latest = sink.get_latest_snapshot().unwrap().unwrap();

        assert_eq!(latest.merkle_root, "abc123");
        assert_eq!(latest.node_count, 2);
        assert_eq!(latest.source_nodes, source_nodes);
        assert_eq!(latest.state, state);
    }

    #[test]
    fn history_is_ordered_most_recent_first_and_respects_limit() {
        let sink = SqliteSnapshotSink::open_in_memory().unwrap();
        for i in 0..5 {
            sink.save_snapshot(&format!("root-{i}"), 1, &[], &serde_json::json!({}))
                .unwrap();
        }
        let history = sink.get_snapshot_history(3).unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].merkle_root, "root-4");
        assert_eq!(history[2].merkle_root, "root-2");
    }

    #[test]
    fn divergence_log_round_trips_and_orders_most_recent_first() {
        let sink = SqliteSnapshotSink::open_in_memory().unwrap();
        sink.log_divergence(false, &serde_json::json!({"node-001": "a"})).unwrap();
        sink.log_divergence(true, &serde_json::json!({"node-001": "a", "node-002": "b"}))
            .unwrap();

        let log = sink.get_divergence_log(10).unwrap();
        assert_eq!(log.len(), 2);
        assert!(log[0].is_divergent);
        assert!(!log[1].is_divergent);
    }

    #[test]
    fn metrics_filter_by_name_and_respect_limit() {
        let sink = SqliteSnapshotSink::open_in_memory().unwrap();
        sink.save_metric("merge_time_ms", 12.5, None).unwrap();
        sink.save_metric("node_count", 3.0, None).unwrap();
        sink.save_metric("merge_time_ms", 9.0, Some(&serde_json::json!({"peer": "node-003"})))
            .unwrap();

        let all = sink.get_metrics(None, 10).unwrap();
        assert_eq!(all.len(), 3);

        let filtered = sink.get_metrics(Some("merge_time_ms"), 10).unwrap();
        assert_eq!(filtered.len(), 2);
        assert_eq!(filtered[0].value, 9.0);
        assert_eq!(filtered[0].metadata["peer"], "node-003");
    }

    #[test]
    fn metrics_with_no_metadata_default_to_empty_object() {
        let sink = SqliteSnapshotSink::open_in_memory().unwrap();
        sink.save_metric("is_divergent", 0.0, None).unwrap();
        let metrics = sink.get_metrics(Some("is_divergent"), 1).unwrap();
        assert_eq!(metrics[0].metadata, serde_json::json!({}));
    }
}
