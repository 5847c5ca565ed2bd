//! Append-only snapshot and metrics persistence for the gateway.
//!
//! Defines the [`SnapshotSink`] interface the gateway's poll/merge engine
//! writes through, plus [`SqliteSnapshotSink`], a `rusqlite`-backed
//! implementation.

mod error;
mod sink;
mod sqlite;
mod types;

pub use error::Error;
pub use sink::SnapshotSink;
pub use sqlite::SqliteSnapshotSink;
pub use types::{DivergenceEntry, MetricEntry, Snapshot, SnapshotSummary};

/// Result type alias using this crate's error type.
pub type Result<T> = std::result::Result<T, Error>;
