//! Core type definitions for the edge mesh.
//!
//! Defines the fundamental types shared by every component: node and
//! event identifiers, the hybrid logical clock timestamp used for LWW
//! ordering, and the `Event` submitted to a node's intake surface.

mod event;
mod ids;
mod timestamp;

pub use event::{Category, Event, Operation};
pub use ids::{EventId, NodeId};
pub use timestamp::Timestamp;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type construction.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid node id: {0}")]
    InvalidNodeId(String),
}
