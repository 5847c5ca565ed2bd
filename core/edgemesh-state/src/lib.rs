//! Composite per-node state built from the CRDT primitives in
//! `edgemesh-crdt`: routes incoming events to the right sub-CRDT by
//! category and computes a single convergent fingerprint over all of
//! them.

mod error;
mod fingerprint;
mod routing;
mod state;

pub use error::Error;
pub use state::{NodeState, StoredIn};

/// Result type alias using this crate's error type.
pub type Result<T> = std::result::Result<T, Error>;
