//! Convergent replicated data types for the edge mesh.
//!
//! - [`GCounter`] — grow-only counter
//! - [`PnCounter`] — positive-negative counter built from two [`GCounter`]s
//! - [`LwwRegister`] — last-writer-wins register
//! - [`ObservedRemoveSet`] — add-wins observed-remove set
//!
//! Every merge here is commutative, associative, and idempotent: replicas
//! that observe the same updates, in any order, converge to the same state.

mod gcounter;
mod lww_register;
mod orset;
mod pn_counter;

pub use gcounter::GCounter;
pub use lww_register::LwwRegister;
pub use orset::{ObservedRemoveSet, Tag};
pub use pn_counter::PnCounter;

/// Errors raised by CRDT-level operations.
#[derive(Debug, Clone, Copy, thiserror::Error)]
pub enum Error {
    #[error("counter amount must be non-negative, got {0}")]
    InvalidAmount(i64),
}
