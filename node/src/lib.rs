//! Edge node library: HTTP intake, UDP gossip engine, and a shared node
//! state / hash-chain pair. The binary (`main.rs`) only wires these
//! together; integration tests exercise the router and gossip engine
//! directly through this crate.

pub mod config;
pub mod error;
pub mod gossip;
pub mod http;
pub mod state;
