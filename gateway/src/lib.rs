//! Gateway library: poll/merge engine, HTTP API, and shared app state. The
//! binary (`main.rs`) only wires these together; integration tests exercise
//! the engine and router directly through this crate.

pub mod config;
pub mod error;
pub mod http;
pub mod poll;
pub mod state;
