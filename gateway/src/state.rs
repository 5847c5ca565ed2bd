//! Shared process state for the gateway's HTTP API.

use crate::poll::GatewayEngine;
use edgemesh_storage::SnapshotSink;
use std::sync::Arc;

pub struct AppState {
    pub engine: Arc<GatewayEngine>,
    pub sink: Arc<dyn SnapshotSink>,
}
