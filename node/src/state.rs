//! Shared process state handed to both the HTTP handlers and the gossip
//! engine. A single mutex guards the composite state and a second guards
//! the hash chain, matching the concurrency model: any number of readers
//! and writers, but never two concurrent mutations of the same structure.

use crate::config::Config;
use crate::gossip::GossipStats;
use edgemesh_chain::HashChain;
use edgemesh_state::NodeState;
use edgemesh_types::NodeId;
use std::sync::{Arc, Mutex};
use std::time::Instant;

pub struct AppState {
    pub config: Config,
    pub node_id: NodeId,
    pub state: Mutex<NodeState>,
    pub chain: Mutex<HashChain>,
    pub start_time: Instant,
    pub gossip_stats: Arc<Mutex<GossipStats>>,
}

impl AppState {
    #[must_use]
    pub fn new(config: Config, node_id: NodeId) -> Self {
        Self {
            state: Mutex::new(NodeState::new(node_id.clone())),
            chain: Mutex::new(HashChain::new(node_id.clone())),
            gossip_stats: Arc::new(Mutex::new(GossipStats::default())),
            start_time: Instant::now(),
            config,
            node_id,
        }
    }

    #[must_use]
    pub fn uptime_seconds(&self) -> f64 {
        self.start_time.elapsed().as_secs_f64()
    }
}
