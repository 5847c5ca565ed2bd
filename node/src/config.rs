//! Edge node configuration, parsed from CLI flags with environment-variable
//! fallback.

use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(name = "edgemesh-node")]
#[command(about = "Disaster-response edge mesh node: HTTP intake + UDP gossip")]
pub struct Config {
    /// Stable, opaque identifier for this node.
    #[arg(long, env = "NODE_ID", default_value = "node-1")]
    pub node_id: String,

    /// Port the HTTP intake API listens on.
    #[arg(long, env = "HTTP_PORT", default_value_t = 8000)]
    pub http_port: u16,

    /// UDP port the gossip engine binds to.
    #[arg(long, env = "GOSSIP_PORT", default_value_t = 9000)]
    pub gossip_port: u16,

    /// Seconds between gossip broadcast cycles.
    #[arg(long, env = "GOSSIP_INTERVAL", default_value_t = 5.0)]
    pub gossip_interval: f64,

    /// Directory for any host-provided persistence (unused beyond accepting
    /// the option; the node's state and chain are in-memory for the
    /// process lifetime per the durability non-goal).
    #[arg(long, env = "DATA_DIR", default_value = "/data")]
    pub data_dir: String,

    /// `tracing` log level: error, warn, info, debug, or trace.
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Gossip peers as `host:port`, comma-separated.
    #[arg(long, env = "PEER_NODES", value_delimiter = ',', default_value = "")]
    pub peers: Vec<String>,
}

impl Config {
    /// The configured peers, with any empty entries (from a blank env var
    /// or trailing comma) filtered out.
    #[must_use]
    pub fn peers(&self) -> Vec<String> {
        self.peers
            .iter()
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect()
    }
}
