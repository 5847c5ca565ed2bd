//! Gateway configuration, parsed from CLI flags with environment-variable
//! fallback.

use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(name = "edgemesh-gateway")]
#[command(about = "Disaster-response edge mesh gateway: poll/merge engine + snapshot persistence")]
pub struct Config {
    /// Port the gateway's own HTTP API listens on.
    #[arg(long, env = "HTTP_PORT", default_value_t = 8080)]
    pub http_port: u16,

    /// Seconds between poll cycles.
    #[arg(long, env = "GATEWAY_POLL_INTERVAL", default_value_t = 10.0)]
    pub poll_interval: f64,

    /// Total attempts per HTTP call to an edge node, minimum 1.
    #[arg(long, env = "GATEWAY_HTTP_RETRIES", default_value_t = 2)]
    pub http_retries: u32,

    /// Milliseconds of backoff before each retry, multiplied by attempt number.
    #[arg(long, env = "GATEWAY_HTTP_RETRY_BACKOFF_MS", default_value_t = 150)]
    pub retry_backoff_ms: u64,

    /// Seconds of per-node backoff applied after exhausting retries,
    /// multiplied by consecutive failure count.
    #[arg(long, env = "GATEWAY_NODE_FAILURE_BACKOFF", default_value_t = 2)]
    pub node_failure_backoff_secs: u64,

    /// Directory for any host-provided persistence; the SQLite snapshot
    /// store lives at `{data_dir}/gateway.db`.
    #[arg(long, env = "DATA_DIR", default_value = "/data")]
    pub data_dir: String,

    /// `tracing` log level.
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Edge nodes to pre-populate the registry with, as `host:port`,
    /// comma-separated; each is reachable at `http://{host:port}`.
    #[arg(long, env = "EDGE_NODES", value_delimiter = ',', default_value = "")]
    pub edge_nodes: Vec<String>,
}

impl Config {
    #[must_use]
    pub fn edge_nodes(&self) -> Vec<String> {
        self.edge_nodes
            .iter()
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect()
    }

    #[must_use]
    pub fn http_retries(&self) -> u32 {
        self.http_retries.max(1)
    }
}
