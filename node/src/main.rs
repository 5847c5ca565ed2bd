//! Edge node process: binds the HTTP intake API and the UDP gossip engine
//! over one shared, in-memory node state and hash chain.

use clap::Parser;
use edgemesh_node::config::Config;
use edgemesh_node::state::AppState;
use edgemesh_node::{gossip, http};
use edgemesh_types::NodeId;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let node_id = NodeId::new(config.node_id.clone())?;
    tracing::info!(
        node_id = %node_id,
        http_port = config.http_port,
        gossip_port = config.gossip_port,
        peers = ?config.peers(),
        "starting edge node"
    );

    let app = Arc::new(AppState::new(config.clone(), node_id));

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.http_port)).await?;
    let router = http::router(app.clone());
    let http_server = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router).await {
            tracing::error!(error = %e, "http server exited");
        }
    });

    let (gossip_handle, gossip_task) = gossip::spawn(app.clone()).await?;

    tokio::select! {
        result = http_server => {
            if let Err(e) = result {
                tracing::error!(error = %e, "http server task panicked");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown signal received");
        }
    }

    gossip_handle.stop();
    let _ = gossip_task.await;

    tracing::info!("edge node stopped");
    Ok(())
}
