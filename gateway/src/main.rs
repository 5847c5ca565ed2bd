//! Gateway process: binds the gateway HTTP API and runs the poll/merge
//! engine against a SQLite-backed snapshot sink.

use clap::Parser;
use edgemesh_gateway::config::Config;
use edgemesh_gateway::http;
use edgemesh_gateway::poll::GatewayEngine;
use edgemesh_gateway::state::AppState;
use edgemesh_storage::{SnapshotSink, SqliteSnapshotSink};
use std::sync::Arc;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    tracing::info!(
        http_port = config.http_port,
        poll_interval = config.poll_interval,
        edge_nodes = ?config.edge_nodes(),
        "starting gateway"
    );

    std::fs::create_dir_all(&config.data_dir)?;
    let db_path = format!("{}/gateway.db", config.data_dir.trim_end_matches('/'));
    let sink: Arc<dyn SnapshotSink> = Arc::new(SqliteSnapshotSink::open(&db_path)?);

    let engine = Arc::new(GatewayEngine::new(config.clone(), sink.clone()));
    let app_state = Arc::new(AppState {
        engine: engine.clone(),
        sink,
    });

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.http_port)).await?;
    let router = http::router(app_state);
    let http_server = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router).await {
            tracing::error!(error = %e, "http server exited");
        }
    });

    let (stop_tx, stop_rx) = watch::channel(false);
    let poll_task = tokio::spawn(engine.run(stop_rx));

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

    let _ = stop_tx.send(true);
    let _ = poll_task.await;

    tracing::info!("gateway stopped");
    Ok(())
}
