//! HTTP intake API: the surface callers use to submit events and read back
//! this node's local state, chain, and status.

use crate::error::AppError;
use crate::state::AppState;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use edgemesh_state::NodeState;
use edgemesh_types::Event;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

pub fn router(app: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/event", post(post_event))
        .route("/state", get(get_state))
        .route("/state/merkle", get(get_state_merkle))
        .route("/status", get(get_status))
        .route("/log", get(get_log))
        .route("/merge", post(post_merge))
        .with_state(app)
}

async fn root(State(app): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "node_id": app.node_id.as_str(),
        "service": "edge-mesh",
    }))
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

async fn post_event(
    State(app): State<Arc<AppState>>,
    Json(event): Json<Event>,
) -> Result<Response, AppError> {
    let event_data = serde_json::to_value(&event).map_err(|e| anyhow::anyhow!(e))?;
    let entry = {
        let mut chain = app.chain.lock().unwrap();
        chain.append(event.id.clone(), event.event_type.clone(), &event_data)
    };

    let stored_in = {
        let mut state = app.state.lock().unwrap();
        state.record_event(&event)?
    };

    let version = app.state.lock().unwrap().version();

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "status": "accepted",
            "event_id": event.id.as_str(),
            "category": stored_in.category,
            "stored_in": stored_in,
            "log_sequence": entry.sequence,
            "version": version,
        })),
    )
        .into_response())
}

async fn get_state(State(app): State<Arc<AppState>>) -> impl IntoResponse {
    let state = app.state.lock().unwrap();
    Json(state.serialize())
}

async fn get_state_merkle(State(app): State<Arc<AppState>>) -> impl IntoResponse {
    let state = app.state.lock().unwrap();
    Json(json!({
        "node_id": app.node_id.as_str(),
        "merkle_root": state.fingerprint(),
        "version": state.version(),
    }))
}

async fn get_status(State(app): State<Arc<AppState>>) -> impl IntoResponse {
    let state = app.state.lock().unwrap();
    let peer_count = app.config.peers().len();
    Json(json!({
        "node_id": app.node_id.as_str(),
        "version": state.version(),
        "merkle_root": state.fingerprint(),
        "peer_count": peer_count,
        "event_count": state.event_count(None),
        "uptime_seconds": app.uptime_seconds(),
    }))
}

#[derive(Debug, Deserialize)]
struct LogQuery {
    since: Option<u64>,
    limit: Option<usize>,
}

async fn get_log(State(app): State<Arc<AppState>>, Query(query): Query<LogQuery>) -> impl IntoResponse {
    let chain = app.chain.lock().unwrap();
    let since = query.since.unwrap_or(0);
    let limit = query.limit.unwrap_or(100);

    let entries: Vec<_> = chain
        .entries_since(since)
        .iter()
        .take(limit)
        .cloned()
        .collect();

    Json(json!({
        "entries": entries,
        "total": chain.len(),
        "valid": chain.verify(),
        "latest_hash": chain.latest_hash(),
    }))
}

async fn post_merge(
    State(app): State<Arc<AppState>>,
    Json(payload): Json<serde_json::Value>,
) -> Result<Response, AppError> {
    let incoming = NodeState::deserialize(payload)?;

    let (version, merkle_root) = {
        let mut state = app.state.lock().unwrap();
        state.merge(&incoming);
        (state.version(), state.fingerprint())
    };

    Ok((
        StatusCode::OK,
        Json(json!({
            "status": "merged",
            "version": version,
            "merkle_root": merkle_root,
        })),
    )
        .into_response())
}
