//! Gateway HTTP API: status/metrics/history read surface plus an on-demand
//! poll trigger. Restricted to the routes that are in-scope collaborators
//! of the poll/merge engine; node-lifecycle, fault-injection, scenario, and
//! dashboard routes are out of scope.

use crate::error::AppError;
use crate::state::AppState;
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use edgemesh_storage::SnapshotSink;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

pub fn router(app: Arc<AppState>) -> Router {
    Router::new()
        .route("/gateway/status", get(status))
        .route("/gateway/runtime-metrics", get(runtime_metrics))
        .route("/gateway/poll", post(trigger_poll))
        .route("/gateway/merged-state", get(merged_state))
        .route("/gateway/history", get(history))
        .route("/gateway/divergence", get(divergence))
        .route("/gateway/metrics", get(metrics))
        .with_state(app)
}

async fn status(State(app): State<Arc<AppState>>) -> impl IntoResponse {
    Json(app.engine.status())
}

async fn runtime_metrics(State(app): State<Arc<AppState>>) -> impl IntoResponse {
    Json(app.engine.status()["runtime_metrics"].clone())
}

async fn trigger_poll(State(app): State<Arc<AppState>>) -> Result<Response, AppError> {
    app.engine.poll_once().await.map_err(AppError::Internal)?;
    Ok(Json(json!({ "status": "polled" })).into_response())
}

async fn merged_state(State(app): State<Arc<AppState>>) -> impl IntoResponse {
    match app.engine.merged_state() {
        Some(state) => Json(state).into_response(),
        None => Json(json!(null)).into_response(),
    }
}

#[derive(Debug, Deserialize)]
struct LimitQuery {
    limit: Option<i64>,
}

async fn history(
    State(app): State<Arc<AppState>>,
    Query(query): Query<LimitQuery>,
) -> Result<Response, AppError> {
    let entries = app.sink.get_snapshot_history(query.limit.unwrap_or(50))?;
    Ok(Json(entries).into_response())
}

async fn divergence(
    State(app): State<Arc<AppState>>,
    Query(query): Query<LimitQuery>,
) -> Result<Response, AppError> {
    let entries = app.sink.get_divergence_log(query.limit.unwrap_or(50))?;
    Ok(Json(entries).into_response())
}

#[derive(Debug, Deserialize)]
struct MetricsQuery {
    name: Option<String>,
    limit: Option<i64>,
}

async fn metrics(
    State(app): State<Arc<AppState>>,
    Query(query): Query<MetricsQuery>,
) -> Result<Response, AppError> {
    let entries = app
        .sink
        .get_metrics(query.name.as_deref(), query.limit.unwrap_or(50))?;
    Ok(Json(entries).into_response())
}
