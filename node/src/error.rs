//! HTTP-facing error type: maps library error kinds to status codes per
//! the error handling design (`StateDecodeError`/`InvalidAmount` → 4xx,
//! anything else → 500).

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("invalid amount: {0}")]
    InvalidAmount(i64),

    #[error("state payload could not be decoded: {0}")]
    StateDecodeError(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<edgemesh_state::Error> for AppError {
    fn from(err: edgemesh_state::Error) -> Self {
        match err {
            edgemesh_state::Error::InvalidAmount(amount) => Self::InvalidAmount(amount),
            edgemesh_state::Error::StateDecodeError(msg) => Self::StateDecodeError(msg),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::InvalidAmount(_) | Self::StateDecodeError(_) => {
                (StatusCode::BAD_REQUEST, self.to_string())
            }
            Self::Internal(_) => {
                tracing::error!(error = %self, "unhandled node error");
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string())
            }
        };
        (status, Json(json!({ "status": "error", "detail": message }))).into_response()
    }
}
