use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::selector::SelectionError;

/// Body shape shared by every JSON response the service produces.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct StatusResponse {
    pub status: String,
    pub message: String,
}

impl StatusResponse {
    pub fn new(status: &str, message: &str) -> Self {
        Self {
            status: status.to_string(),
            message: message.to_string(),
        }
    }
}

/// Closed error set of the caching core. Cloneable so concurrent
/// single-flight waiters can share one fetch outcome.
#[derive(Clone, Debug, thiserror::Error)]
pub enum ScsError {
    #[error("{0}")]
    InvalidInput(String),
    #[error("request is not authorized for role {0}")]
    Unauthorized(String),
    #[error("{0}")]
    NotFound(String),
    #[error("upstream call failed with status {status}: {dump}")]
    UpstreamError { status: u16, dump: String },
    #[error("upstream transport failure: {0}")]
    UpstreamTimeout(String),
    #[error(transparent)]
    Selection(#[from] SelectionError),
    #[error("storage failure: {0}")]
    Storage(String),
    #[error("{0}")]
    Internal(String),
}

impl ScsError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ScsError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ScsError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ScsError::NotFound(_) => StatusCode::NOT_FOUND,
            ScsError::UpstreamError { .. }
            | ScsError::UpstreamTimeout(_)
            | ScsError::Selection(_)
            | ScsError::Storage(_)
            | ScsError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ScsError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = StatusResponse::new("Failure", &self.to_string());
        (status, Json(body)).into_response()
    }
}
