//! View server error types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use pulse_api::ApiError;
use thiserror::Error;

use crate::types::ApiResponse;

#[derive(Debug, Error)]
pub enum ActionError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ActionError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Api(e) if e.is_timeout())
    }

    /// HTTP status reported to view clients.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::Api(_) if self.is_timeout() => StatusCode::GATEWAY_TIMEOUT,
            Self::Api(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for ActionError {
    fn into_response(self) -> Response {
        (
            self.status_code(),
            Json(ApiResponse::<()>::err(self.to_string())),
        )
            .into_response()
    }
}

pub type ActionResult<T> = Result<T, ActionError>;

/// View server failures.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Server error: {0}")]
    Serve(#[from] std::io::Error),
}

pub type ServerResult<T> = Result<T, ServerError>;
