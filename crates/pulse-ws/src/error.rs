//! Transport error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WsError {
    /// Handshake or socket failure.
    #[error("Transport error: {0}")]
    Transport(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Valid JSON that is not a push envelope.
    #[error("Malformed envelope: {0}")]
    MalformedEnvelope(String),
}

pub type WsResult<T> = Result<T, WsError>;
