//! Store error types.

use pulse_core::EventType;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{event}: missing required field `{field}`")]
    MissingField {
        event: EventType,
        field: &'static str,
    },

    #[error("{event}: invalid payload: {reason}")]
    InvalidPayload { event: EventType, reason: String },

    #[error("Event type is not handled by the store: {0}")]
    Unhandled(String),

    #[error("Invalid route: {0}")]
    InvalidRoute(String),
}

pub type StoreResult<T> = Result<T, StoreError>;
