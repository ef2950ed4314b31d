//! Application error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Configuration error: {0}")]
    ConfigSource(#[from] ::config::ConfigError),

    #[error("Backend error: {0}")]
    Api(#[from] pulse_api::ApiError),

    #[error("Store error: {0}")]
    Store(#[from] pulse_store::StoreError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] pulse_telemetry::TelemetryError),

    #[error("View server error: {0}")]
    Dashboard(#[from] pulse_dashboard::ServerError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type AppResult<T> = Result<T, AppError>;
