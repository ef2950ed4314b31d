//! Pulse: headless reconciliation client for a smart-trading dashboard.
//!
//! Orchestrates all components:
//! - Push channels into the reconciliation store
//! - Snapshot fetches driven by connection status
//! - Optimistic user actions with rollback
//! - Re-analysis intents from the store
//! - Local view server

pub mod app;
pub mod config;
pub mod controller;
pub mod dispatcher;
pub mod effects;
pub mod error;

pub use app::Application;
pub use config::AppConfig;
pub use controller::{FetchLatch, FetchReason, ResyncHandle, SyncController};
pub use dispatcher::ActionDispatcher;
pub use error::{AppError, AppResult};
