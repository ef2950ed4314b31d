//! pulse-dashboard - local view server for the Pulse dashboard client.
//!
//! Serves the reconciled [`TradingState`](pulse_store::TradingState) to view
//! clients and forwards their actions to the application:
//!
//! - REST API for the current state and its slices
//! - WebSocket pushing the full state on every published change
//! - Action endpoints backed by an [`ActionHandler`]
//! - Prometheus metrics at `/metrics`
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         pulse process                         │
//! │                                                              │
//! │   transports ──► Store ──watch──► broadcaster ──► /ws clients │
//! │                    ▲                                         │
//! │                    │                                         │
//! │   dispatcher (ActionHandler) ◄── POST /api/actions/...        │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use pulse_dashboard::{run_server, DashboardConfig};
//!
//! let shutdown = CancellationToken::new();
//! tokio::spawn(run_server(store.clone(), dispatcher, DashboardConfig::default(), shutdown));
//! ```

mod action;
mod broadcast;
mod config;
mod error;
mod server;
mod types;

pub use action::{ActionCall, ActionHandler, DynActionHandler, MockActions};
pub use broadcast::run_broadcaster;
pub use config::DashboardConfig;
pub use error::{ActionError, ActionResult, ServerError, ServerResult};
pub use server::{create_router, run_server, serve, AppState, ConnectionGuard, ConnectionLimiter};
pub use types::{
    ApiResponse, PageQuery, ToggleTradingRequest, TrackRequest, ViewMessage, DEFAULT_PAGE_LIMIT,
    MAX_PAGE_LIMIT,
};
