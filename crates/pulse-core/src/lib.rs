//! Core domain types for the Pulse dashboard client.
//!
//! This crate provides the types shared by the transport, the snapshot
//! fetcher and the reconciliation store:
//! - `Position`, `PositionStatus`: open and closed trades
//! - `RankedMigration`: candidate tokens from the discovery feed
//! - `WatchlistToken`: tokens monitored against entry criteria
//! - `ActivityItem`: human-readable event log entries
//! - `EventType`, `ConnectionStatus`: push channel vocabulary

pub mod account;
pub mod activity;
pub mod connection;
pub mod error;
pub mod event;
pub mod migration;
pub mod position;
pub mod snapshot;
pub mod watchlist;

pub use account::{
    MigrationStats, TrackedWallet, TradingConfig, TradingStats, Transaction, TransactionPage,
    WatchlistStats,
};
pub use activity::{ActivityColor, ActivityItem};
pub use connection::ConnectionStatus;
pub use error::{CoreError, Result};
pub use event::EventType;
pub use migration::{
    AiDecision, Decision, MarketSnapshot, RankedMigration, WalletSignal, MAX_RECENT_SIGNALS,
};
pub use position::{Position, PositionStatus};
pub use snapshot::DashboardSnapshot;
pub use watchlist::{Evaluation, WatchlistMetrics, WatchlistReasoning, WatchlistToken};

/// Current wall-clock time in Unix milliseconds.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
