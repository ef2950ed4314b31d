//! Reconciled client state.

use std::sync::Arc;

use pulse_core::{
    ActivityItem, ConnectionStatus, MigrationStats, Position, RankedMigration, TrackedWallet,
    TradingConfig, TradingStats, WatchlistStats, WatchlistToken,
};
use serde::Serialize;

/// Everything the dashboard shows, as one immutable snapshot.
///
/// Collections hold `Arc`s: a reduction that touches one entry replaces only
/// that entry's `Arc`, so consumers can skip unchanged entries with
/// `Arc::ptr_eq`.
#[derive(Debug, Clone, Serialize)]
pub struct TradingState {
    /// Open positions, unique by mint.
    pub positions: Vec<Arc<Position>>,
    /// Closed positions, unique by id, most recent first.
    pub history: Vec<Arc<Position>>,
    /// Ranked migrations, unique by mint.
    pub migrations: Vec<Arc<RankedMigration>>,
    /// Watchlist tokens, unique by mint.
    pub watchlist: Vec<Arc<WatchlistToken>>,
    /// Activity feed, newest first.
    pub activity: Vec<Arc<ActivityItem>>,

    pub config: TradingConfig,
    pub stats: TradingStats,
    pub wallets: Vec<TrackedWallet>,
    pub migration_stats: MigrationStats,
    pub watchlist_stats: WatchlistStats,

    /// A snapshot fetch is in flight and no snapshot has been applied since.
    pub loading: bool,
    /// Last snapshot fetch error, cleared by the next successful fetch.
    pub error: Option<String>,
    /// When the last snapshot was applied (Unix ms).
    pub last_updated: Option<i64>,

    pub connection: ConnectionStatus,
    pub reasoning_connection: ConnectionStatus,
    pub client_id: Option<String>,

    /// Incremented on every applied change.
    pub version: u64,
}

impl Default for TradingState {
    fn default() -> Self {
        Self {
            positions: Vec::new(),
            history: Vec::new(),
            migrations: Vec::new(),
            watchlist: Vec::new(),
            activity: Vec::new(),
            config: TradingConfig::default(),
            stats: TradingStats::default(),
            wallets: Vec::new(),
            migration_stats: MigrationStats::default(),
            watchlist_stats: WatchlistStats::default(),
            loading: true,
            error: None,
            last_updated: None,
            connection: ConnectionStatus::Disconnected,
            reasoning_connection: ConnectionStatus::Disconnected,
            client_id: None,
            version: 0,
        }
    }
}

impl TradingState {
    /// Open position for a mint.
    pub fn position(&self, mint: &str) -> Option<&Arc<Position>> {
        self.positions.iter().find(|p| p.mint == mint)
    }

    /// Open position by id.
    pub fn position_by_id(&self, id: &str) -> Option<&Arc<Position>> {
        self.positions.iter().find(|p| p.id == id)
    }

    /// Closed position by id.
    pub fn history_entry(&self, id: &str) -> Option<&Arc<Position>> {
        self.history.iter().find(|p| p.id == id)
    }

    /// Whether any closed position exists for a mint.
    pub fn has_history_for(&self, mint: &str) -> bool {
        self.history.iter().any(|p| p.mint == mint)
    }

    pub fn migration(&self, mint: &str) -> Option<&Arc<RankedMigration>> {
        self.migrations.iter().find(|m| m.mint == mint)
    }

    pub fn watch_token(&self, mint: &str) -> Option<&Arc<WatchlistToken>> {
        self.watchlist.iter().find(|t| t.mint == mint)
    }

    pub fn wallet(&self, address: &str) -> Option<&TrackedWallet> {
        self.wallets.iter().find(|w| w.address == address)
    }

    /// Best display symbol for a mint: open position, migration, watchlist,
    /// then closed history.
    pub fn symbol_for(&self, mint: &str) -> Option<&str> {
        self.position(mint)
            .map(|p| p.symbol.as_str())
            .or_else(|| self.migration(mint).map(|m| m.symbol.as_str()))
            .or_else(|| self.watch_token(mint).map(|t| t.symbol.as_str()))
            .or_else(|| {
                self.history
                    .iter()
                    .find(|p| p.mint == mint)
                    .map(|p| p.symbol.as_str())
            })
            .filter(|s| !s.is_empty())
    }
}
