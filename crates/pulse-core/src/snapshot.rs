//! Consolidated dashboard snapshot.

use serde::{Deserialize, Serialize};

use crate::{
    MigrationStats, Position, RankedMigration, TrackedWallet, TradingConfig, TradingStats,
    WatchlistStats, WatchlistToken,
};

/// Everything the initial (and every resync) fetch returns, already mapped
/// into the canonical model.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DashboardSnapshot {
    pub config: TradingConfig,
    pub stats: TradingStats,
    pub wallets: Vec<TrackedWallet>,
    pub positions: Vec<Position>,
    /// Closed positions, most recent first.
    pub history: Vec<Position>,
    pub migrations: Vec<RankedMigration>,
    pub migration_stats: MigrationStats,
    pub watchlist: Vec<WatchlistToken>,
    pub watchlist_stats: WatchlistStats,
}
