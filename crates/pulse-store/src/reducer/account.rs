//! Snapshot, connection, config and wallet reducers.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use pulse_api::wire::WireTradingStats;
use pulse_core::{
    ConnectionStatus, DashboardSnapshot, Position, PositionStatus, TrackedWallet, TradingConfig,
};
use tracing::debug;

use super::migrations::merge_migrations;
use super::reuse_or_wrap;
use crate::config::StoreConfig;
use crate::routing::Channel;
use crate::state::TradingState;

pub fn fetch_started(state: &mut TradingState) -> bool {
    if state.loading {
        return false;
    }
    state.loading = true;
    true
}

pub fn fetch_failed(state: &mut TradingState, message: String) -> bool {
    state.loading = false;
    state.error = Some(message);
    true
}

/// Replace every snapshot-backed collection.
///
/// Open positions are unique by mint and never share an id with history;
/// inactive rows in the open list are moved to history. Entries equal to
/// the previous value for the same key keep their `Arc`. A market cap the
/// snapshot omits is carried over from the previous copy of the same
/// position.
pub fn snapshot_loaded(
    state: &mut TradingState,
    snapshot: DashboardSnapshot,
    ts: i64,
    config: &StoreConfig,
) -> bool {
    let DashboardSnapshot {
        config: trading_config,
        stats,
        wallets,
        positions,
        history,
        migrations,
        migration_stats,
        watchlist,
        watchlist_stats,
    } = snapshot;

    let mut history_ids = HashSet::new();
    let mut closed: Vec<Position> = Vec::with_capacity(history.len());
    for mut row in history {
        if history_ids.insert(row.id.clone()) {
            row.status = PositionStatus::Closed;
            closed.push(row);
        }
    }

    let mut demoted: Vec<Position> = Vec::new();
    let mut open: Vec<Position> = Vec::with_capacity(positions.len());
    let mut open_mints = HashSet::new();
    for row in positions {
        if history_ids.contains(&row.id) {
            continue;
        }
        if !row.status.is_active() {
            history_ids.insert(row.id.clone());
            demoted.push(row);
            continue;
        }
        if open_mints.insert(row.mint.clone()) {
            open.push(row);
        }
    }
    if !demoted.is_empty() {
        debug!(count = demoted.len(), "Moved inactive snapshot positions to history");
    }
    demoted.extend(closed);

    let (next_positions, next_history, next_watchlist, next_migrations) = {
        let prev_open: HashMap<&str, &Arc<Position>> = state
            .positions
            .iter()
            .map(|p| (p.mint.as_str(), p))
            .collect();
        let prev_history: HashMap<&str, &Arc<Position>> =
            state.history.iter().map(|p| (p.id.as_str(), p)).collect();
        let prev_watch: HashMap<&str, _> = state
            .watchlist
            .iter()
            .map(|t| (t.mint.as_str(), t))
            .collect();

        let positions: Vec<Arc<Position>> = open
            .into_iter()
            .map(|mut p| {
                let prev = prev_open.get(p.mint.as_str()).copied();
                if let Some(prev) = prev {
                    if p.market_cap.is_none() && prev.id == p.id {
                        p.market_cap = prev.market_cap;
                    }
                }
                reuse_or_wrap(prev, p)
            })
            .collect();
        let history: Vec<Arc<Position>> = demoted
            .into_iter()
            .take(config.history_cap)
            .map(|p| {
                let prev = prev_history.get(p.id.as_str()).copied();
                reuse_or_wrap(prev, p)
            })
            .collect();
        let watchlist: Vec<Arc<_>> = watchlist
            .into_iter()
            .map(|t| {
                let prev = prev_watch.get(t.mint.as_str()).copied();
                reuse_or_wrap(prev, t)
            })
            .collect();
        let migrations = merge_migrations(&state.migrations, migrations, config.migration_limit);
        (positions, history, watchlist, migrations)
    };

    state.positions = next_positions;
    state.history = next_history;
    state.watchlist = next_watchlist;
    state.migrations = next_migrations;
    state.config = trading_config;
    state.stats = stats;
    state.wallets = wallets;
    state.migration_stats = migration_stats;
    state.watchlist_stats = watchlist_stats;
    state.loading = false;
    state.error = None;
    state.last_updated = Some(ts);
    true
}

pub fn connection_changed(
    state: &mut TradingState,
    channel: Channel,
    status: ConnectionStatus,
) -> bool {
    let slot = match channel {
        Channel::Trading => &mut state.connection,
        Channel::Reasoning => &mut state.reasoning_connection,
    };
    if *slot == status {
        return false;
    }
    *slot = status;
    true
}

pub fn connected(state: &mut TradingState, client_id: Option<String>) -> bool {
    match client_id {
        Some(id) if state.client_id.as_deref() != Some(id.as_str()) => {
            state.client_id = Some(id);
            true
        }
        _ => false,
    }
}

/// Overlay the counters present in the event.
pub fn stats_update(state: &mut TradingState, update: WireTradingStats) -> bool {
    let mut stats = state.stats.clone();
    update.apply_to(&mut stats);
    if stats == state.stats {
        return false;
    }
    state.stats = stats;
    true
}

pub fn set_trading_enabled(state: &mut TradingState, enabled: bool) -> bool {
    if state.config.trading_enabled == enabled {
        return false;
    }
    state.config.trading_enabled = enabled;
    true
}

pub fn config_replaced(state: &mut TradingState, config: TradingConfig) -> bool {
    if state.config == config {
        return false;
    }
    state.config = config;
    true
}

/// Replace the wallet with the same address. Unknown addresses are ignored.
pub fn wallet_replaced(state: &mut TradingState, wallet: TrackedWallet) -> bool {
    match state.wallets.iter_mut().find(|w| w.address == wallet.address) {
        Some(slot) if *slot != wallet => {
            *slot = wallet;
            true
        }
        _ => false,
    }
}
