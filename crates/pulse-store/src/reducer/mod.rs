//! Pure state transitions.
//!
//! [`reduce`] maps `(state, event)` to the next state plus any side-effect
//! intents. Each event kind has its own reducer function in a submodule; all
//! of them mutate a private copy of the state and report whether anything
//! changed. Nothing here performs I/O or reads the clock.

pub mod account;
pub mod activity;
pub mod migrations;
pub mod positions;
pub mod watchlist;

use std::sync::Arc;

use crate::config::StoreConfig;
use crate::event::{PushEvent, StoreEvent};
use crate::intent::Intent;
use crate::state::TradingState;

/// Result of one reduction.
#[derive(Debug, Clone)]
pub struct Reduction {
    pub state: TradingState,
    /// Side effects to run after the state is published.
    pub intents: Vec<Intent>,
    /// Whether `state` differs from the input.
    pub changed: bool,
}

/// Apply one event to `state`.
pub fn reduce(state: &TradingState, event: StoreEvent, config: &StoreConfig) -> Reduction {
    let mut next = state.clone();
    let mut intents = Vec::new();

    let changed = match event {
        StoreEvent::FetchStarted => account::fetch_started(&mut next),
        StoreEvent::SnapshotLoaded {
            snapshot,
            timestamp,
        } => account::snapshot_loaded(&mut next, *snapshot, timestamp, config),
        StoreEvent::FetchFailed { message } => account::fetch_failed(&mut next, message),
        StoreEvent::ConnectionChanged { channel, status } => {
            account::connection_changed(&mut next, channel, status)
        }
        StoreEvent::Push {
            event,
            timestamp,
            raw,
        } => {
            let entry = activity::describe(state, &event, raw, timestamp);
            let always_logged = activity::is_notification(event.event_type());
            let changed = apply_push(&mut next, event, timestamp, config, &mut intents);
            match entry {
                Some(item) if changed || always_logged => {
                    activity::record(&mut next, item, config.activity_cap);
                    true
                }
                _ => changed,
            }
        }
        StoreEvent::SetTradingEnabled(enabled) => account::set_trading_enabled(&mut next, enabled),
        StoreEvent::ConfigReplaced(trading) => account::config_replaced(&mut next, trading),
        StoreEvent::ClosePositionLocally { id, timestamp } => {
            positions::close_locally(&mut next, &id, timestamp, config.history_cap)
        }
        StoreEvent::WalletReplaced(wallet) => account::wallet_replaced(&mut next, wallet),
    };

    if changed {
        next.version = state.version.wrapping_add(1);
    }

    Reduction {
        state: next,
        intents,
        changed,
    }
}

fn apply_push(
    state: &mut TradingState,
    event: PushEvent,
    ts: i64,
    config: &StoreConfig,
    intents: &mut Vec<Intent>,
) -> bool {
    match event {
        PushEvent::Connected { client_id } => account::connected(state, client_id),

        PushEvent::MigrationDetected(p) => {
            migrations::migration_detected(state, &p, ts, config.migration_limit)
        }
        PushEvent::MarketDataUpdated(p) => migrations::market_data_updated(state, &p, ts),
        PushEvent::AiReasoning(p) => migrations::ai_reasoning(state, &p, ts),
        PushEvent::NoMarketData(p) => migrations::no_market_data(state, &p, ts),
        PushEvent::WalletSignal(p) => migrations::wallet_signal(state, &p, ts),
        PushEvent::SignalDetected(p) => migrations::signal_detected(state, &p, ts),
        PushEvent::WalletBuyDetected(p) => {
            let (changed, intent) = migrations::wallet_buy_detected(state, &p, ts, config);
            intents.extend(intent);
            changed
        }
        PushEvent::MigrationExpired(p) => migrations::migration_expired(state, &p),
        PushEvent::FeedUpdate {
            migrations: rows,
            stats,
        } => migrations::feed_update(state, rows, stats, config.migration_limit),

        PushEvent::PositionOpened(p) => positions::position_opened(state, *p, ts),
        PushEvent::PriceUpdate(p) => positions::price_update(state, &p, ts),
        PushEvent::TakeProfitTriggered(p) => positions::take_profit(state, &p, ts),
        PushEvent::PositionClosed(p) => {
            positions::position_closed(state, &p, ts, config.history_cap)
        }
        PushEvent::StopLossTriggered(p) => positions::stop_loss(state, &p, ts, config.history_cap),
        PushEvent::HistoryUpdated(rows) => {
            positions::history_updated(state, rows, ts, config.history_cap)
        }
        PushEvent::HoldingsSnapshot(rows) => positions::holdings_snapshot(state, &rows, ts),

        PushEvent::StatsUpdate(stats) => account::stats_update(state, stats),

        PushEvent::WatchlistAdded(token) => watchlist::added(state, *token, ts),
        PushEvent::WatchlistUpdated(p) => watchlist::updated(state, &p, ts),
        PushEvent::WatchlistRemoved(p) => watchlist::removed(state, &p.mint),
        PushEvent::WatchlistGraduated(p) => watchlist::graduated(state, &p.mint),
    }
}

/// Patch the first entry matching `matches`, replacing only that entry's
/// `Arc`. Returns `false` (and leaves the slot untouched) when nothing
/// matched or the patch was a no-op.
pub(crate) fn patch_entry<T, M, P>(items: &mut [Arc<T>], matches: M, patch: P) -> bool
where
    T: Clone + PartialEq,
    M: Fn(&T) -> bool,
    P: FnOnce(&mut T),
{
    let Some(index) = items.iter().position(|item| matches(item)) else {
        return false;
    };
    let mut next = T::clone(&items[index]);
    patch(&mut next);
    if next == *items[index] {
        return false;
    }
    items[index] = Arc::new(next);
    true
}

/// Reuse `previous` when the new value is equal to it.
pub(crate) fn reuse_or_wrap<T: PartialEq>(previous: Option<&Arc<T>>, value: T) -> Arc<T> {
    match previous {
        Some(prev) if **prev == value => Arc::clone(prev),
        _ => Arc::new(value),
    }
}
