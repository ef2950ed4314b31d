//! Activity feed: one human-readable line per notable event.

use std::sync::Arc;

use pulse_core::{ActivityColor, ActivityItem, EventType};
use rust_decimal::Decimal;
use serde_json::Value;

use crate::event::PushEvent;
use crate::state::TradingState;

/// Events logged even when they do not change any collection.
pub fn is_notification(event_type: EventType) -> bool {
    matches!(
        event_type,
        EventType::AiReasoning
            | EventType::NoMarketData
            | EventType::WalletSignal
            | EventType::SignalDetected
            | EventType::WalletBuyDetected
    )
}

/// Build the activity entry for `event`, using the state before the event
/// for symbol lookup. Returns `None` for events that are not logged.
pub fn describe(
    state: &TradingState,
    event: &PushEvent,
    raw: Value,
    ts: i64,
) -> Option<ActivityItem> {
    let (message, color) = match event {
        PushEvent::MigrationDetected(p) => (
            format!(
                "New migration detected: {}",
                symbol(state, &p.mint, p.symbol.as_deref())
            ),
            ActivityColor::Blue,
        ),
        PushEvent::AiReasoning(p) => {
            let sym = symbol(state, &p.mint, None);
            let message = match p.confidence {
                Some(confidence) => format!(
                    "AI {} on {sym} ({:.0}%)",
                    p.decision.to_ascii_uppercase(),
                    percent(confidence)
                ),
                None => format!("AI {} on {sym}", p.decision.to_ascii_uppercase()),
            };
            (message, ActivityColor::Purple)
        }
        PushEvent::NoMarketData(p) => (
            format!("No market data for {}", symbol(state, &p.mint, None)),
            ActivityColor::Gray,
        ),
        PushEvent::WalletSignal(p) => {
            let action = p.action.as_deref().unwrap_or("buy");
            let amount = p
                .amount_sol
                .map(|a| format!(" {} SOL of", a.normalize()))
                .unwrap_or_default();
            (
                format!(
                    "Wallet {} {action}{amount} {}",
                    short(&p.wallet),
                    symbol(state, &p.mint, None)
                ),
                ActivityColor::Yellow,
            )
        }
        PushEvent::SignalDetected(p) => (
            format!(
                "Signal detected on {} ({})",
                symbol(state, &p.mint, None),
                p.source
            ),
            ActivityColor::Blue,
        ),
        PushEvent::WalletBuyDetected(p) => (
            format!(
                "Tracked wallet {} bought {}",
                short(&p.wallet),
                symbol(state, &p.mint, None)
            ),
            ActivityColor::Yellow,
        ),
        PushEvent::PositionOpened(p) => (
            format!(
                "Opened position in {}",
                symbol(state, &p.mint, Some(p.symbol.as_str()))
            ),
            ActivityColor::Green,
        ),
        PushEvent::TakeProfitTriggered(p) => {
            let sym = symbol(state, &p.mint, None);
            let message = match p.target_multiplier {
                Some(x) => format!("Take profit hit on {sym} ({x}x)"),
                None => format!("Take profit hit on {sym}"),
            };
            (message, ActivityColor::Green)
        }
        PushEvent::PositionClosed(p) => {
            let pnl = p
                .total_pnl_sol
                .or_else(|| state.position(&p.mint).map(|pos| pos.total_pnl_sol()))
                .unwrap_or(Decimal::ZERO);
            let color = if pnl.is_sign_negative() && !pnl.is_zero() {
                ActivityColor::Red
            } else {
                ActivityColor::Green
            };
            let sign = if color == ActivityColor::Green { "+" } else { "" };
            let reason = p.reason.as_deref().unwrap_or("closed");
            (
                format!(
                    "Closed {}: {sign}{} SOL ({reason})",
                    symbol(state, &p.mint, p.symbol.as_deref()),
                    pnl.round_dp(4).normalize()
                ),
                color,
            )
        }
        PushEvent::StopLossTriggered(p) => (
            format!("Stop loss triggered on {}", symbol(state, &p.mint, None)),
            ActivityColor::Red,
        ),
        PushEvent::MigrationExpired(p) => (
            format!("Migration expired: {}", symbol(state, &p.mint, None)),
            ActivityColor::Gray,
        ),
        PushEvent::WatchlistAdded(t) => (
            format!("Watching {}", symbol(state, &t.mint, Some(t.symbol.as_str()))),
            ActivityColor::Gray,
        ),
        PushEvent::WatchlistRemoved(p) => (
            format!("Removed {} from watchlist", symbol(state, &p.mint, None)),
            ActivityColor::Gray,
        ),
        PushEvent::WatchlistGraduated(p) => (
            format!("{} graduated from watchlist", symbol(state, &p.mint, None)),
            ActivityColor::Green,
        ),
        PushEvent::Connected { .. }
        | PushEvent::MarketDataUpdated(_)
        | PushEvent::PriceUpdate(_)
        | PushEvent::HistoryUpdated(_)
        | PushEvent::HoldingsSnapshot(_)
        | PushEvent::FeedUpdate { .. }
        | PushEvent::StatsUpdate(_)
        | PushEvent::WatchlistUpdated(_) => return None,
    };

    Some(ActivityItem::new(
        event.event_type().as_str(),
        message,
        color,
        ts,
        raw,
    ))
}

/// Prepend and keep the newest `cap` entries.
pub fn record(state: &mut TradingState, item: ActivityItem, cap: usize) {
    state.activity.insert(0, Arc::new(item));
    state.activity.truncate(cap);
}

fn symbol(state: &TradingState, mint: &str, payload: Option<&str>) -> String {
    state
        .symbol_for(mint)
        .or(payload.filter(|s| !s.is_empty()))
        .map(str::to_string)
        .unwrap_or_else(|| short(mint))
}

/// Confidence arrives as [0, 1] or [0, 100].
fn percent(confidence: f64) -> f64 {
    if confidence <= 1.0 {
        confidence * 100.0
    } else {
        confidence
    }
}

/// `7xKXtg2C..W5JgAsU` style abbreviation for addresses.
fn short(address: &str) -> String {
    let chars: Vec<char> = address.chars().collect();
    if chars.len() <= 10 {
        return address.to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}..{tail}")
}
