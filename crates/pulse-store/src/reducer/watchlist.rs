//! Watchlist reducers.

use std::sync::Arc;

use pulse_core::{Evaluation, WatchlistToken};

use super::patch_entry;
use crate::event::WatchlistPatch;
use crate::state::TradingState;

/// Idempotent prepend.
pub fn added(state: &mut TradingState, mut token: WatchlistToken, ts: i64) -> bool {
    if state.watch_token(&token.mint).is_some() {
        return false;
    }
    if token.added_at == 0 {
        token.added_at = ts;
    }
    if token.last_checked_at == 0 {
        token.last_checked_at = token.added_at;
    }
    state.watchlist.insert(0, Arc::new(token));
    state.watchlist_stats.total_watching = state.watchlist.len() as u64;
    true
}

/// Surgical patch from a periodic re-check.
pub fn updated(state: &mut TradingState, patch: &WatchlistPatch, ts: i64) -> bool {
    patch_entry(
        &mut state.watchlist,
        |t| t.mint == patch.mint,
        |t| {
            t.check_count = patch
                .check_count
                .unwrap_or_else(|| t.check_count.saturating_add(1));
            t.last_checked_at = ts;
            if let Some(metrics) = &patch.metrics {
                metrics.clone().apply_to(&mut t.metrics);
            }
            if let Some(reasons) = &patch.watch_reasons {
                t.watch_reasons.clone_from(reasons);
            }

            let evaluated =
                patch.passed.is_some() || patch.improving.is_some() || patch.failed_checks.is_some();
            if evaluated {
                let previous = t.last_evaluation.take().unwrap_or_default();
                t.last_evaluation = Some(Evaluation {
                    passed: patch.passed.unwrap_or(previous.passed),
                    failed_checks: patch
                        .failed_checks
                        .clone()
                        .unwrap_or(previous.failed_checks),
                    improving: patch.improving.unwrap_or(previous.improving),
                    checked_at: ts,
                });
            }
        },
    )
}

pub fn removed(state: &mut TradingState, mint: &str) -> bool {
    if !remove(state, mint) {
        return false;
    }
    state.watchlist_stats.removed = state.watchlist_stats.removed.saturating_add(1);
    true
}

/// The token met entry criteria and left the watchlist.
pub fn graduated(state: &mut TradingState, mint: &str) -> bool {
    if !remove(state, mint) {
        return false;
    }
    state.watchlist_stats.graduated = state.watchlist_stats.graduated.saturating_add(1);
    true
}

fn remove(state: &mut TradingState, mint: &str) -> bool {
    let before = state.watchlist.len();
    state.watchlist.retain(|t| t.mint != mint);
    if state.watchlist.len() == before {
        return false;
    }
    state.watchlist_stats.total_watching = state.watchlist.len() as u64;
    true
}
