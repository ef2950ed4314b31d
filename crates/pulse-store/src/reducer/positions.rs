//! Position reducers: the open collection, closed history, and the moves
//! between them.
//!
//! Open positions are keyed by mint, history by position id. Every close
//! path goes through [`relocate`], which removes the open entry and ensures a
//! history entry in the same transition.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use pulse_core::{Position, PositionStatus};
use tracing::{debug, warn};

use super::patch_entry;
use crate::event::{HoldingRow, PositionClosed, PriceUpdate, StopLoss, TakeProfit};
use crate::state::TradingState;

/// Exit reason for stop-loss closes.
pub const STOP_LOSS_EXIT_REASON: &str = "stop_loss";
/// Exit reason for user-initiated closes.
pub const MANUAL_EXIT_REASON: &str = "manual";

pub fn position_opened(state: &mut TradingState, mut position: Position, ts: i64) -> bool {
    if state.position(&position.mint).is_some() || state.history_entry(&position.id).is_some() {
        debug!(mint = %position.mint, id = %position.id, "Duplicate position_opened ignored");
        return false;
    }

    if !position.status.is_active() {
        position.status = PositionStatus::Open;
    }
    if position.created_at == 0 {
        position.created_at = ts;
    }
    if position.updated_at == 0 {
        position.updated_at = position.created_at;
    }
    position.closed_at = None;

    state.positions.insert(0, Arc::new(position));
    true
}

/// Surgical patch of one open position. Unknown mints are ignored, as are
/// prices whose PnL ratio overflows.
pub fn price_update(state: &mut TradingState, update: &PriceUpdate, ts: i64) -> bool {
    patch_entry(
        &mut state.positions,
        |p| p.mint == update.mint,
        |p| {
            if !p.mark(update.price, ts) {
                warn!(
                    mint = %update.mint,
                    price = %update.price,
                    "Price update overflows PnL, ignored"
                );
                return;
            }
            if let Some(pct) = update.pnl_percent {
                p.pnl_percent = pct;
                p.peak_pnl_percent = p.peak_pnl_percent.max(pct);
            }
            if let Some(v) = update.unrealized_pnl_sol {
                p.unrealized_pnl_sol = v;
            }
            if let Some(v) = update.market_cap {
                p.market_cap = Some(v);
            }
        },
    )
}

/// Partial exit. The position stays open.
pub fn take_profit(state: &mut TradingState, tp: &TakeProfit, ts: i64) -> bool {
    patch_entry(
        &mut state.positions,
        |p| p.mint == tp.mint,
        |p| {
            // Redelivery of the last partial exit.
            let redelivered = p.target1_hit
                && !tp.is_final
                && tp.remaining.is_some_and(|r| r == p.remaining_tokens);
            if redelivered {
                return;
            }

            if let Some(realized) = tp.realized {
                let Some(total) = p.realized_pnl_sol.checked_add(realized) else {
                    warn!(
                        mint = %tp.mint,
                        %realized,
                        "Realized PnL overflows, take profit ignored"
                    );
                    return;
                };
                p.realized_pnl_sol = total;
            }
            if let Some(remaining) = tp.remaining {
                p.remaining_tokens = remaining;
            }
            if tp.is_final || p.target1_hit {
                p.target2_hit = true;
            }
            p.target1_hit = true;
            p.status = PositionStatus::PartiallyClosed;
            p.updated_at = ts;
        },
    )
}

pub fn position_closed(
    state: &mut TradingState,
    event: &PositionClosed,
    ts: i64,
    history_cap: usize,
) -> bool {
    relocate(
        state,
        &event.mint,
        event.id.as_deref(),
        ts,
        history_cap,
        |p| {
            if p.symbol.is_empty() {
                if let Some(symbol) = &event.symbol {
                    p.symbol.clone_from(symbol);
                }
            }
            if let Some(price) = event.exit_price {
                if !p.mark(price, ts) {
                    debug!(mint = %event.mint, %price, "Exit price overflows PnL, keeping last mark");
                }
            }
            p.realized_pnl_sol = event.total_pnl_sol.unwrap_or_else(|| p.total_pnl_sol());
            let reason = event.reason.clone().unwrap_or_else(|| "closed".to_string());
            p.close(Some(reason), ts);
        },
    )
}

pub fn stop_loss(state: &mut TradingState, event: &StopLoss, ts: i64, history_cap: usize) -> bool {
    relocate(state, &event.mint, None, ts, history_cap, |p| {
        p.stop_loss_hit = true;
        if let Some(price) = event.price {
            if !p.mark(price, ts) {
                debug!(mint = %event.mint, %price, "Stop price overflows PnL, keeping last mark");
            }
        }
        p.realized_pnl_sol = event.pnl_sol.unwrap_or_else(|| p.total_pnl_sol());
        p.close(Some(STOP_LOSS_EXIT_REASON.to_string()), ts);
    })
}

/// Optimistic close of an open position by id.
pub fn close_locally(state: &mut TradingState, id: &str, ts: i64, history_cap: usize) -> bool {
    let Some(index) = state.positions.iter().position(|p| p.id == id) else {
        return false;
    };
    let mut closed = Position::clone(&state.positions.remove(index));
    closed.realized_pnl_sol = closed.total_pnl_sol();
    closed.close(Some(MANUAL_EXIT_REASON.to_string()), ts);
    push_history(state, closed, history_cap);
    true
}

/// Authoritative closed positions, most recent first.
///
/// Each row evicts the open entry with the same id, or the open entry for the
/// same mint created no later than the close. Rows already in history are
/// replaced in place.
pub fn history_updated(
    state: &mut TradingState,
    rows: Vec<Position>,
    ts: i64,
    history_cap: usize,
) -> bool {
    let mut changed = false;

    for mut row in rows.into_iter().rev() {
        row.status = PositionStatus::Closed;
        let closed_at = *row.closed_at.get_or_insert(ts);

        let before = state.positions.len();
        state.positions.retain(|open| {
            let same_trade =
                open.id == row.id || (open.mint == row.mint && open.created_at <= closed_at);
            !same_trade
        });
        changed |= state.positions.len() != before;

        match state.history.iter().position(|h| h.id == row.id) {
            Some(index) => {
                if *state.history[index] != row {
                    state.history[index] = Arc::new(row);
                    changed = true;
                }
            }
            None => {
                state.history.insert(0, Arc::new(row));
                changed = true;
            }
        }
    }

    state.history.truncate(history_cap);
    changed
}

/// Periodic full holdings snapshot.
///
/// Rows are authoritative for the fields they carry; absent fields keep the
/// previous value for the same mint. Existing mints keep their relative
/// order and new mints are appended. The list is re-sorted by PnL only when
/// membership changes.
///
/// A snapshot never closes anything: an open position missing from it stays
/// open until a close event or `history_updated` moves it. Rows for trades
/// already in history are not reopened.
pub fn holdings_snapshot(state: &mut TradingState, rows: &[HoldingRow], ts: i64) -> bool {
    let mut seen = HashSet::new();
    let rows: Vec<&HoldingRow> = rows
        .iter()
        .filter(|row| seen.insert(row.mint.as_str()))
        .collect();
    let by_mint: HashMap<&str, &HoldingRow> =
        rows.iter().map(|row| (row.mint.as_str(), *row)).collect();

    let mut changed = false;
    let mut next: Vec<Arc<Position>> = Vec::with_capacity(state.positions.len() + rows.len());

    for existing in &state.positions {
        let Some(row) = by_mint.get(existing.mint.as_str()) else {
            next.push(Arc::clone(existing));
            continue;
        };
        let mut merged = Position::clone(existing);
        row.apply_to(&mut merged);
        if merged == **existing {
            next.push(Arc::clone(existing));
        } else {
            merged.updated_at = ts;
            next.push(Arc::new(merged));
            changed = true;
        }
    }

    let mut membership_changed = false;
    for row in &rows {
        if state.position(&row.mint).is_some() {
            continue;
        }
        let already_closed = match &row.id {
            Some(id) => state.history_entry(id).is_some(),
            None => state.has_history_for(&row.mint),
        };
        if already_closed {
            debug!(mint = %row.mint, "Snapshot row for closed trade ignored");
            continue;
        }
        let id = row.id.clone().unwrap_or_else(|| row.mint.clone());
        let mut position = Position::opened(id, row.mint.clone(), ts);
        row.apply_to(&mut position);
        next.push(Arc::new(position));
        membership_changed = true;
    }

    if membership_changed {
        next.sort_by(|a, b| b.pnl_percent.total_cmp(&a.pnl_percent));
    }
    state.positions = next;

    changed || membership_changed
}

/// Move the open position for `mint` to history.
///
/// When nothing is open for `mint` and history has no matching entry (by
/// `id_hint`, or by mint without a hint), a closed entry is created from the
/// event alone so the close is never lost.
fn relocate<F>(
    state: &mut TradingState,
    mint: &str,
    id_hint: Option<&str>,
    ts: i64,
    history_cap: usize,
    finalize: F,
) -> bool
where
    F: FnOnce(&mut Position),
{
    if let Some(index) = state.positions.iter().position(|p| p.mint == mint) {
        let mut closed = Position::clone(&state.positions.remove(index));
        finalize(&mut closed);
        push_history(state, closed, history_cap);
        return true;
    }

    let already_closed = match id_hint {
        Some(id) => state.history_entry(id).is_some(),
        None => state.has_history_for(mint),
    };
    if already_closed {
        return false;
    }

    debug!(mint, "Close for unknown position, recording history entry");
    let mut stub = Position::opened(id_hint.unwrap_or(mint), mint, ts);
    finalize(&mut stub);
    push_history(state, stub, history_cap);
    true
}

fn push_history(state: &mut TradingState, position: Position, history_cap: usize) {
    if state.history_entry(&position.id).is_none() {
        state.history.insert(0, Arc::new(position));
        state.history.truncate(history_cap);
    }
}
