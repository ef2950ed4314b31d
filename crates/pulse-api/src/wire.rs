//! Backend wire format and its mapping into the canonical model.
//!
//! The backend speaks snake_case JSON with loose typing: numbers may arrive as
//! strings, timestamps as Unix milliseconds or RFC 3339 strings, and any
//! optional field may be `null` or missing. Every wire struct here accepts
//! that and maps into `pulse_core` types with zero/empty defaults, so no
//! `null` ever reaches arithmetic.

use std::collections::BTreeMap;

use chrono::DateTime;
use pulse_core::{
    AiDecision, Decision, Evaluation, MarketSnapshot, MigrationStats, Position, PositionStatus,
    RankedMigration, TrackedWallet, TradingConfig, TradingStats, Transaction, TransactionPage,
    WalletSignal, WatchlistMetrics, WatchlistReasoning, WatchlistStats, WatchlistToken,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};
use tracing::warn;

// ============================================================================
// Lenient scalar decoding
// ============================================================================

#[derive(Deserialize)]
#[serde(untagged)]
enum RawScalar {
    Int(i64),
    UInt(u64),
    Float(f64),
    Bool(bool),
    Text(String),
}

/// Timestamp as Unix ms, numeric string, or RFC 3339.
pub fn opt_timestamp<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<RawScalar>::deserialize(deserializer)? {
        Some(RawScalar::Int(v)) => Some(v),
        Some(RawScalar::UInt(v)) => i64::try_from(v).ok(),
        Some(RawScalar::Float(v)) => Some(v as i64),
        Some(RawScalar::Text(s)) => parse_timestamp(&s),
        Some(RawScalar::Bool(_)) | None => None,
    })
}

/// Float as number or numeric string.
pub fn opt_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<RawScalar>::deserialize(deserializer)? {
        Some(RawScalar::Int(v)) => Some(v as f64),
        Some(RawScalar::UInt(v)) => Some(v as f64),
        Some(RawScalar::Float(v)) => Some(v),
        Some(RawScalar::Text(s)) => s.trim().parse().ok(),
        Some(RawScalar::Bool(_)) | None => None,
    })
}

/// Identifier as string or number.
pub fn opt_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<RawScalar>::deserialize(deserializer)? {
        Some(RawScalar::Int(v)) => Some(v.to_string()),
        Some(RawScalar::UInt(v)) => Some(v.to_string()),
        Some(RawScalar::Float(v)) => Some(v.to_string()),
        Some(RawScalar::Text(s)) if !s.is_empty() => Some(s),
        _ => None,
    })
}

fn parse_timestamp(s: &str) -> Option<i64> {
    let s = s.trim();
    if let Ok(ms) = s.parse::<i64>() {
        return Some(ms);
    }
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.timestamp_millis())
        .ok()
}

/// Normalize any backend status spelling; unknown spellings fall back to OPEN.
pub fn parse_status(raw: &str) -> PositionStatus {
    raw.parse().unwrap_or_else(|_| {
        warn!(status = raw, "Unknown position status, treating as OPEN");
        PositionStatus::Open
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

// ============================================================================
// Envelope
// ============================================================================

/// REST response envelope: `{ success, data, error? }`.
#[derive(Debug, Deserialize)]
pub struct ApiEnvelope<T> {
    #[serde(default)]
    pub success: bool,
    pub data: Option<T>,
    #[serde(default)]
    pub error: Option<String>,
}

// ============================================================================
// Positions
// ============================================================================

/// Position as sent by REST endpoints and push events.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WirePosition {
    #[serde(deserialize_with = "opt_id")]
    pub id: Option<String>,
    pub mint: Option<String>,
    pub symbol: Option<String>,
    pub status: Option<String>,
    pub entry_price: Option<Decimal>,
    pub entry_amount_sol: Option<Decimal>,
    #[serde(alias = "token_amount")]
    pub entry_token_amount: Option<Decimal>,
    pub entry_signature: Option<String>,
    pub target1_price: Option<Decimal>,
    pub target1_hit: Option<bool>,
    pub target2_price: Option<Decimal>,
    pub target2_hit: Option<bool>,
    pub stop_loss_price: Option<Decimal>,
    pub stop_loss_hit: Option<bool>,
    pub current_price: Option<Decimal>,
    pub remaining_tokens: Option<Decimal>,
    pub realized_pnl_sol: Option<Decimal>,
    pub unrealized_pnl_sol: Option<Decimal>,
    #[serde(deserialize_with = "opt_f64")]
    pub pnl_percent: Option<f64>,
    #[serde(deserialize_with = "opt_f64")]
    pub peak_pnl_percent: Option<f64>,
    pub market_cap: Option<Decimal>,
    pub exit_reason: Option<String>,
    #[serde(deserialize_with = "opt_timestamp")]
    pub created_at: Option<i64>,
    #[serde(deserialize_with = "opt_timestamp")]
    pub updated_at: Option<i64>,
    #[serde(deserialize_with = "opt_timestamp")]
    pub closed_at: Option<i64>,
}

impl WirePosition {
    /// Map into a `Position`. Returns `None` when the mint is missing.
    ///
    /// A missing id falls back to the mint; a missing remaining quantity
    /// falls back to the entry quantity.
    pub fn into_position(self) -> Option<Position> {
        let mint = non_empty(self.mint)?;
        let id = self.id.unwrap_or_else(|| mint.clone());
        let created_at = self.created_at.unwrap_or_default();
        let entry_token_amount = self.entry_token_amount.unwrap_or_default();
        let status = self
            .status
            .as_deref()
            .map(parse_status)
            .unwrap_or_default();

        Some(Position {
            id,
            symbol: self.symbol.unwrap_or_default(),
            status,
            entry_price: self.entry_price.unwrap_or_default(),
            entry_amount_sol: self.entry_amount_sol.unwrap_or_default(),
            entry_token_amount,
            entry_signature: non_empty(self.entry_signature),
            target1_price: self.target1_price.unwrap_or_default(),
            target1_hit: self.target1_hit.unwrap_or_default(),
            target2_price: self.target2_price.unwrap_or_default(),
            target2_hit: self.target2_hit.unwrap_or_default(),
            stop_loss_price: self.stop_loss_price.unwrap_or_default(),
            stop_loss_hit: self.stop_loss_hit.unwrap_or_default(),
            current_price: self
                .current_price
                .or(self.entry_price)
                .unwrap_or_default(),
            remaining_tokens: self.remaining_tokens.unwrap_or(entry_token_amount),
            realized_pnl_sol: self.realized_pnl_sol.unwrap_or_default(),
            unrealized_pnl_sol: self.unrealized_pnl_sol.unwrap_or_default(),
            pnl_percent: self.pnl_percent.unwrap_or_default(),
            peak_pnl_percent: self.peak_pnl_percent.unwrap_or_default(),
            market_cap: self.market_cap,
            exit_reason: non_empty(self.exit_reason),
            created_at,
            updated_at: self.updated_at.unwrap_or(created_at),
            closed_at: self.closed_at,
            mint,
        })
    }
}

// ============================================================================
// Migrations
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WireWalletSignal {
    pub wallet: Option<String>,
    pub action: Option<String>,
    pub amount_sol: Option<Decimal>,
    #[serde(deserialize_with = "opt_timestamp")]
    pub timestamp: Option<i64>,
}

impl WireWalletSignal {
    pub fn into_signal(self, fallback_ts: i64) -> WalletSignal {
        WalletSignal {
            wallet: self.wallet.unwrap_or_default(),
            action: self.action.unwrap_or_else(|| "buy".to_string()),
            amount_sol: self.amount_sol.unwrap_or_default(),
            timestamp: self.timestamp.unwrap_or(fallback_ts),
        }
    }
}

/// Ranked migration as sent by the feed endpoints and `feed_update`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WireMigration {
    pub mint: Option<String>,
    pub symbol: Option<String>,
    pub name: Option<String>,
    pub image_url: Option<String>,
    #[serde(deserialize_with = "opt_timestamp")]
    pub detected_at: Option<i64>,
    #[serde(deserialize_with = "opt_timestamp")]
    pub updated_at: Option<i64>,

    pub price: Option<Decimal>,
    pub market_cap: Option<Decimal>,
    pub liquidity: Option<Decimal>,
    pub volume_24h: Option<Decimal>,
    #[serde(deserialize_with = "opt_f64")]
    pub price_change_1h: Option<f64>,
    pub market_data_unavailable: Option<bool>,

    pub ai_decision: Option<String>,
    #[serde(deserialize_with = "opt_f64")]
    pub ai_confidence: Option<f64>,
    pub ai_reasoning: Option<String>,
    #[serde(deserialize_with = "opt_timestamp")]
    pub ai_decided_at: Option<i64>,

    pub wallet_signal_count: Option<u32>,
    pub recent_signals: Vec<WireWalletSignal>,

    #[serde(deserialize_with = "opt_f64")]
    pub score: Option<f64>,
    pub score_breakdown: Option<BTreeMap<String, f64>>,
    pub ready_to_trade: Option<bool>,
    pub signal_source: Option<String>,
    pub has_wallet_confirmation: Option<bool>,
}

impl WireMigration {
    /// Map into a `RankedMigration`. Returns `None` when the mint is missing.
    pub fn into_migration(self) -> Option<RankedMigration> {
        let mint = non_empty(self.mint)?;
        let detected_at = self.detected_at.unwrap_or_default();
        let updated_at = self.updated_at.unwrap_or(detected_at);

        let ai = self.ai_decision.map(|decision| AiDecision {
            decision: Decision::from(decision),
            confidence: self.ai_confidence.unwrap_or_default(),
            reasoning: self.ai_reasoning.unwrap_or_default(),
            decided_at: self.ai_decided_at.unwrap_or(updated_at),
        });

        let mut recent_signals: Vec<WalletSignal> = self
            .recent_signals
            .into_iter()
            .map(|s| s.into_signal(updated_at))
            .collect();
        recent_signals.truncate(pulse_core::MAX_RECENT_SIGNALS);
        let wallet_signal_count = self
            .wallet_signal_count
            .unwrap_or(recent_signals.len() as u32);

        Some(RankedMigration {
            symbol: self.symbol.unwrap_or_default(),
            name: self.name.unwrap_or_default(),
            image_url: non_empty(self.image_url),
            detected_at,
            updated_at,
            market: MarketSnapshot {
                price: self.price.unwrap_or_default(),
                market_cap: self.market_cap.unwrap_or_default(),
                liquidity: self.liquidity.unwrap_or_default(),
                volume_24h: self.volume_24h.unwrap_or_default(),
                price_change_1h: self.price_change_1h.unwrap_or_default(),
            },
            market_data_unavailable: self.market_data_unavailable.unwrap_or_default(),
            ai,
            wallet_signal_count,
            has_wallet_confirmation: self
                .has_wallet_confirmation
                .unwrap_or(wallet_signal_count > 0),
            recent_signals,
            score: self.score.unwrap_or_default(),
            score_breakdown: self.score_breakdown.unwrap_or_default(),
            ready_to_trade: self.ready_to_trade.unwrap_or_default(),
            signal_source: non_empty(self.signal_source),
            reanalysis_requested: false,
            mint,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WireMigrationStats {
    pub total_detected: Option<u64>,
    pub active: Option<u64>,
    pub ready_to_trade: Option<u64>,
    pub expired: Option<u64>,
}

impl From<WireMigrationStats> for MigrationStats {
    fn from(w: WireMigrationStats) -> Self {
        Self {
            total_detected: w.total_detected.unwrap_or_default(),
            active: w.active.unwrap_or_default(),
            ready_to_trade: w.ready_to_trade.unwrap_or_default(),
            expired: w.expired.unwrap_or_default(),
        }
    }
}

// ============================================================================
// Watchlist
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WireWatchlistMetrics {
    pub liquidity: Option<Decimal>,
    pub volume: Option<Decimal>,
    pub market_cap: Option<Decimal>,
    pub holder_count: Option<u64>,
    pub price: Option<Decimal>,
}

impl WireWatchlistMetrics {
    /// Overlay present fields onto `base`.
    pub fn apply_to(self, base: &mut WatchlistMetrics) {
        if let Some(v) = self.liquidity {
            base.liquidity = v;
        }
        if let Some(v) = self.volume {
            base.volume = v;
        }
        if let Some(v) = self.market_cap {
            base.market_cap = v;
        }
        if let Some(v) = self.holder_count {
            base.holder_count = v;
        }
        if let Some(v) = self.price {
            base.price = v;
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WireEvaluation {
    pub passed: Option<bool>,
    pub failed_checks: Vec<String>,
    pub improving: Option<bool>,
    #[serde(deserialize_with = "opt_timestamp")]
    pub checked_at: Option<i64>,
}

impl WireEvaluation {
    pub fn into_evaluation(self) -> Evaluation {
        Evaluation {
            passed: self.passed.unwrap_or_default(),
            failed_checks: self.failed_checks,
            improving: self.improving.unwrap_or_default(),
            checked_at: self.checked_at.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WireWatchlistToken {
    pub mint: Option<String>,
    pub symbol: Option<String>,
    pub name: Option<String>,
    #[serde(deserialize_with = "opt_timestamp")]
    pub added_at: Option<i64>,
    #[serde(deserialize_with = "opt_timestamp")]
    pub last_checked_at: Option<i64>,
    pub check_count: Option<u32>,
    pub watch_reasons: Vec<String>,
    pub metrics: Option<WireWatchlistMetrics>,
    pub last_evaluation: Option<WireEvaluation>,
}

impl WireWatchlistToken {
    /// Map into a `WatchlistToken`. Returns `None` when the mint is missing.
    pub fn into_token(self) -> Option<WatchlistToken> {
        let mint = non_empty(self.mint)?;
        let added_at = self.added_at.unwrap_or_default();
        let mut metrics = WatchlistMetrics::default();
        if let Some(wire) = self.metrics {
            wire.apply_to(&mut metrics);
        }
        Some(WatchlistToken {
            symbol: self.symbol.unwrap_or_default(),
            name: self.name.unwrap_or_default(),
            added_at,
            last_checked_at: self.last_checked_at.unwrap_or(added_at),
            check_count: self.check_count.unwrap_or_default(),
            watch_reasons: self.watch_reasons,
            metrics,
            last_evaluation: self.last_evaluation.map(WireEvaluation::into_evaluation),
            mint,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WireWatchlistStats {
    pub total_watching: Option<u64>,
    pub graduated: Option<u64>,
    pub removed: Option<u64>,
}

impl From<WireWatchlistStats> for WatchlistStats {
    fn from(w: WireWatchlistStats) -> Self {
        Self {
            total_watching: w.total_watching.unwrap_or_default(),
            graduated: w.graduated.unwrap_or_default(),
            removed: w.removed.unwrap_or_default(),
        }
    }
}

/// `GET /api/watchlist` payload.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WireWatchlist {
    #[serde(alias = "watchlist")]
    pub tokens: Vec<WireWatchlistToken>,
    pub stats: Option<WireWatchlistStats>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WireWatchlistReasoning {
    pub mint: Option<String>,
    #[serde(alias = "reasoning")]
    pub summary: Option<String>,
    pub failed_checks: Vec<String>,
    pub improving: Option<bool>,
    #[serde(deserialize_with = "opt_timestamp")]
    pub generated_at: Option<i64>,
}

impl WireWatchlistReasoning {
    pub fn into_reasoning(self, mint: &str) -> WatchlistReasoning {
        WatchlistReasoning {
            mint: non_empty(self.mint).unwrap_or_else(|| mint.to_string()),
            summary: self.summary.unwrap_or_default(),
            failed_checks: self.failed_checks,
            improving: self.improving.unwrap_or_default(),
            generated_at: self.generated_at.unwrap_or_default(),
        }
    }
}

// ============================================================================
// Config, stats, wallets
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WireTradingConfig {
    pub trading_enabled: Option<bool>,
    pub max_position_sol: Option<Decimal>,
    #[serde(deserialize_with = "opt_f64")]
    pub take_profit_1_multiplier: Option<f64>,
    #[serde(deserialize_with = "opt_f64")]
    pub take_profit_2_multiplier: Option<f64>,
    #[serde(deserialize_with = "opt_f64")]
    pub stop_loss_percent: Option<f64>,
    pub reanalyze_on_wallet_buy: Option<bool>,
}

impl From<WireTradingConfig> for TradingConfig {
    fn from(w: WireTradingConfig) -> Self {
        Self {
            trading_enabled: w.trading_enabled.unwrap_or_default(),
            max_position_sol: w.max_position_sol.unwrap_or_default(),
            take_profit_1_multiplier: w.take_profit_1_multiplier.unwrap_or_default(),
            take_profit_2_multiplier: w.take_profit_2_multiplier.unwrap_or_default(),
            stop_loss_percent: w.stop_loss_percent.unwrap_or_default(),
            reanalyze_on_wallet_buy: w.reanalyze_on_wallet_buy.unwrap_or(true),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WireTradingStats {
    pub total_trades: Option<u64>,
    pub winning_trades: Option<u64>,
    pub losing_trades: Option<u64>,
    #[serde(deserialize_with = "opt_f64")]
    pub win_rate: Option<f64>,
    pub total_realized_pnl_sol: Option<Decimal>,
    pub total_unrealized_pnl_sol: Option<Decimal>,
    pub open_positions: Option<u64>,
}

impl From<WireTradingStats> for TradingStats {
    fn from(w: WireTradingStats) -> Self {
        Self {
            total_trades: w.total_trades.unwrap_or_default(),
            winning_trades: w.winning_trades.unwrap_or_default(),
            losing_trades: w.losing_trades.unwrap_or_default(),
            win_rate: w.win_rate.unwrap_or_default(),
            total_realized_pnl_sol: w.total_realized_pnl_sol.unwrap_or_default(),
            total_unrealized_pnl_sol: w.total_unrealized_pnl_sol.unwrap_or_default(),
            open_positions: w.open_positions.unwrap_or_default(),
        }
    }
}

impl WireTradingStats {
    /// Overlay present fields onto `base`.
    pub fn apply_to(self, base: &mut TradingStats) {
        if let Some(v) = self.total_trades {
            base.total_trades = v;
        }
        if let Some(v) = self.winning_trades {
            base.winning_trades = v;
        }
        if let Some(v) = self.losing_trades {
            base.losing_trades = v;
        }
        if let Some(v) = self.win_rate {
            base.win_rate = v;
        }
        if let Some(v) = self.total_realized_pnl_sol {
            base.total_realized_pnl_sol = v;
        }
        if let Some(v) = self.total_unrealized_pnl_sol {
            base.total_unrealized_pnl_sol = v;
        }
        if let Some(v) = self.open_positions {
            base.open_positions = v;
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WireWallet {
    pub address: Option<String>,
    pub label: Option<String>,
    pub twitter_handle: Option<String>,
    pub twitter_name: Option<String>,
    pub twitter_avatar_url: Option<String>,
    pub twitter_followers: Option<u64>,
    #[serde(deserialize_with = "opt_timestamp")]
    pub synced_at: Option<i64>,
}

impl WireWallet {
    pub fn into_wallet(self) -> Option<TrackedWallet> {
        Some(TrackedWallet {
            address: non_empty(self.address)?,
            label: non_empty(self.label),
            twitter_handle: non_empty(self.twitter_handle),
            twitter_name: non_empty(self.twitter_name),
            twitter_avatar_url: non_empty(self.twitter_avatar_url),
            twitter_followers: self.twitter_followers,
            synced_at: self.synced_at,
        })
    }
}

// ============================================================================
// Transactions
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WireTransaction {
    pub signature: Option<String>,
    pub mint: Option<String>,
    pub symbol: Option<String>,
    #[serde(alias = "type")]
    pub side: Option<String>,
    pub amount_sol: Option<Decimal>,
    pub token_amount: Option<Decimal>,
    pub price: Option<Decimal>,
    #[serde(deserialize_with = "opt_timestamp")]
    pub timestamp: Option<i64>,
}

impl From<WireTransaction> for Transaction {
    fn from(w: WireTransaction) -> Self {
        Self {
            signature: w.signature.unwrap_or_default(),
            mint: w.mint.unwrap_or_default(),
            symbol: w.symbol.unwrap_or_default(),
            side: w.side.unwrap_or_default().to_ascii_lowercase(),
            amount_sol: w.amount_sol.unwrap_or_default(),
            token_amount: w.token_amount.unwrap_or_default(),
            price: w.price.unwrap_or_default(),
            timestamp: w.timestamp.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WireTransactionPage {
    #[serde(alias = "transactions", alias = "trades")]
    pub items: Vec<WireTransaction>,
    pub total: Option<u64>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl WireTransactionPage {
    pub fn into_page(self, limit: u32, offset: u32) -> TransactionPage {
        let items: Vec<Transaction> = self.items.into_iter().map(Transaction::from).collect();
        TransactionPage {
            total: self
                .total
                .unwrap_or(u64::from(offset) + items.len() as u64),
            limit: self.limit.unwrap_or(limit),
            offset: self.offset.unwrap_or(offset),
            items,
        }
    }
}

// ============================================================================
// Dashboard init
// ============================================================================

/// `GET /api/dashboard/init` payload.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WireDashboardInit {
    pub config: Option<WireTradingConfig>,
    pub stats: Option<WireTradingStats>,
    pub wallets: Vec<WireWallet>,
    #[serde(alias = "holdings")]
    pub positions: Vec<WirePosition>,
    pub history: Vec<WirePosition>,
    pub migrations: Vec<WireMigration>,
    pub migration_stats: Option<WireMigrationStats>,
}

/// Map wire positions, dropping (and logging) rows without a mint.
pub fn map_positions(rows: Vec<WirePosition>, collection: &str) -> Vec<Position> {
    let total = rows.len();
    let mapped: Vec<Position> = rows
        .into_iter()
        .filter_map(WirePosition::into_position)
        .collect();
    if mapped.len() != total {
        warn!(
            collection,
            dropped = total - mapped.len(),
            "Dropped position rows without a mint"
        );
    }
    mapped
}

/// Map wire migrations, dropping rows without a mint.
pub fn map_migrations(rows: Vec<WireMigration>) -> Vec<RankedMigration> {
    rows.into_iter()
        .filter_map(WireMigration::into_migration)
        .collect()
}

/// Map wire watchlist tokens, dropping rows without a mint.
pub fn map_watchlist(rows: Vec<WireWatchlistToken>) -> Vec<WatchlistToken> {
    rows.into_iter()
        .filter_map(WireWatchlistToken::into_token)
        .collect()
}

/// Map wire wallets, dropping rows without an address.
pub fn map_wallets(rows: Vec<WireWallet>) -> Vec<TrackedWallet> {
    rows.into_iter().filter_map(WireWallet::into_wallet).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn test_position_status_aliases() {
        for (raw, expected) in [
            ("open", PositionStatus::Open),
            ("OPEN", PositionStatus::Open),
            ("partially_closed", PositionStatus::PartiallyClosed),
            ("partiallyclosed", PositionStatus::PartiallyClosed),
            ("PARTIALLY_CLOSED", PositionStatus::PartiallyClosed),
            ("partial", PositionStatus::PartiallyClosed),
            ("Closed", PositionStatus::Closed),
            ("pending", PositionStatus::Pending),
        ] {
            assert_eq!(parse_status(raw), expected, "status {raw}");
        }
    }

    #[test]
    fn test_position_nulls_default_to_zero() {
        let wire: WirePosition = serde_json::from_value(json!({
            "id": 42,
            "mint": "MINT",
            "status": "partiallyclosed",
            "entry_price": "0.001",
            "token_amount": 1000,
            "realized_pnl_sol": null,
            "pnl_percent": "12.5",
            "created_at": "2024-01-01T00:00:00Z"
        }))
        .unwrap();

        let pos = wire.into_position().unwrap();
        assert_eq!(pos.id, "42");
        assert_eq!(pos.status, PositionStatus::PartiallyClosed);
        assert_eq!(pos.entry_price, dec!(0.001));
        assert_eq!(pos.entry_token_amount, dec!(1000));
        assert_eq!(pos.remaining_tokens, dec!(1000));
        assert_eq!(pos.realized_pnl_sol, Decimal::ZERO);
        assert_eq!(pos.pnl_percent, 12.5);
        assert_eq!(pos.created_at, 1_704_067_200_000);
        assert!(pos.market_cap.is_none());
    }

    #[test]
    fn test_position_without_mint_is_rejected() {
        let wire: WirePosition = serde_json::from_value(json!({"id": "p1"})).unwrap();
        assert!(wire.into_position().is_none());
    }

    #[test]
    fn test_migration_mapping() {
        let wire: WireMigration = serde_json::from_value(json!({
            "mint": "M1",
            "symbol": "AAA",
            "price": 0.5,
            "market_cap": null,
            "ai_decision": "pass",
            "ai_confidence": 0.8,
            "recent_signals": [{"wallet": "w1", "amount_sol": 1.5}],
            "score": 77.0,
            "score_breakdown": {"liquidity": 30.0}
        }))
        .unwrap();

        let m = wire.into_migration().unwrap();
        assert_eq!(m.market.price, dec!(0.5));
        assert_eq!(m.market.market_cap, Decimal::ZERO);
        assert!(m.last_decision_passed());
        assert_eq!(m.wallet_signal_count, 1);
        assert!(m.has_wallet_confirmation);
        assert_eq!(m.recent_signals[0].action, "buy");
        assert_eq!(m.score_breakdown["liquidity"], 30.0);
    }

    #[test]
    fn test_watchlist_token_mapping() {
        let wire: WireWatchlistToken = serde_json::from_value(json!({
            "mint": "W1",
            "check_count": 3,
            "watch_reasons": ["low_liquidity"],
            "metrics": {"liquidity": "1500", "holder_count": 120},
            "last_evaluation": {"passed": false, "failed_checks": ["liquidity"], "improving": true}
        }))
        .unwrap();

        let token = wire.into_token().unwrap();
        assert_eq!(token.check_count, 3);
        assert_eq!(token.metrics.liquidity, dec!(1500));
        assert_eq!(token.metrics.holder_count, 120);
        assert!(token.is_improving());
    }

    #[test]
    fn test_envelope_error() {
        let env: ApiEnvelope<WireDashboardInit> =
            serde_json::from_value(json!({"success": false, "error": "boom"})).unwrap();
        assert!(!env.success);
        assert!(env.data.is_none());
        assert_eq!(env.error.as_deref(), Some("boom"));
    }

    #[test]
    fn test_transaction_page_aliases() {
        let wire: WireTransactionPage = serde_json::from_value(json!({
            "trades": [{"signature": "s1", "type": "BUY", "amount_sol": 1}],
            "total": 10
        }))
        .unwrap();

        let page = wire.into_page(5, 0);
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].side, "buy");
        assert_eq!(page.limit, 5);
        assert!(page.has_more());
    }
}
