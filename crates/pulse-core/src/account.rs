//! Trading configuration, aggregate stats, wallets and transactions.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Bot trading configuration as exposed by the backend.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TradingConfig {
    pub trading_enabled: bool,
    pub max_position_sol: Decimal,
    pub take_profit_1_multiplier: f64,
    pub take_profit_2_multiplier: f64,
    pub stop_loss_percent: f64,
    /// Whether a wallet buy on a PASSed token should trigger re-analysis.
    pub reanalyze_on_wallet_buy: bool,
}

/// Aggregate trading statistics.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TradingStats {
    pub total_trades: u64,
    pub winning_trades: u64,
    pub losing_trades: u64,
    pub win_rate: f64,
    pub total_realized_pnl_sol: Decimal,
    pub total_unrealized_pnl_sol: Decimal,
    pub open_positions: u64,
}

/// A wallet whose trades are tracked as signals.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TrackedWallet {
    pub address: String,
    pub label: Option<String>,
    pub twitter_handle: Option<String>,
    pub twitter_name: Option<String>,
    pub twitter_avatar_url: Option<String>,
    pub twitter_followers: Option<u64>,
    pub synced_at: Option<i64>,
}

/// Discovery feed counters.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MigrationStats {
    pub total_detected: u64,
    pub active: u64,
    pub ready_to_trade: u64,
    pub expired: u64,
}

/// Watchlist counters.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WatchlistStats {
    pub total_watching: u64,
    pub graduated: u64,
    pub removed: u64,
}

/// One on-chain buy or sell.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Transaction {
    pub signature: String,
    pub mint: String,
    pub symbol: String,
    /// "buy" or "sell".
    pub side: String,
    pub amount_sol: Decimal,
    pub token_amount: Decimal,
    pub price: Decimal,
    pub timestamp: i64,
}

/// A page of transaction history.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TransactionPage {
    pub items: Vec<Transaction>,
    pub total: u64,
    pub limit: u32,
    pub offset: u32,
}

impl TransactionPage {
    /// Whether another page exists after this one.
    pub fn has_more(&self) -> bool {
        u64::from(self.offset) + (self.items.len() as u64) < self.total
    }
}
