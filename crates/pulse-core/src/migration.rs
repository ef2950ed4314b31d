//! Ranked migrations (candidate tokens surfaced by the discovery feed).

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Maximum number of wallet signals kept per migration.
pub const MAX_RECENT_SIGNALS: usize = 10;

/// Last known market data for a token.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub price: Decimal,
    pub market_cap: Decimal,
    pub liquidity: Decimal,
    pub volume_24h: Decimal,
    /// Price change over the last hour, in percent.
    pub price_change_1h: f64,
}

/// AI verdict on a token.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Decision {
    Buy,
    Pass,
    Watch,
    Other(String),
}

impl Decision {
    pub fn is_pass(&self) -> bool {
        matches!(self, Self::Pass)
    }
}

impl From<String> for Decision {
    fn from(value: String) -> Self {
        match value.trim().to_ascii_uppercase().as_str() {
            "BUY" => Self::Buy,
            "PASS" | "SKIP" => Self::Pass,
            "WATCH" => Self::Watch,
            _ => Self::Other(value),
        }
    }
}

impl From<Decision> for String {
    fn from(value: Decision) -> Self {
        value.to_string()
    }
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buy => write!(f, "BUY"),
            Self::Pass => write!(f, "PASS"),
            Self::Watch => write!(f, "WATCH"),
            Self::Other(s) => write!(f, "{s}"),
        }
    }
}

/// Most recent AI decision recorded for a migration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiDecision {
    pub decision: Decision,
    /// Confidence in [0, 1] or [0, 100], as sent by the backend.
    pub confidence: f64,
    pub reasoning: String,
    pub decided_at: i64,
}

/// A tracked wallet's trade on a migration token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletSignal {
    pub wallet: String,
    /// "buy" or "sell".
    pub action: String,
    pub amount_sol: Decimal,
    pub timestamp: i64,
}

/// A token under consideration or active monitoring.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RankedMigration {
    pub mint: String,
    pub symbol: String,
    pub name: String,
    pub image_url: Option<String>,
    pub detected_at: i64,
    pub updated_at: i64,

    pub market: MarketSnapshot,
    /// Set when the backend reported that no market data is available.
    pub market_data_unavailable: bool,

    pub ai: Option<AiDecision>,

    pub wallet_signal_count: u32,
    /// Most-recent-first, at most [`MAX_RECENT_SIGNALS`] entries.
    pub recent_signals: Vec<WalletSignal>,

    pub score: f64,
    pub score_breakdown: BTreeMap<String, f64>,
    pub ready_to_trade: bool,
    pub signal_source: Option<String>,
    pub has_wallet_confirmation: bool,

    /// Latched once a wallet-buy re-analysis was requested for the current
    /// AI decision. Cleared when a new decision is recorded.
    pub reanalysis_requested: bool,
}

impl RankedMigration {
    /// Create a newly detected migration.
    #[must_use]
    pub fn detected(mint: impl Into<String>, detected_at: i64) -> Self {
        Self {
            mint: mint.into(),
            detected_at,
            updated_at: detected_at,
            ..Default::default()
        }
    }

    /// Record a wallet signal, keeping the list capped and newest-first.
    pub fn push_signal(&mut self, signal: WalletSignal) {
        self.updated_at = self.updated_at.max(signal.timestamp);
        self.recent_signals.insert(0, signal);
        self.recent_signals.truncate(MAX_RECENT_SIGNALS);
        self.wallet_signal_count = self.wallet_signal_count.saturating_add(1);
        self.has_wallet_confirmation = true;
    }

    /// Whether the last AI decision was PASS.
    pub fn last_decision_passed(&self) -> bool {
        self.ai.as_ref().is_some_and(|ai| ai.decision.is_pass())
    }
}
