//! Watchlist tokens (candidates not yet meeting entry criteria).

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Metrics captured at the last watchlist check.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WatchlistMetrics {
    pub liquidity: Decimal,
    pub volume: Decimal,
    pub market_cap: Decimal,
    pub holder_count: u64,
    pub price: Decimal,
}

/// Result of the last entry-criteria evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Evaluation {
    pub passed: bool,
    pub failed_checks: Vec<String>,
    pub improving: bool,
    pub checked_at: i64,
}

/// A token monitored against entry criteria.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WatchlistToken {
    pub mint: String,
    pub symbol: String,
    pub name: String,
    pub added_at: i64,
    pub last_checked_at: i64,
    pub check_count: u32,
    /// Labels of the criteria that kept this token out of a position.
    pub watch_reasons: Vec<String>,
    pub metrics: WatchlistMetrics,
    pub last_evaluation: Option<Evaluation>,
}

/// Human-readable explanation of why a token is still on the watchlist.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WatchlistReasoning {
    pub mint: String,
    pub summary: String,
    pub failed_checks: Vec<String>,
    pub improving: bool,
    pub generated_at: i64,
}

impl WatchlistToken {
    /// Whether the last evaluation reported improving metrics.
    pub fn is_improving(&self) -> bool {
        self.last_evaluation.as_ref().is_some_and(|e| e.improving)
    }
}
