//! Positions (open trades and closed history).

use std::str::FromStr;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Lifecycle status of a position.
///
/// The backend spells these several ways (`"partially_closed"`,
/// `"partiallyclosed"`, `"PARTIAL"`); `FromStr` accepts all of them and the
/// canonical serialized form is SCREAMING_SNAKE_CASE.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PositionStatus {
    #[default]
    Open,
    PartiallyClosed,
    Closed,
    Pending,
}

impl PositionStatus {
    /// Whether the position belongs in the open collection.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Open | Self::PartiallyClosed | Self::Pending)
    }
}

impl FromStr for PositionStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| !matches!(c, '_' | '-' | ' '))
            .flat_map(char::to_lowercase)
            .collect();

        match normalized.as_str() {
            "open" | "active" => Ok(Self::Open),
            "partiallyclosed" | "partial" => Ok(Self::PartiallyClosed),
            "closed" => Ok(Self::Closed),
            "pending" => Ok(Self::Pending),
            _ => Err(CoreError::InvalidStatus(s.to_string())),
        }
    }
}

impl std::fmt::Display for PositionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open => write!(f, "OPEN"),
            Self::PartiallyClosed => write!(f, "PARTIALLY_CLOSED"),
            Self::Closed => write!(f, "CLOSED"),
            Self::Pending => write!(f, "PENDING"),
        }
    }
}

/// An open or closed trade.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    /// Backend position id.
    pub id: String,
    /// Token mint address.
    pub mint: String,
    pub symbol: String,
    pub status: PositionStatus,

    pub entry_price: Decimal,
    /// SOL spent on entry.
    pub entry_amount_sol: Decimal,
    /// Tokens received on entry.
    pub entry_token_amount: Decimal,
    pub entry_signature: Option<String>,

    pub target1_price: Decimal,
    pub target1_hit: bool,
    pub target2_price: Decimal,
    pub target2_hit: bool,
    pub stop_loss_price: Decimal,
    pub stop_loss_hit: bool,

    pub current_price: Decimal,
    pub remaining_tokens: Decimal,
    pub realized_pnl_sol: Decimal,
    pub unrealized_pnl_sol: Decimal,
    /// Unrealized PnL as a percentage of entry price.
    pub pnl_percent: f64,
    pub peak_pnl_percent: f64,
    /// Last known market cap. Holdings snapshots do not always carry it.
    pub market_cap: Option<Decimal>,
    pub exit_reason: Option<String>,

    pub created_at: i64,
    pub updated_at: i64,
    pub closed_at: Option<i64>,
}

impl Position {
    /// Create a freshly opened position.
    #[must_use]
    pub fn opened(id: impl Into<String>, mint: impl Into<String>, created_at: i64) -> Self {
        Self {
            id: id.into(),
            mint: mint.into(),
            status: PositionStatus::Open,
            created_at,
            updated_at: created_at,
            ..Default::default()
        }
    }

    /// PnL percentage of `price` relative to the entry price.
    ///
    /// Returns 0.0 when the entry price is unknown and `None` when the ratio
    /// does not fit a `Decimal`.
    #[must_use]
    pub fn pnl_percent_at(&self, price: Decimal) -> Option<f64> {
        if self.entry_price.is_zero() {
            return Some(0.0);
        }
        let pct = price
            .checked_sub(self.entry_price)?
            .checked_div(self.entry_price)?
            .checked_mul(Decimal::ONE_HUNDRED)?;
        Some(pct.to_f64().unwrap_or(0.0))
    }

    /// Apply a new market price, recomputing the percentage fields.
    ///
    /// Returns false and leaves the position untouched when the percentage
    /// overflows.
    pub fn mark(&mut self, price: Decimal, timestamp: i64) -> bool {
        let Some(pct) = self.pnl_percent_at(price) else {
            return false;
        };
        self.current_price = price;
        self.pnl_percent = pct;
        if pct > self.peak_pnl_percent {
            self.peak_pnl_percent = pct;
        }
        self.updated_at = timestamp;
        true
    }

    /// Freeze this position as closed.
    pub fn close(&mut self, reason: Option<String>, closed_at: i64) {
        self.status = PositionStatus::Closed;
        self.unrealized_pnl_sol = Decimal::ZERO;
        self.exit_reason = reason.or_else(|| self.exit_reason.take());
        self.closed_at = Some(closed_at);
        self.updated_at = closed_at;
    }

    /// Total PnL (realized + unrealized) in SOL.
    #[must_use]
    pub fn total_pnl_sol(&self) -> Decimal {
        self.realized_pnl_sol.saturating_add(self.unrealized_pnl_sol)
    }
}
