//! Store events and push payload parsing.

use std::collections::BTreeMap;

use pulse_api::wire::{
    opt_f64, opt_id, opt_timestamp, WireMigration, WireMigrationStats, WirePosition,
    WireTradingStats, WireWatchlistMetrics, WireWatchlistToken,
};
use pulse_core::{
    ConnectionStatus, DashboardSnapshot, EventType, MigrationStats, Position, RankedMigration,
    TrackedWallet, TradingConfig, WatchlistToken,
};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{StoreError, StoreResult};
use crate::routing::Channel;

// ============================================================================
// Store events
// ============================================================================

/// Everything that can change the store.
#[derive(Debug, Clone)]
pub enum StoreEvent {
    /// A snapshot fetch started.
    FetchStarted,
    /// A snapshot fetch completed.
    SnapshotLoaded {
        snapshot: Box<DashboardSnapshot>,
        timestamp: i64,
    },
    /// A snapshot fetch failed.
    FetchFailed { message: String },
    /// A push channel changed status.
    ConnectionChanged {
        channel: Channel,
        status: ConnectionStatus,
    },
    /// A push event arrived.
    Push {
        event: PushEvent,
        timestamp: i64,
        /// Raw payload, kept for the activity feed.
        raw: Value,
    },
    /// Optimistic trading toggle (and its rollback).
    SetTradingEnabled(bool),
    /// Authoritative trading config from the backend.
    ConfigReplaced(TradingConfig),
    /// Optimistic close: move an open position to history.
    ClosePositionLocally { id: String, timestamp: i64 },
    /// Replace the wallet with the same address.
    WalletReplaced(TrackedWallet),
}

impl StoreEvent {
    /// Push event without a raw payload.
    pub fn push(event: PushEvent, timestamp: i64) -> Self {
        Self::Push {
            event,
            timestamp,
            raw: Value::Null,
        }
    }

    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::FetchStarted => "fetch_started",
            Self::SnapshotLoaded { .. } => "snapshot_loaded",
            Self::FetchFailed { .. } => "fetch_failed",
            Self::ConnectionChanged { .. } => "connection_changed",
            Self::Push { event, .. } => event.event_type().as_str(),
            Self::SetTradingEnabled(_) => "set_trading_enabled",
            Self::ConfigReplaced(_) => "config_replaced",
            Self::ClosePositionLocally { .. } => "close_position_locally",
            Self::WalletReplaced(_) => "wallet_replaced",
        }
    }
}

// ============================================================================
// Push payloads
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct MigrationDetected {
    pub mint: String,
    pub symbol: Option<String>,
    pub name: Option<String>,
    pub image_url: Option<String>,
    #[serde(default, deserialize_with = "opt_timestamp")]
    pub detected_at: Option<i64>,
    #[serde(default, deserialize_with = "opt_f64")]
    pub score: Option<f64>,
    pub score_breakdown: Option<BTreeMap<String, f64>>,
    pub source: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MarketDataUpdate {
    pub mint: String,
    pub price: Option<Decimal>,
    pub market_cap: Option<Decimal>,
    pub liquidity: Option<Decimal>,
    pub volume_24h: Option<Decimal>,
    #[serde(default, deserialize_with = "opt_f64")]
    pub price_change_1h: Option<f64>,
    #[serde(default, deserialize_with = "opt_f64")]
    pub score: Option<f64>,
    pub score_breakdown: Option<BTreeMap<String, f64>>,
    pub ready_to_trade: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AiReasoning {
    pub mint: String,
    pub decision: String,
    #[serde(default, deserialize_with = "opt_f64")]
    pub confidence: Option<f64>,
    pub reasoning: Option<String>,
}

/// Payload carrying only a mint and an optional reason.
#[derive(Debug, Clone, Deserialize)]
pub struct MintNotice {
    pub mint: String,
    pub reason: Option<String>,
}

/// `wallet_signal` and `wallet_buy_detected`.
#[derive(Debug, Clone, Deserialize)]
pub struct WalletActivity {
    pub mint: String,
    pub wallet: String,
    pub action: Option<String>,
    pub amount_sol: Option<Decimal>,
    #[serde(default, deserialize_with = "opt_timestamp")]
    pub timestamp: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SignalDetected {
    pub mint: String,
    pub source: String,
    pub ready_to_trade: Option<bool>,
    #[serde(default, deserialize_with = "opt_f64")]
    pub score: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PriceUpdate {
    pub mint: String,
    pub price: Decimal,
    pub unrealized_pnl_sol: Option<Decimal>,
    #[serde(default, deserialize_with = "opt_f64")]
    pub pnl_percent: Option<f64>,
    pub market_cap: Option<Decimal>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TakeProfit {
    pub mint: String,
    #[serde(default, deserialize_with = "opt_f64")]
    pub target_multiplier: Option<f64>,
    pub realized: Option<Decimal>,
    pub remaining: Option<Decimal>,
    #[serde(default)]
    pub is_final: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PositionClosed {
    pub mint: String,
    #[serde(default, deserialize_with = "opt_id")]
    pub id: Option<String>,
    pub reason: Option<String>,
    pub total_pnl_sol: Option<Decimal>,
    pub exit_price: Option<Decimal>,
    pub symbol: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StopLoss {
    pub mint: String,
    pub price: Option<Decimal>,
    pub pnl_sol: Option<Decimal>,
}

/// One row of a `holdings_snapshot`. Absent fields keep their previous value.
#[derive(Debug, Clone, Deserialize)]
pub struct HoldingRow {
    pub mint: String,
    #[serde(default, deserialize_with = "opt_id")]
    pub id: Option<String>,
    pub symbol: Option<String>,
    pub current_price: Option<Decimal>,
    pub remaining_tokens: Option<Decimal>,
    pub unrealized_pnl_sol: Option<Decimal>,
    #[serde(default, deserialize_with = "opt_f64")]
    pub pnl_percent: Option<f64>,
    pub market_cap: Option<Decimal>,
    pub entry_price: Option<Decimal>,
    pub entry_amount_sol: Option<Decimal>,
}

impl HoldingRow {
    /// Overlay the fields this row carries onto `position`.
    pub fn apply_to(&self, position: &mut Position) {
        if let Some(symbol) = self.symbol.as_ref().filter(|s| !s.is_empty()) {
            position.symbol.clone_from(symbol);
        }
        if let Some(v) = self.current_price {
            position.current_price = v;
        }
        if let Some(v) = self.remaining_tokens {
            position.remaining_tokens = v;
        }
        if let Some(v) = self.unrealized_pnl_sol {
            position.unrealized_pnl_sol = v;
        }
        if let Some(v) = self.pnl_percent {
            position.pnl_percent = v;
            position.peak_pnl_percent = position.peak_pnl_percent.max(v);
        }
        if let Some(v) = self.market_cap {
            position.market_cap = Some(v);
        }
        if let Some(v) = self.entry_price {
            position.entry_price = v;
        }
        if let Some(v) = self.entry_amount_sol {
            position.entry_amount_sol = v;
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WatchlistPatch {
    pub mint: String,
    pub check_count: Option<u32>,
    pub improving: Option<bool>,
    pub passed: Option<bool>,
    pub failed_checks: Option<Vec<String>>,
    pub metrics: Option<WireWatchlistMetrics>,
    pub watch_reasons: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ConnectedPayload {
    #[serde(alias = "clientId")]
    client_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct HistoryPayload {
    history: Option<Vec<WirePosition>>,
    position: Option<WirePosition>,
}

#[derive(Debug, Clone, Deserialize)]
struct HoldingsPayload {
    #[serde(alias = "holdings")]
    positions: Vec<HoldingRow>,
}

#[derive(Debug, Clone, Deserialize)]
struct FeedPayload {
    migrations: Vec<WireMigration>,
    stats: Option<WireMigrationStats>,
}

/// A parsed push event.
#[derive(Debug, Clone)]
pub enum PushEvent {
    Connected { client_id: Option<String> },
    MigrationDetected(MigrationDetected),
    MarketDataUpdated(MarketDataUpdate),
    AiReasoning(AiReasoning),
    NoMarketData(MintNotice),
    WalletSignal(WalletActivity),
    SignalDetected(SignalDetected),
    WalletBuyDetected(WalletActivity),
    PositionOpened(Box<Position>),
    PriceUpdate(PriceUpdate),
    TakeProfitTriggered(TakeProfit),
    PositionClosed(PositionClosed),
    HistoryUpdated(Vec<Position>),
    HoldingsSnapshot(Vec<HoldingRow>),
    StopLossTriggered(StopLoss),
    MigrationExpired(MintNotice),
    FeedUpdate {
        migrations: Vec<RankedMigration>,
        stats: Option<MigrationStats>,
    },
    StatsUpdate(WireTradingStats),
    WatchlistAdded(Box<WatchlistToken>),
    WatchlistUpdated(WatchlistPatch),
    WatchlistRemoved(MintNotice),
    WatchlistGraduated(MintNotice),
}

fn payload<T: DeserializeOwned>(event: EventType, data: &Value) -> StoreResult<T> {
    T::deserialize(data).map_err(|e| StoreError::InvalidPayload {
        event,
        reason: e.to_string(),
    })
}

fn require_mint(event: EventType, mint: &str) -> StoreResult<()> {
    if mint.trim().is_empty() {
        return Err(StoreError::MissingField {
            event,
            field: "mint",
        });
    }
    Ok(())
}

/// Some events wrap their list in an object, some send the bare array.
fn list_or_field<'a>(data: &'a Value, field: &str) -> Option<&'a Value> {
    if data.is_array() {
        Some(data)
    } else {
        data.get(field)
    }
}

impl PushEvent {
    /// Parse the payload of a push envelope.
    ///
    /// Fails when a required key is missing or has the wrong shape; the
    /// caller logs and drops the event.
    pub fn parse(event: EventType, data: &Value) -> StoreResult<Self> {
        use EventType as E;

        let parsed = match event {
            E::Ping | E::Pong => return Err(StoreError::Unhandled(event.to_string())),
            E::Connected => {
                let p: ConnectedPayload = payload(event, data).unwrap_or_default();
                Self::Connected {
                    client_id: p.client_id,
                }
            }
            E::MigrationDetected => {
                let p: MigrationDetected = payload(event, data)?;
                require_mint(event, &p.mint)?;
                Self::MigrationDetected(p)
            }
            E::MarketDataUpdated => {
                let p: MarketDataUpdate = payload(event, data)?;
                require_mint(event, &p.mint)?;
                Self::MarketDataUpdated(p)
            }
            E::AiReasoning => {
                let p: AiReasoning = payload(event, data)?;
                require_mint(event, &p.mint)?;
                Self::AiReasoning(p)
            }
            E::NoMarketData => {
                let p: MintNotice = payload(event, data)?;
                require_mint(event, &p.mint)?;
                Self::NoMarketData(p)
            }
            E::WalletSignal | E::WalletBuyDetected => {
                let p: WalletActivity = payload(event, data)?;
                require_mint(event, &p.mint)?;
                if event == E::WalletSignal {
                    Self::WalletSignal(p)
                } else {
                    Self::WalletBuyDetected(p)
                }
            }
            E::SignalDetected => {
                let p: SignalDetected = payload(event, data)?;
                require_mint(event, &p.mint)?;
                Self::SignalDetected(p)
            }
            E::PositionOpened => {
                let wire: WirePosition = payload(event, data)?;
                let position = wire.into_position().ok_or(StoreError::MissingField {
                    event,
                    field: "mint",
                })?;
                Self::PositionOpened(Box::new(position))
            }
            E::PriceUpdate => {
                let p: PriceUpdate = payload(event, data)?;
                require_mint(event, &p.mint)?;
                Self::PriceUpdate(p)
            }
            E::TakeProfitTriggered => {
                let p: TakeProfit = payload(event, data)?;
                require_mint(event, &p.mint)?;
                Self::TakeProfitTriggered(p)
            }
            E::PositionClosed => {
                let p: PositionClosed = payload(event, data)?;
                require_mint(event, &p.mint)?;
                Self::PositionClosed(p)
            }
            E::HistoryUpdated => {
                let rows: Vec<WirePosition> = if data.is_array() {
                    payload(event, data)?
                } else {
                    let p: HistoryPayload = payload(event, data)?;
                    match (p.history, p.position) {
                        (Some(history), _) => history,
                        (None, Some(position)) => vec![position],
                        (None, None) => {
                            return Err(StoreError::MissingField {
                                event,
                                field: "history",
                            })
                        }
                    }
                };
                let positions: Vec<Position> = rows
                    .into_iter()
                    .filter_map(WirePosition::into_position)
                    .collect();
                Self::HistoryUpdated(positions)
            }
            E::HoldingsSnapshot => {
                let rows: Vec<HoldingRow> = if data.is_array() {
                    payload(event, data)?
                } else {
                    payload::<HoldingsPayload>(event, data)?.positions
                };
                for row in &rows {
                    require_mint(event, &row.mint)?;
                }
                Self::HoldingsSnapshot(rows)
            }
            E::StopLossTriggered => {
                let p: StopLoss = payload(event, data)?;
                require_mint(event, &p.mint)?;
                Self::StopLossTriggered(p)
            }
            E::MigrationExpired => {
                let p: MintNotice = payload(event, data)?;
                require_mint(event, &p.mint)?;
                Self::MigrationExpired(p)
            }
            E::FeedUpdate => {
                let p: FeedPayload = if data.is_array() {
                    FeedPayload {
                        migrations: payload(event, data)?,
                        stats: None,
                    }
                } else {
                    payload(event, data)?
                };
                Self::FeedUpdate {
                    migrations: pulse_api::wire::map_migrations(p.migrations),
                    stats: p.stats.map(MigrationStats::from),
                }
            }
            E::StatsUpdate => {
                let source = data.get("stats").filter(|s| s.is_object()).unwrap_or(data);
                Self::StatsUpdate(payload(event, source)?)
            }
            E::WatchlistAdded => {
                let source = data.get("token").filter(|t| t.is_object()).unwrap_or(data);
                let wire: WireWatchlistToken = payload(event, source)?;
                let token = wire.into_token().ok_or(StoreError::MissingField {
                    event,
                    field: "mint",
                })?;
                Self::WatchlistAdded(Box::new(token))
            }
            E::WatchlistUpdated => {
                let p: WatchlistPatch = payload(event, data)?;
                require_mint(event, &p.mint)?;
                Self::WatchlistUpdated(p)
            }
            E::WatchlistRemoved => {
                let p: MintNotice = payload(event, data)?;
                require_mint(event, &p.mint)?;
                Self::WatchlistRemoved(p)
            }
            E::WatchlistGraduated => {
                let p: MintNotice = payload(event, data)?;
                require_mint(event, &p.mint)?;
                Self::WatchlistGraduated(p)
            }
        };
        Ok(parsed)
    }

    pub fn event_type(&self) -> EventType {
        use EventType as E;
        match self {
            Self::Connected { .. } => E::Connected,
            Self::MigrationDetected(_) => E::MigrationDetected,
            Self::MarketDataUpdated(_) => E::MarketDataUpdated,
            Self::AiReasoning(_) => E::AiReasoning,
            Self::NoMarketData(_) => E::NoMarketData,
            Self::WalletSignal(_) => E::WalletSignal,
            Self::SignalDetected(_) => E::SignalDetected,
            Self::WalletBuyDetected(_) => E::WalletBuyDetected,
            Self::PositionOpened(_) => E::PositionOpened,
            Self::PriceUpdate(_) => E::PriceUpdate,
            Self::TakeProfitTriggered(_) => E::TakeProfitTriggered,
            Self::PositionClosed(_) => E::PositionClosed,
            Self::HistoryUpdated(_) => E::HistoryUpdated,
            Self::HoldingsSnapshot(_) => E::HoldingsSnapshot,
            Self::StopLossTriggered(_) => E::StopLossTriggered,
            Self::MigrationExpired(_) => E::MigrationExpired,
            Self::FeedUpdate { .. } => E::FeedUpdate,
            Self::StatsUpdate(_) => E::StatsUpdate,
            Self::WatchlistAdded(_) => E::WatchlistAdded,
            Self::WatchlistUpdated(_) => E::WatchlistUpdated,
            Self::WatchlistRemoved(_) => E::WatchlistRemoved,
            Self::WatchlistGraduated(_) => E::WatchlistGraduated,
        }
    }

    /// Natural key of the entity this event targets, if it targets one.
    pub fn mint(&self) -> Option<&str> {
        match self {
            Self::MigrationDetected(p) => Some(&p.mint),
            Self::MarketDataUpdated(p) => Some(&p.mint),
            Self::AiReasoning(p) => Some(&p.mint),
            Self::NoMarketData(p)
            | Self::MigrationExpired(p)
            | Self::WatchlistRemoved(p)
            | Self::WatchlistGraduated(p) => Some(&p.mint),
            Self::WalletSignal(p) | Self::WalletBuyDetected(p) => Some(&p.mint),
            Self::SignalDetected(p) => Some(&p.mint),
            Self::PositionOpened(p) => Some(&p.mint),
            Self::PriceUpdate(p) => Some(&p.mint),
            Self::TakeProfitTriggered(p) => Some(&p.mint),
            Self::PositionClosed(p) => Some(&p.mint),
            Self::StopLossTriggered(p) => Some(&p.mint),
            Self::WatchlistAdded(t) => Some(&t.mint),
            Self::WatchlistUpdated(p) => Some(&p.mint),
            Self::Connected { .. }
            | Self::HistoryUpdated(_)
            | Self::HoldingsSnapshot(_)
            | Self::FeedUpdate { .. }
            | Self::StatsUpdate(_) => None,
        }
    }
}
