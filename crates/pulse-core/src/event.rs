//! Push channel event vocabulary.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

macro_rules! event_types {
    ($($variant:ident => $wire:literal),+ $(,)?) => {
        /// Named event types carried in the `type` field of push envelopes.
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(rename_all = "snake_case")]
        pub enum EventType {
            $($variant),+
        }

        impl EventType {
            /// Every known event type.
            pub const ALL: &'static [EventType] = &[$(EventType::$variant),+];

            /// Wire name of this event type.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $wire),+
                }
            }
        }

        impl FromStr for EventType {
            type Err = CoreError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($wire => Ok(Self::$variant),)+
                    other => Err(CoreError::UnknownEventType(other.to_string())),
                }
            }
        }
    };
}

event_types! {
    Connected => "connected",
    Ping => "ping",
    Pong => "pong",
    MigrationDetected => "migration_detected",
    MarketDataUpdated => "market_data_updated",
    AiReasoning => "ai_reasoning",
    NoMarketData => "no_market_data",
    WalletSignal => "wallet_signal",
    SignalDetected => "signal_detected",
    WalletBuyDetected => "wallet_buy_detected",
    PositionOpened => "position_opened",
    PriceUpdate => "price_update",
    TakeProfitTriggered => "take_profit_triggered",
    PositionClosed => "position_closed",
    HistoryUpdated => "history_updated",
    HoldingsSnapshot => "holdings_snapshot",
    StopLossTriggered => "stop_loss_triggered",
    MigrationExpired => "migration_expired",
    FeedUpdate => "feed_update",
    StatsUpdate => "stats_update",
    WatchlistAdded => "watchlist_added",
    WatchlistUpdated => "watchlist_updated",
    WatchlistRemoved => "watchlist_removed",
    WatchlistGraduated => "watchlist_graduated",
}

impl EventType {
    /// Transport-level control messages that never reach the store.
    pub fn is_control(&self) -> bool {
        matches!(self, Self::Ping | Self::Pong)
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_names_round_trip() {
        for ty in EventType::ALL {
            assert_eq!(ty.as_str().parse::<EventType>().unwrap(), *ty);
        }
    }

    #[test]
    fn test_serde_matches_wire_name() {
        for ty in EventType::ALL {
            let json = serde_json::to_string(ty).unwrap();
            assert_eq!(json, format!("\"{}\"", ty.as_str()));
        }
    }

    #[test]
    fn test_unknown_type() {
        assert!("order_filled".parse::<EventType>().is_err());
    }
}
