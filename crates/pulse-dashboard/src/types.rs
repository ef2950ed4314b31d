//! View server API types.
//!
//! These types are used for JSON serialization in the REST and WebSocket APIs.

use std::sync::Arc;

use pulse_api::TrackOptions;
use pulse_store::TradingState;
use serde::{Deserialize, Serialize};

/// Default page size for on-demand history.
pub const DEFAULT_PAGE_LIMIT: u32 = 50;
/// Largest page size accepted from view clients.
pub const MAX_PAGE_LIMIT: u32 = 200;

/// WebSocket message sent to view clients.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ViewMessage {
    /// Full state, sent on connect and on every published change.
    State {
        /// When the message was built (Unix milliseconds).
        timestamp_ms: i64,
        state: Arc<TradingState>,
    },
}

impl ViewMessage {
    pub fn state(state: Arc<TradingState>) -> Self {
        Self::State {
            timestamp_ms: pulse_core::now_ms(),
            state,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// REST response envelope, mirroring the backend's.
#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ToggleTradingRequest {
    pub enabled: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TrackRequest {
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub analyze: bool,
}

impl From<TrackRequest> for TrackOptions {
    fn from(req: TrackRequest) -> Self {
        Self {
            symbol: req.symbol,
            name: req.name,
            analyze: req.analyze,
        }
    }
}

/// `?limit&offset` query.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageQuery {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl PageQuery {
    /// Resolve defaults; `None` when the limit is out of range.
    pub fn resolve(self) -> Option<(u32, u32)> {
        let limit = self.limit.unwrap_or(DEFAULT_PAGE_LIMIT);
        if limit == 0 || limit > MAX_PAGE_LIMIT {
            return None;
        }
        Some((limit, self.offset.unwrap_or(0)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_message_serialization() {
        let state = Arc::new(TradingState::default());
        let json = ViewMessage::state(state).to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["type"], "state");
        assert!(value["timestamp_ms"].as_i64().unwrap() > 0);
        assert_eq!(value["state"]["version"], 0);
        assert_eq!(value["state"]["loading"], true);
        assert!(value["state"]["positions"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_envelope_skips_empty_fields() {
        let ok = serde_json::to_value(ApiResponse::ok(3)).unwrap();
        assert_eq!(ok, serde_json::json!({"success": true, "data": 3}));

        let err = serde_json::to_value(ApiResponse::<()>::err("request timed out")).unwrap();
        assert_eq!(
            err,
            serde_json::json!({"success": false, "error": "request timed out"})
        );
    }

    #[test]
    fn test_page_query_bounds() {
        assert_eq!(PageQuery::default().resolve(), Some((50, 0)));
        assert_eq!(
            PageQuery {
                limit: Some(20),
                offset: Some(40)
            }
            .resolve(),
            Some((20, 40))
        );
        assert_eq!(
            PageQuery {
                limit: Some(0),
                offset: None
            }
            .resolve(),
            None
        );
        assert_eq!(
            PageQuery {
                limit: Some(MAX_PAGE_LIMIT + 1),
                offset: None
            }
            .resolve(),
            None
        );
    }

    #[test]
    fn test_track_request_defaults() {
        let req: TrackRequest = serde_json::from_str(r#"{"symbol":"BONK"}"#).unwrap();
        let options = TrackOptions::from(req);
        assert_eq!(options.symbol.as_deref(), Some("BONK"));
        assert!(options.name.is_none());
        assert!(!options.analyze);
    }
}
