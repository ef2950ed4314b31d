//! Push channel message types.

use serde::{Deserialize, Serialize};

use crate::error::{WsError, WsResult};

// ============================================================================
// Inbound
// ============================================================================

/// Inbound message envelope: `{ type, data, timestamp, clientId? }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WsEnvelope {
    /// Event type name (e.g. "price_update").
    #[serde(rename = "type")]
    pub event_type: String,
    /// Event payload.
    #[serde(default)]
    pub data: serde_json::Value,
    /// Server timestamp (Unix ms).
    #[serde(default)]
    pub timestamp: i64,
    /// Server-assigned client id, present on `connected` messages.
    #[serde(rename = "clientId", default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
}

impl WsEnvelope {
    /// Create an envelope (used by tests and local replays).
    pub fn new(event_type: impl Into<String>, data: serde_json::Value, timestamp: i64) -> Self {
        Self {
            event_type: event_type.into(),
            data,
            timestamp,
            client_id: None,
        }
    }

    /// Parse a raw text frame.
    pub fn parse(text: &str) -> WsResult<Self> {
        let envelope: Self = serde_json::from_str(text)?;
        if envelope.event_type.is_empty() {
            return Err(WsError::MalformedEnvelope("empty event type".to_string()));
        }
        Ok(envelope)
    }

    /// Client id assigned by the server.
    ///
    /// Looks at the envelope first, then at `data.clientId` / `data.client_id`.
    pub fn assigned_client_id(&self) -> Option<String> {
        self.client_id.clone().or_else(|| {
            ["clientId", "client_id"]
                .iter()
                .find_map(|key| self.data.get(*key).and_then(|v| v.as_str()))
                .map(str::to_string)
        })
    }
}

// ============================================================================
// Outbound
// ============================================================================

/// Outbound message: `{ type, data, timestamp }`.
#[derive(Debug, Clone, Serialize)]
pub struct OutboundMessage {
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: serde_json::Value,
    pub timestamp: i64,
}

impl OutboundMessage {
    /// Create an outbound message stamped with the current time.
    pub fn new(event_type: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            event_type: event_type.into(),
            data,
            timestamp: pulse_core::now_ms(),
        }
    }

    /// Heartbeat ping.
    pub fn ping() -> Self {
        Self::new("ping", serde_json::json!({}))
    }

    /// Serialize to a text frame.
    pub fn to_text(&self) -> WsResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_envelope() {
        let raw = r#"{"type":"price_update","data":{"mint":"ABC","price":0.01},"timestamp":1700000000000}"#;
        let env = WsEnvelope::parse(raw).unwrap();

        assert_eq!(env.event_type, "price_update");
        assert_eq!(env.data["mint"], "ABC");
        assert_eq!(env.timestamp, 1_700_000_000_000);
        assert!(env.client_id.is_none());
    }

    #[test]
    fn test_connected_client_id_locations() {
        let top = WsEnvelope::parse(r#"{"type":"connected","data":{},"clientId":"c-1"}"#).unwrap();
        assert_eq!(top.assigned_client_id().as_deref(), Some("c-1"));

        let nested =
            WsEnvelope::parse(r#"{"type":"connected","data":{"client_id":"c-2"}}"#).unwrap();
        assert_eq!(nested.assigned_client_id().as_deref(), Some("c-2"));

        let none = WsEnvelope::parse(r#"{"type":"connected"}"#).unwrap();
        assert!(none.assigned_client_id().is_none());
    }

    #[test]
    fn test_malformed_envelopes() {
        assert!(WsEnvelope::parse("not json").is_err());
        assert!(WsEnvelope::parse(r#"{"data":{}}"#).is_err());
        assert!(WsEnvelope::parse(r#"{"type":""}"#).is_err());
    }

    #[test]
    fn test_ping_serialization() {
        let text = OutboundMessage::ping().to_text().unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["type"], "ping");
        assert_eq!(value["data"], json!({}));
        assert!(value["timestamp"].as_i64().unwrap() > 0);
    }
}
