//! Activity feed entries.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Display color tag for an activity entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityColor {
    Green,
    Red,
    Yellow,
    Blue,
    Purple,
    #[default]
    Gray,
}

/// A human-readable summary of one inbound event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityItem {
    pub id: String,
    /// Wire name of the source event.
    pub event_type: String,
    pub message: String,
    pub color: ActivityColor,
    pub timestamp: i64,
    pub payload: serde_json::Value,
}

impl ActivityItem {
    /// Create an entry with a fresh synthetic id.
    pub fn new(
        event_type: impl Into<String>,
        message: impl Into<String>,
        color: ActivityColor,
        timestamp: i64,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            event_type: event_type.into(),
            message: message.into(),
            color,
            timestamp,
            payload,
        }
    }
}
