//! Event routing table.
//!
//! Maps each store-handled event type to the push channel it is read from.
//! The table is data: the composition root subscribes one listener per route,
//! and configuration can move event types between channels.

use std::collections::{BTreeMap, HashMap};

use pulse_core::EventType;
use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// Logical push channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    /// General trading events.
    Trading,
    /// AI reasoning events.
    Reasoning,
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Trading => write!(f, "trading"),
            Self::Reasoning => write!(f, "reasoning"),
        }
    }
}

/// Event type -> channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingTable {
    routes: BTreeMap<EventType, Channel>,
}

impl Default for RoutingTable {
    /// AI reasoning on the reasoning channel; every other store event on the
    /// trading channel.
    fn default() -> Self {
        let routes = EventType::ALL
            .iter()
            .filter(|ty| !ty.is_control())
            .map(|ty| {
                let channel = match ty {
                    EventType::AiReasoning => Channel::Reasoning,
                    _ => Channel::Trading,
                };
                (*ty, channel)
            })
            .collect();
        Self { routes }
    }
}

impl RoutingTable {
    /// Apply overrides keyed by wire event name.
    ///
    /// Unknown names and control events (ping/pong) are rejected.
    pub fn with_overrides(mut self, overrides: &HashMap<String, Channel>) -> StoreResult<Self> {
        for (name, channel) in overrides {
            let ty: EventType = name
                .parse()
                .map_err(|_| StoreError::InvalidRoute(format!("unknown event type `{name}`")))?;
            if ty.is_control() {
                return Err(StoreError::InvalidRoute(format!(
                    "control event `{name}` cannot be routed to the store"
                )));
            }
            self.routes.insert(ty, *channel);
        }
        Ok(self)
    }

    pub fn channel_for(&self, event_type: EventType) -> Option<Channel> {
        self.routes.get(&event_type).copied()
    }

    /// Event types read from `channel`, in a stable order.
    pub fn events_for(&self, channel: Channel) -> Vec<EventType> {
        self.routes
            .iter()
            .filter(|(_, c)| **c == channel)
            .map(|(ty, _)| *ty)
            .collect()
    }

    /// Channels with at least one route.
    pub fn channels(&self) -> Vec<Channel> {
        let mut channels: Vec<Channel> = self.routes.values().copied().collect();
        channels.sort();
        channels.dedup();
        channels
    }

    pub fn routes(&self) -> impl Iterator<Item = (EventType, Channel)> + '_ {
        self.routes.iter().map(|(ty, c)| (*ty, *c))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_routes_every_store_event_once() {
        let table = RoutingTable::default();
        let trading = table.events_for(Channel::Trading);
        let reasoning = table.events_for(Channel::Reasoning);

        assert_eq!(reasoning, vec![EventType::AiReasoning]);
        assert_eq!(trading.len() + reasoning.len(), EventType::ALL.len() - 2);
        assert!(table.channel_for(EventType::Ping).is_none());
        assert_eq!(
            table.channel_for(EventType::PriceUpdate),
            Some(Channel::Trading)
        );
    }

    #[test]
    fn test_overrides_move_events() {
        let overrides = HashMap::from([("migration_detected".to_string(), Channel::Reasoning)]);
        let table = RoutingTable::default().with_overrides(&overrides).unwrap();
        assert_eq!(
            table.channel_for(EventType::MigrationDetected),
            Some(Channel::Reasoning)
        );
        assert_eq!(table.channels(), vec![Channel::Trading, Channel::Reasoning]);
    }

    #[test]
    fn test_invalid_overrides_rejected() {
        let unknown = HashMap::from([("nope".to_string(), Channel::Trading)]);
        assert!(RoutingTable::default().with_overrides(&unknown).is_err());

        let control = HashMap::from([("ping".to_string(), Channel::Trading)]);
        assert!(RoutingTable::default().with_overrides(&control).is_err());
    }
}
