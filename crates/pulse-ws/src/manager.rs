//! One shared client per path.

use dashmap::DashMap;
use tracing::info;

use crate::client::{ClientConfig, WsClient};

/// Transport settings shared by every path.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Base WebSocket URL, e.g. `ws://localhost:3001`.
    pub base_url: String,
    pub max_reconnect_attempts: u32,
    pub reconnect_base_delay_ms: u64,
    pub reconnect_max_delay_ms: u64,
    pub heartbeat_interval_ms: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        let client = ClientConfig::default();
        Self {
            base_url: "ws://localhost:3001".to_string(),
            max_reconnect_attempts: client.max_reconnect_attempts,
            reconnect_base_delay_ms: client.reconnect_base_delay_ms,
            reconnect_max_delay_ms: client.reconnect_max_delay_ms,
            heartbeat_interval_ms: client.heartbeat_interval_ms,
        }
    }
}

impl TransportConfig {
    /// Full URL for a path: base without trailing `/` plus a `/`-prefixed path.
    pub fn url_for(&self, path: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        if path.starts_with('/') {
            format!("{base}{path}")
        } else {
            format!("{base}/{path}")
        }
    }

    fn client_config(&self, path: &str) -> ClientConfig {
        ClientConfig {
            url: self.url_for(path),
            path: path.to_string(),
            max_reconnect_attempts: self.max_reconnect_attempts,
            reconnect_base_delay_ms: self.reconnect_base_delay_ms,
            reconnect_max_delay_ms: self.reconnect_max_delay_ms,
            heartbeat_interval_ms: self.heartbeat_interval_ms,
        }
    }
}

/// Owns the client for each path; asking twice for a path returns the same
/// connection.
pub struct TransportManager {
    config: TransportConfig,
    clients: DashMap<String, WsClient>,
}

impl TransportManager {
    pub fn new(config: TransportConfig) -> Self {
        Self {
            config,
            clients: DashMap::new(),
        }
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Client for `path`, created on first use.
    pub fn client(&self, path: &str) -> WsClient {
        self.clients
            .entry(path.to_string())
            .or_insert_with(|| WsClient::new(self.config.client_config(path)))
            .clone()
    }

    /// Existing client for `path`, if any.
    pub fn get(&self, path: &str) -> Option<WsClient> {
        self.clients.get(path).map(|c| c.clone())
    }

    /// Paths with a client.
    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.clients.iter().map(|e| e.key().clone()).collect();
        paths.sort();
        paths
    }

    /// Connect every client. Already-running clients are left alone.
    pub fn connect_all(&self) {
        for entry in self.clients.iter() {
            entry.value().connect();
        }
    }

    /// Disconnect and forget every client.
    pub fn dispose(&self) {
        let clients: Vec<WsClient> = self.clients.iter().map(|e| e.value().clone()).collect();
        self.clients.clear();
        for client in clients {
            client.disconnect();
        }
        info!("Transport disposed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joining() {
        let config = TransportConfig {
            base_url: "ws://host:3001/".to_string(),
            ..Default::default()
        };
        assert_eq!(config.url_for("/ws/trading"), "ws://host:3001/ws/trading");
        assert_eq!(config.url_for("ws/reasoning"), "ws://host:3001/ws/reasoning");
    }

    #[test]
    fn test_same_path_shares_client() {
        let manager = TransportManager::new(TransportConfig::default());
        let a = manager.client("/ws/trading");
        let b = manager.client("/ws/trading");
        let c = manager.client("/ws/reasoning");

        assert!(a.same_connection(&b));
        assert!(!a.same_connection(&c));
        assert_eq!(manager.paths(), vec!["/ws/reasoning", "/ws/trading"]);
    }

    #[test]
    fn test_dispose_forgets_clients() {
        let manager = TransportManager::new(TransportConfig::default());
        let first = manager.client("/ws/trading");
        manager.dispose();

        assert!(manager.get("/ws/trading").is_none());
        let second = manager.client("/ws/trading");
        assert!(!first.same_connection(&second));
    }
}
