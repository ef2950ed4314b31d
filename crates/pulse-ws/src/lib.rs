//! Push channel transport for the Pulse dashboard client.
//!
//! Provides WebSocket connectivity with:
//! - Automatic reconnection with exponential backoff and an attempt cap
//! - Per-event-type listener fan-out with exact unsubscribe
//! - Periodic heartbeat pings
//! - One shared connection per path through [`TransportManager`]

pub mod client;
pub mod error;
pub mod heartbeat;
pub mod listeners;
pub mod manager;
pub mod message;

pub use client::{ClientConfig, WsClient};
pub use error::{WsError, WsResult};
pub use heartbeat::{HeartbeatManager, HeartbeatStats};
pub use listeners::{Handler, ListenerRegistry, Subscription, WILDCARD};
pub use manager::{TransportConfig, TransportManager};
pub use message::{OutboundMessage, WsEnvelope};

use std::sync::Once;

static INIT_CRYPTO: Once = Once::new();

/// Initialize the TLS crypto provider.
/// Must be called before any WebSocket connections are made.
pub fn init_crypto() {
    INIT_CRYPTO.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}
