//! Push channel client.
//!
//! Handles connection lifecycle, automatic reconnection with exponential
//! backoff, heartbeat pings, and fan-out of inbound envelopes to listeners.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use parking_lot::{Mutex, RwLock};
use pulse_core::ConnectionStatus;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async_tls_with_config, tungstenite::Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::WsResult;
use crate::heartbeat::{HeartbeatManager, HeartbeatStats};
use crate::listeners::{Handler, ListenerRegistry, Subscription};
use crate::message::{OutboundMessage, WsEnvelope};

/// Capacity of the outbound queue per connection.
const OUTBOUND_CAPACITY: usize = 100;

/// Client configuration for one path.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Full WebSocket URL (base + path).
    pub url: String,
    /// Logical path name, used in logs.
    pub path: String,
    /// Maximum reconnection attempts after a drop before giving up.
    pub max_reconnect_attempts: u32,
    /// Base delay for exponential backoff.
    pub reconnect_base_delay_ms: u64,
    /// Maximum delay for exponential backoff.
    pub reconnect_max_delay_ms: u64,
    /// Heartbeat ping interval.
    pub heartbeat_interval_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            path: String::new(),
            max_reconnect_attempts: 5,
            reconnect_base_delay_ms: 1000,
            reconnect_max_delay_ms: 30_000,
            heartbeat_interval_ms: 30_000,
        }
    }
}

impl ClientConfig {
    /// Backoff delay before reconnection attempt `attempt` (1-based).
    ///
    /// attempt=1 -> base, attempt=2 -> 2*base, attempt=3 -> 4*base, capped.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let delay = self
            .reconnect_base_delay_ms
            .saturating_mul(1u64 << exponent)
            .min(self.reconnect_max_delay_ms);
        Duration::from_millis(delay)
    }
}

/// How a connected session ended.
enum SessionEnd {
    /// `disconnect()` was called.
    Shutdown,
    /// The server closed the connection or the stream ended.
    Closed,
}

/// A running connection task.
struct Session {
    token: CancellationToken,
    task: JoinHandle<()>,
}

struct Inner {
    config: ClientConfig,
    status_tx: watch::Sender<ConnectionStatus>,
    listeners: Arc<ListenerRegistry>,
    client_id: RwLock<Option<String>>,
    outbound: RwLock<Option<mpsc::Sender<String>>>,
    session: Mutex<Option<Session>>,
    heartbeat: HeartbeatManager,
    reconnect_count: AtomicU32,
}

/// Push channel client for one path.
///
/// Cheap to clone; clones share the same connection and listener registry.
#[derive(Clone)]
pub struct WsClient {
    inner: Arc<Inner>,
}

impl WsClient {
    /// Create a disconnected client.
    pub fn new(config: ClientConfig) -> Self {
        let (status_tx, _) = watch::channel(ConnectionStatus::Disconnected);
        let heartbeat = HeartbeatManager::new(config.heartbeat_interval_ms);
        Self {
            inner: Arc::new(Inner {
                config,
                status_tx,
                listeners: Arc::new(ListenerRegistry::new()),
                client_id: RwLock::new(None),
                outbound: RwLock::new(None),
                session: Mutex::new(None),
                heartbeat,
                reconnect_count: AtomicU32::new(0),
            }),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Current connection status.
    pub fn status(&self) -> ConnectionStatus {
        *self.inner.status_tx.borrow()
    }

    /// Watch status transitions.
    pub fn subscribe_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.inner.status_tx.subscribe()
    }

    /// Client id assigned by the server on the last `connected` message.
    pub fn client_id(&self) -> Option<String> {
        self.inner.client_id.read().clone()
    }

    /// Ping cadence and liveness of the current connection.
    pub fn heartbeat_stats(&self) -> HeartbeatStats {
        self.inner.heartbeat.stats()
    }

    /// Reconnection attempts since the last successful connection.
    pub fn reconnect_count(&self) -> u32 {
        self.inner.reconnect_count.load(Ordering::Relaxed)
    }

    /// Whether a connection task is alive (connecting, connected or backing off).
    pub fn is_running(&self) -> bool {
        self.inner
            .session
            .lock()
            .as_ref()
            .is_some_and(|s| !s.task.is_finished())
    }

    /// Whether `other` shares this client's connection.
    pub fn same_connection(&self, other: &WsClient) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Start the connection task.
    ///
    /// No-op while a task is already alive. Must be called within a tokio
    /// runtime.
    pub fn connect(&self) {
        let mut session = self.inner.session.lock();
        if session.as_ref().is_some_and(|s| !s.task.is_finished()) {
            debug!(path = %self.inner.config.path, "Connect ignored, session already running");
            return;
        }

        self.inner.reconnect_count.store(0, Ordering::Relaxed);
        self.inner.set_status(ConnectionStatus::Connecting);

        let token = CancellationToken::new();
        let inner = self.inner.clone();
        let task = tokio::spawn(run_session(inner, token.clone()));
        *session = Some(Session { token, task });
    }

    /// Close the connection and suppress reconnection until the next `connect()`.
    pub fn disconnect(&self) {
        if let Some(session) = self.inner.session.lock().take() {
            info!(path = %self.inner.config.path, "Disconnect requested");
            session.token.cancel();
        }
        *self.inner.outbound.write() = None;
        self.inner.set_status(ConnectionStatus::Disconnected);
    }

    /// Register a handler for one event type (or [`crate::WILDCARD`]).
    pub fn on<F>(&self, event_type: &str, handler: F) -> Subscription
    where
        F: Fn(&WsEnvelope) + Send + Sync + 'static,
    {
        let handler: Handler = Arc::new(handler);
        let id = self.inner.listeners.register(event_type, handler);
        Subscription::new(self.inner.listeners.clone(), event_type.to_string(), id)
    }

    /// Number of handlers for an event type.
    pub fn listener_count(&self, event_type: &str) -> usize {
        self.inner.listeners.count(event_type)
    }

    /// Send a message. Logs a warning and returns `false` when not connected.
    pub fn emit(&self, event_type: &str, data: serde_json::Value) -> bool {
        let text = match OutboundMessage::new(event_type, data).to_text() {
            Ok(text) => text,
            Err(e) => {
                warn!(event_type, error = %e, "Failed to serialize outbound message");
                return false;
            }
        };
        self.inner.send_text(text)
    }
}

impl std::fmt::Debug for WsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WsClient")
            .field("path", &self.inner.config.path)
            .field("status", &self.status())
            .finish()
    }
}

impl Inner {
    fn set_status(&self, status: ConnectionStatus) {
        let changed = self.status_tx.send_if_modified(|current| {
            if *current == status {
                false
            } else {
                *current = status;
                true
            }
        });
        if changed {
            debug!(path = %self.config.path, %status, "Connection status changed");
        }
    }

    fn send_text(&self, text: String) -> bool {
        if !self.status_tx.borrow().is_connected() {
            warn!(path = %self.config.path, "Not connected, dropping outbound message");
            return false;
        }
        let Some(tx) = self.outbound.read().clone() else {
            warn!(path = %self.config.path, "No outbound channel, dropping message");
            return false;
        };
        match tx.try_send(text) {
            Ok(()) => true,
            Err(e) => {
                warn!(path = %self.config.path, error = %e, "Outbound queue rejected message");
                false
            }
        }
    }

    async fn connect_once(&self, token: &CancellationToken) -> WsResult<SessionEnd> {
        info!(path = %self.config.path, url = %self.config.url, "Connecting to WebSocket");

        let (ws_stream, _response) = tokio::select! {
            result = connect_async_tls_with_config(self.config.url.as_str(), None, true, None) => result?,
            () = token.cancelled() => return Ok(SessionEnd::Shutdown),
        };
        let (mut write, mut read) = ws_stream.split();

        let (outbound_tx, mut outbound_rx) = mpsc::channel::<String>(OUTBOUND_CAPACITY);
        *self.outbound.write() = Some(outbound_tx);
        self.reconnect_count.store(0, Ordering::Relaxed);
        self.heartbeat.reset();
        self.set_status(ConnectionStatus::Connected);
        info!(path = %self.config.path, "WebSocket connected");

        let period = self.heartbeat.interval();
        let mut heartbeat = tokio::time::interval_at(tokio::time::Instant::now() + period, period);

        let result = loop {
            tokio::select! {
                biased;

                () = token.cancelled() => {
                    info!(path = %self.config.path, "Shutdown signal received in message loop");
                    if let Err(e) = write.send(Message::Close(None)).await {
                        warn!(?e, "Failed to send Close frame during shutdown");
                    }
                    break Ok(SessionEnd::Shutdown);
                }

                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => self.handle_text_message(&text),
                        Some(Ok(Message::Ping(data))) => {
                            if let Err(e) = write.send(Message::Pong(data)).await {
                                break Err(e.into());
                            }
                        }
                        Some(Ok(Message::Pong(_))) => self.heartbeat.record_pong(),
                        Some(Ok(Message::Close(frame))) => {
                            let (code, reason): (u16, String) = frame
                                .map(|f| (f.code.into(), f.reason.to_string()))
                                .unwrap_or((1000, "Normal close".to_string()));
                            warn!(path = %self.config.path, code, %reason, "WebSocket closed by server");
                            break Ok(SessionEnd::Closed);
                        }
                        Some(Err(e)) => {
                            error!(path = %self.config.path, ?e, "WebSocket read error");
                            break Err(e.into());
                        }
                        None => {
                            warn!(path = %self.config.path, "WebSocket stream ended");
                            break Ok(SessionEnd::Closed);
                        }
                        _ => {}
                    }
                }

                Some(text) = outbound_rx.recv() => {
                    if let Err(e) = write.send(Message::Text(text)).await {
                        break Err(e.into());
                    }
                }

                _ = heartbeat.tick() => {
                    match OutboundMessage::ping().to_text() {
                        Ok(ping) => {
                            if let Err(e) = write.send(Message::Text(ping)).await {
                                break Err(e.into());
                            }
                            self.heartbeat.record_ping();
                        }
                        Err(e) => warn!(error = %e, "Failed to serialize ping"),
                    }
                }
            }
        };

        *self.outbound.write() = None;
        result
    }

    fn handle_text_message(&self, text: &str) {
        self.heartbeat.record_message();

        let envelope = match WsEnvelope::parse(text) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(path = %self.config.path, error = %e, "Dropping malformed message");
                return;
            }
        };

        match envelope.event_type.as_str() {
            "connected" => {
                if let Some(id) = envelope.assigned_client_id() {
                    info!(path = %self.config.path, client_id = %id, "Client id assigned");
                    *self.client_id.write() = Some(id);
                }
            }
            "pong" => self.heartbeat.record_pong(),
            _ => {}
        }

        self.listeners.dispatch(&envelope);
    }
}

/// Connection task: connect, run, and reconnect with backoff until the
/// attempt cap is reached or the token is cancelled.
async fn run_session(inner: Arc<Inner>, token: CancellationToken) {
    loop {
        if token.is_cancelled() {
            inner.set_status(ConnectionStatus::Disconnected);
            return;
        }

        inner.set_status(ConnectionStatus::Connecting);

        match inner.connect_once(&token).await {
            Ok(SessionEnd::Shutdown) => {
                inner.set_status(ConnectionStatus::Disconnected);
                return;
            }
            Ok(SessionEnd::Closed) => {
                inner.set_status(ConnectionStatus::Disconnected);
            }
            Err(e) => {
                error!(path = %inner.config.path, error = %e, "WebSocket connection error");
                inner.set_status(ConnectionStatus::Error);
            }
        }

        if token.is_cancelled() {
            inner.set_status(ConnectionStatus::Disconnected);
            return;
        }

        let attempt = inner.reconnect_count.fetch_add(1, Ordering::Relaxed) + 1;
        if attempt > inner.config.max_reconnect_attempts {
            error!(
                path = %inner.config.path,
                attempts = attempt - 1,
                "Max reconnection attempts reached, giving up"
            );
            inner.set_status(ConnectionStatus::Error);
            return;
        }

        let delay = inner.config.backoff_delay(attempt);
        warn!(
            path = %inner.config.path,
            attempt,
            delay_ms = delay.as_millis() as u64,
            "Reconnecting"
        );

        tokio::select! {
            () = tokio::time::sleep(delay) => {}
            () = token.cancelled() => {
                info!(path = %inner.config.path, "Shutdown requested during backoff");
                inner.set_status(ConnectionStatus::Disconnected);
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.max_reconnect_attempts, 5);
        assert_eq!(config.reconnect_base_delay_ms, 1000);
        assert_eq!(config.heartbeat_interval_ms, 30_000);
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let config = ClientConfig {
            reconnect_base_delay_ms: 1000,
            reconnect_max_delay_ms: 10_000,
            ..Default::default()
        };
        assert_eq!(config.backoff_delay(1), Duration::from_millis(1000));
        assert_eq!(config.backoff_delay(2), Duration::from_millis(2000));
        assert_eq!(config.backoff_delay(3), Duration::from_millis(4000));
        assert_eq!(config.backoff_delay(4), Duration::from_millis(8000));
        assert_eq!(config.backoff_delay(5), Duration::from_millis(10_000));
        assert_eq!(config.backoff_delay(60), Duration::from_millis(10_000));
    }

    #[test]
    fn test_emit_when_disconnected_is_noop() {
        let client = WsClient::new(ClientConfig::default());
        assert_eq!(client.status(), ConnectionStatus::Disconnected);
        assert!(!client.emit("ping", serde_json::json!({})));
    }

    #[test]
    fn test_on_returns_removable_subscription() {
        let client = WsClient::new(ClientConfig::default());
        let sub = client.on("price_update", |_env| {});
        let _other = client.on("price_update", |_env| {});
        assert_eq!(client.listener_count("price_update"), 2);

        assert!(sub.unsubscribe());
        assert_eq!(client.listener_count("price_update"), 1);
    }

    #[test]
    fn test_malformed_text_is_dropped() {
        let client = WsClient::new(ClientConfig::default());
        let hits = Arc::new(AtomicU32::new(0));
        let counter = hits.clone();
        let _sub = client.on(crate::WILDCARD, move |_env| {
            counter.fetch_add(1, Ordering::Relaxed);
        });

        client.inner.handle_text_message("{not json");
        client
            .inner
            .handle_text_message(r#"{"type":"connected","data":{},"clientId":"abc"}"#);

        assert_eq!(hits.load(Ordering::Relaxed), 1);
        assert_eq!(client.client_id().as_deref(), Some("abc"));
    }

    #[tokio::test]
    async fn test_connect_is_idempotent() {
        let client = WsClient::new(ClientConfig {
            url: "ws://127.0.0.1:9".to_string(),
            path: "test".to_string(),
            max_reconnect_attempts: 50,
            reconnect_base_delay_ms: 10_000,
            ..Default::default()
        });

        client.connect();
        assert!(client.is_running());
        let first_token = client
            .inner
            .session
            .lock()
            .as_ref()
            .map(|s| s.token.clone());

        client.connect();
        let second_token = client
            .inner
            .session
            .lock()
            .as_ref()
            .map(|s| s.token.clone());

        // Same session: cancelling the first token cancels the live one.
        first_token.unwrap().cancel();
        assert!(second_token.unwrap().is_cancelled());

        client.disconnect();
        assert_eq!(client.status(), ConnectionStatus::Disconnected);
    }
}
