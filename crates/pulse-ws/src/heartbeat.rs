//! Heartbeat bookkeeping for push channel connections.
//!
//! Pings go out on a fixed interval while connected. A missing pong is not
//! an error by itself; a dead connection surfaces through the close path.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::Duration;

use pulse_core::now_ms;
use tracing::trace;

/// Ping cadence and liveness timestamps for one connection.
///
/// Timestamps are Unix milliseconds; zero means "not yet".
#[derive(Debug)]
pub struct HeartbeatManager {
    interval_ms: u64,
    pings_sent: AtomicU64,
    last_ping_ms: AtomicI64,
    last_pong_ms: AtomicI64,
    last_message_ms: AtomicI64,
    last_rtt_ms: AtomicI64,
}

impl HeartbeatManager {
    pub fn new(interval_ms: u64) -> Self {
        Self {
            interval_ms,
            pings_sent: AtomicU64::new(0),
            last_ping_ms: AtomicI64::new(0),
            last_pong_ms: AtomicI64::new(0),
            last_message_ms: AtomicI64::new(0),
            last_rtt_ms: AtomicI64::new(-1),
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms.max(1))
    }

    /// Start a fresh connection: the handshake counts as traffic.
    pub fn reset(&self) {
        self.last_ping_ms.store(0, Ordering::Relaxed);
        self.last_pong_ms.store(0, Ordering::Relaxed);
        self.last_rtt_ms.store(-1, Ordering::Relaxed);
        self.last_message_ms.store(now_ms(), Ordering::Relaxed);
    }

    pub fn record_ping(&self) {
        self.pings_sent.fetch_add(1, Ordering::Relaxed);
        self.last_ping_ms.store(now_ms(), Ordering::Relaxed);
    }

    pub fn record_pong(&self) {
        let now = now_ms();
        self.last_pong_ms.store(now, Ordering::Relaxed);
        let ping = self.last_ping_ms.load(Ordering::Relaxed);
        if ping > 0 {
            let rtt = (now - ping).max(0);
            self.last_rtt_ms.store(rtt, Ordering::Relaxed);
            trace!(rtt_ms = rtt, "Pong received");
        }
    }

    pub fn record_message(&self) {
        self.last_message_ms.store(now_ms(), Ordering::Relaxed);
    }

    pub fn stats(&self) -> HeartbeatStats {
        let since = |ms: i64| (ms > 0).then_some(ms);
        let last_message_at = since(self.last_message_ms.load(Ordering::Relaxed));
        let rtt = self.last_rtt_ms.load(Ordering::Relaxed);
        HeartbeatStats {
            pings_sent: self.pings_sent.load(Ordering::Relaxed),
            last_ping_at: since(self.last_ping_ms.load(Ordering::Relaxed)),
            last_pong_at: since(self.last_pong_ms.load(Ordering::Relaxed)),
            last_message_at,
            last_rtt_ms: (rtt >= 0).then_some(rtt),
            idle_ms: last_message_at.map(|t| (now_ms() - t).max(0)),
        }
    }
}

/// Point-in-time heartbeat view, exposed through
/// [`WsClient::heartbeat_stats`](crate::WsClient::heartbeat_stats).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeartbeatStats {
    /// Pings sent over the client's lifetime.
    pub pings_sent: u64,
    pub last_ping_at: Option<i64>,
    pub last_pong_at: Option<i64>,
    /// Any inbound frame on the current connection.
    pub last_message_at: Option<i64>,
    pub last_rtt_ms: Option<i64>,
    /// Time since the last inbound frame.
    pub idle_ms: Option<i64>,
}
