//! Prometheus metrics for the Pulse client.
//!
//! Metrics live in a dedicated registry installed once per process with
//! [`Metrics::install`]. The static recorders (`Metrics::event_applied`, ...)
//! are no-ops until then, so library crates can record unconditionally and
//! tests never need a global registry.

use once_cell::sync::OnceCell;
use prometheus::{
    Encoder, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry, TextEncoder,
};

use crate::error::TelemetryResult;

static METRICS: OnceCell<Metrics> = OnceCell::new();

/// Connection status values exported by the `pulse_connection_status` gauge.
const CONNECTION_STATES: [&str; 4] = ["connecting", "connected", "disconnected", "error"];

/// Client metrics.
pub struct Metrics {
    registry: Registry,
    /// Push events applied to the store. Labels: event_type
    events_applied: IntCounterVec,
    /// Push events dropped. Labels: event_type, reason (malformed/unrouted/noop)
    events_dropped: IntCounterVec,
    /// Snapshot fetches. Labels: reason (initial/reconnect/fallback/resync), outcome
    snapshot_fetches: IntCounterVec,
    /// Reconnect attempts requested by the controller. Labels: path
    reconnects: IntCounterVec,
    /// Failed user actions. Labels: action
    action_failures: IntCounterVec,
    /// Side-effect intents executed. Labels: intent, outcome
    intents: IntCounterVec,
    /// Connection status per path (1 = active state). Labels: path, state
    connection_status: IntGaugeVec,
    /// Connected view server clients.
    view_clients: IntGauge,
}

impl Metrics {
    /// Create a metrics set with its own registry.
    pub fn new() -> TelemetryResult<Self> {
        let registry = Registry::new();

        let events_applied = IntCounterVec::new(
            Opts::new("pulse_events_applied_total", "Push events applied to the store"),
            &["event_type"],
        )?;
        let events_dropped = IntCounterVec::new(
            Opts::new("pulse_events_dropped_total", "Push events dropped"),
            &["event_type", "reason"],
        )?;
        let snapshot_fetches = IntCounterVec::new(
            Opts::new("pulse_snapshot_fetches_total", "Snapshot fetches by reason"),
            &["reason", "outcome"],
        )?;
        let reconnects = IntCounterVec::new(
            Opts::new("pulse_reconnects_total", "Reconnect attempts requested"),
            &["path"],
        )?;
        let action_failures = IntCounterVec::new(
            Opts::new("pulse_action_failures_total", "Failed user actions"),
            &["action"],
        )?;
        let intents = IntCounterVec::new(
            Opts::new("pulse_intents_total", "Side-effect intents executed"),
            &["intent", "outcome"],
        )?;
        let connection_status = IntGaugeVec::new(
            Opts::new(
                "pulse_connection_status",
                "Connection status per path (1=active state)",
            ),
            &["path", "state"],
        )?;
        let view_clients = IntGauge::new("pulse_view_clients", "Connected view server clients")?;

        registry.register(Box::new(events_applied.clone()))?;
        registry.register(Box::new(events_dropped.clone()))?;
        registry.register(Box::new(snapshot_fetches.clone()))?;
        registry.register(Box::new(reconnects.clone()))?;
        registry.register(Box::new(action_failures.clone()))?;
        registry.register(Box::new(intents.clone()))?;
        registry.register(Box::new(connection_status.clone()))?;
        registry.register(Box::new(view_clients.clone()))?;

        Ok(Self {
            registry,
            events_applied,
            events_dropped,
            snapshot_fetches,
            reconnects,
            action_failures,
            intents,
            connection_status,
            view_clients,
        })
    }

    /// Install the process-wide metrics set (idempotent).
    pub fn install() -> TelemetryResult<&'static Metrics> {
        METRICS.get_or_try_init(Self::new)
    }

    /// The installed metrics set, if any.
    pub fn global() -> Option<&'static Metrics> {
        METRICS.get()
    }

    /// Render every metric in the Prometheus text format.
    pub fn encode(&self) -> TelemetryResult<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }

    /// Render the installed metrics, or an empty string if none are installed.
    pub fn encode_global() -> TelemetryResult<String> {
        match Self::global() {
            Some(metrics) => metrics.encode(),
            None => Ok(String::new()),
        }
    }

    // ------------------------------------------------------------------
    // Instance recorders
    // ------------------------------------------------------------------

    pub fn record_event_applied(&self, event_type: &str) {
        self.events_applied.with_label_values(&[event_type]).inc();
    }

    pub fn record_event_dropped(&self, event_type: &str, reason: &str) {
        self.events_dropped
            .with_label_values(&[event_type, reason])
            .inc();
    }

    pub fn record_snapshot_fetch(&self, reason: &str, success: bool) {
        let outcome = if success { "ok" } else { "error" };
        self.snapshot_fetches
            .with_label_values(&[reason, outcome])
            .inc();
    }

    pub fn record_reconnect(&self, path: &str) {
        self.reconnects.with_label_values(&[path]).inc();
    }

    pub fn record_action_failure(&self, action: &str) {
        self.action_failures.with_label_values(&[action]).inc();
    }

    pub fn record_intent(&self, intent: &str, success: bool) {
        let outcome = if success { "ok" } else { "error" };
        self.intents.with_label_values(&[intent, outcome]).inc();
    }

    /// Only the active state is set to 1; all others to 0.
    pub fn record_connection_status(&self, path: &str, state: &str) {
        for s in CONNECTION_STATES {
            self.connection_status
                .with_label_values(&[path, s])
                .set(i64::from(s == state));
        }
    }

    pub fn set_view_clients(&self, count: usize) {
        self.view_clients.set(count as i64);
    }

    // ------------------------------------------------------------------
    // Global recorders
    // ------------------------------------------------------------------

    /// Record a push event applied to the store.
    pub fn event_applied(event_type: &str) {
        if let Some(m) = Self::global() {
            m.record_event_applied(event_type);
        }
    }

    /// Record a dropped push event.
    pub fn event_dropped(event_type: &str, reason: &str) {
        if let Some(m) = Self::global() {
            m.record_event_dropped(event_type, reason);
        }
    }

    /// Record a snapshot fetch.
    pub fn snapshot_fetch(reason: &str, success: bool) {
        if let Some(m) = Self::global() {
            m.record_snapshot_fetch(reason, success);
        }
    }

    /// Record a controller-initiated reconnect.
    pub fn reconnect(path: &str) {
        if let Some(m) = Self::global() {
            m.record_reconnect(path);
        }
    }

    /// Record a failed user action.
    pub fn action_failure(action: &str) {
        if let Some(m) = Self::global() {
            m.record_action_failure(action);
        }
    }

    /// Record an executed intent.
    pub fn intent(intent: &str, success: bool) {
        if let Some(m) = Self::global() {
            m.record_intent(intent, success);
        }
    }

    /// Record the connection status of a path.
    pub fn connection_status(path: &str, state: &str) {
        if let Some(m) = Self::global() {
            m.record_connection_status(path, state);
        }
    }

    /// Record the number of view server clients.
    pub fn view_clients(count: usize) {
        if let Some(m) = Self::global() {
            m.set_view_clients(count);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_contains_recorded_series() {
        let metrics = Metrics::new().unwrap();
        metrics.record_event_applied("price_update");
        metrics.record_event_dropped("price_update", "malformed");
        metrics.record_snapshot_fetch("reconnect", true);

        let text = metrics.encode().unwrap();
        assert!(text.contains("pulse_events_applied_total{event_type=\"price_update\"} 1"));
        assert!(text.contains("reason=\"malformed\""));
        assert!(text.contains("pulse_snapshot_fetches_total"));
    }

    #[test]
    fn test_connection_status_is_one_hot() {
        let metrics = Metrics::new().unwrap();
        metrics.record_connection_status("/ws/trading", "connected");
        metrics.record_connection_status("/ws/trading", "error");

        let text = metrics.encode().unwrap();
        assert!(text.contains(
            "pulse_connection_status{path=\"/ws/trading\",state=\"error\"} 1"
        ));
        assert!(text.contains(
            "pulse_connection_status{path=\"/ws/trading\",state=\"connected\"} 0"
        ));
    }

    #[test]
    fn test_independent_instances_do_not_collide() {
        assert!(Metrics::new().is_ok());
        assert!(Metrics::new().is_ok());
    }
}
