//! Per-event-type listener registry.
//!
//! Handlers are keyed by event type and by a registration id, so removing one
//! subscription never disturbs another consumer's handlers, even for the same
//! event type.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::trace;

use crate::message::WsEnvelope;

/// Event type that matches every envelope.
pub const WILDCARD: &str = "*";

/// Listener callback.
pub type Handler = Arc<dyn Fn(&WsEnvelope) + Send + Sync>;

/// Registry of handlers per event type.
#[derive(Default)]
pub struct ListenerRegistry {
    next_id: AtomicU64,
    handlers: RwLock<HashMap<String, Vec<(u64, Handler)>>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler, returning its registration id.
    pub fn register(&self, event_type: &str, handler: Handler) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.handlers
            .write()
            .entry(event_type.to_string())
            .or_default()
            .push((id, handler));
        trace!(event_type, id, "Listener registered");
        id
    }

    /// Remove exactly the handler registered under `id`.
    ///
    /// Returns `false` if it was already removed.
    pub fn unregister(&self, event_type: &str, id: u64) -> bool {
        let mut handlers = self.handlers.write();
        let Some(list) = handlers.get_mut(event_type) else {
            return false;
        };
        let before = list.len();
        list.retain(|(handler_id, _)| *handler_id != id);
        let removed = list.len() != before;
        if list.is_empty() {
            handlers.remove(event_type);
        }
        removed
    }

    /// Invoke every handler for the envelope's type in registration order,
    /// then the wildcard handlers. Returns the number of handlers invoked.
    ///
    /// The handler list is cloned before invoking, so handlers may register
    /// or unregister listeners without deadlocking.
    pub fn dispatch(&self, envelope: &WsEnvelope) -> usize {
        let targets: Vec<Handler> = {
            let handlers = self.handlers.read();
            handlers
                .get(envelope.event_type.as_str())
                .into_iter()
                .chain(handlers.get(WILDCARD))
                .flat_map(|list| list.iter().map(|(_, h)| h.clone()))
                .collect()
        };

        for handler in &targets {
            handler(envelope);
        }
        targets.len()
    }

    /// Number of handlers registered for an event type.
    pub fn count(&self, event_type: &str) -> usize {
        self.handlers
            .read()
            .get(event_type)
            .map(Vec::len)
            .unwrap_or(0)
    }
}

/// Handle returned by `WsClient::on`.
#[must_use = "dropping a Subscription keeps the handler registered; call unsubscribe() to remove it"]
pub struct Subscription {
    registry: Arc<ListenerRegistry>,
    event_type: String,
    id: u64,
}

impl Subscription {
    pub(crate) fn new(registry: Arc<ListenerRegistry>, event_type: String, id: u64) -> Self {
        Self {
            registry,
            event_type,
            id,
        }
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    /// Remove the handler this subscription registered.
    pub fn unsubscribe(self) -> bool {
        self.registry.unregister(&self.event_type, self.id)
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("event_type", &self.event_type)
            .field("id", &self.id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    fn recorder(log: &Arc<Mutex<Vec<String>>>, tag: &str) -> Handler {
        let log = log.clone();
        let tag = tag.to_string();
        Arc::new(move |env: &WsEnvelope| log.lock().push(format!("{tag}:{}", env.event_type)))
    }

    fn envelope(event_type: &str) -> WsEnvelope {
        WsEnvelope::new(event_type, serde_json::Value::Null, 0)
    }

    #[test]
    fn test_dispatch_in_registration_order() {
        let registry = ListenerRegistry::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        registry.register("price_update", recorder(&log, "a"));
        registry.register("price_update", recorder(&log, "b"));
        registry.register(WILDCARD, recorder(&log, "all"));
        registry.register("position_opened", recorder(&log, "c"));

        let invoked = registry.dispatch(&envelope("price_update"));

        assert_eq!(invoked, 3);
        assert_eq!(
            *log.lock(),
            vec!["a:price_update", "b:price_update", "all:price_update"]
        );
    }

    #[test]
    fn test_unregister_removes_exactly_one() {
        let registry = ListenerRegistry::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        let first = registry.register("price_update", recorder(&log, "a"));
        registry.register("price_update", recorder(&log, "b"));

        assert!(registry.unregister("price_update", first));
        assert!(!registry.unregister("price_update", first));
        assert_eq!(registry.count("price_update"), 1);

        registry.dispatch(&envelope("price_update"));
        assert_eq!(*log.lock(), vec!["b:price_update"]);
    }

    #[test]
    fn test_subscription_handles_are_independent() {
        let registry = Arc::new(ListenerRegistry::new());
        let log = Arc::new(Mutex::new(Vec::new()));

        let id_a = registry.register("stats_update", recorder(&log, "a"));
        let id_b = registry.register("stats_update", recorder(&log, "b"));
        let sub_a = Subscription::new(registry.clone(), "stats_update".to_string(), id_a);
        let _sub_b = Subscription::new(registry.clone(), "stats_update".to_string(), id_b);

        assert!(sub_a.unsubscribe());
        registry.dispatch(&envelope("stats_update"));
        assert_eq!(*log.lock(), vec!["b:stats_update"]);
    }

    #[test]
    fn test_handler_may_register_during_dispatch() {
        let registry = Arc::new(ListenerRegistry::new());
        let inner = registry.clone();
        registry.register(
            "connected",
            Arc::new(move |_env: &WsEnvelope| {
                inner.register("late", Arc::new(|_env: &WsEnvelope| {}));
            }),
        );

        registry.dispatch(&envelope("connected"));
        assert_eq!(registry.count("late"), 1);
    }
}
