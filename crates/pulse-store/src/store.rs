//! The store: serialized reductions over a shared immutable state.

use std::sync::Arc;

use parking_lot::Mutex;
use pulse_core::EventType;
use pulse_telemetry::Metrics;
use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tracing::{debug, trace, warn};

use crate::config::StoreConfig;
use crate::event::{PushEvent, StoreEvent};
use crate::intent::Intent;
use crate::reducer::{reduce, Reduction};
use crate::state::TradingState;

struct Inner {
    config: StoreConfig,
    current: Mutex<Arc<TradingState>>,
    published: watch::Sender<Arc<TradingState>>,
    outbox: mpsc::UnboundedSender<Intent>,
}

/// Owner of the reconciled state.
///
/// Every mutation goes through [`Store::dispatch`], which holds the state lock
/// for one reduction so concurrent writers apply sequentially, each on top of
/// the latest state. Subscribers get each new state through a `watch`
/// channel; intents go to the outbox returned by [`Store::new`].
#[derive(Clone)]
pub struct Store {
    inner: Arc<Inner>,
}

impl Store {
    pub fn new(config: StoreConfig) -> (Self, mpsc::UnboundedReceiver<Intent>) {
        let initial = Arc::new(TradingState::default());
        let (published, _) = watch::channel(Arc::clone(&initial));
        let (outbox, intents) = mpsc::unbounded_channel();
        let store = Self {
            inner: Arc::new(Inner {
                config,
                current: Mutex::new(initial),
                published,
                outbox,
            }),
        };
        (store, intents)
    }

    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    /// Current state.
    pub fn state(&self) -> Arc<TradingState> {
        Arc::clone(&self.inner.current.lock())
    }

    /// Receive every published state.
    pub fn subscribe(&self) -> watch::Receiver<Arc<TradingState>> {
        self.inner.published.subscribe()
    }

    /// Apply one event. Returns whether the state changed.
    pub fn dispatch(&self, event: StoreEvent) -> bool {
        let name = event.name();
        let intents = {
            let mut current = self.inner.current.lock();
            let Reduction {
                state,
                intents,
                changed,
            } = reduce(&current, event, &self.inner.config);
            if !changed {
                trace!(event = name, "No state change");
                return false;
            }
            let next = Arc::new(state);
            *current = Arc::clone(&next);
            self.inner.published.send_replace(next);
            intents
        };

        for intent in intents {
            debug!(intent = intent.name(), "Queueing intent");
            if self.inner.outbox.send(intent).is_err() {
                warn!(event = name, "Intent outbox closed, dropping intent");
            }
        }
        true
    }

    /// Parse and apply a push event by wire name.
    ///
    /// Unknown or malformed events are logged and dropped; the state is left
    /// untouched.
    pub fn apply_push(&self, event_type: &str, data: &Value, timestamp: i64) -> bool {
        let Ok(ty) = event_type.parse::<EventType>() else {
            debug!(event_type, "Ignoring unknown event type");
            Metrics::event_dropped(event_type, "unknown");
            return false;
        };

        let event = match PushEvent::parse(ty, data) {
            Ok(event) => event,
            Err(e) => {
                warn!(event_type, error = %e, "Dropping malformed push event");
                Metrics::event_dropped(ty.as_str(), "malformed");
                return false;
            }
        };

        let changed = self.dispatch(StoreEvent::Push {
            event,
            timestamp,
            raw: data.clone(),
        });
        if changed {
            Metrics::event_applied(ty.as_str());
        } else {
            Metrics::event_dropped(ty.as_str(), "noop");
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulse_core::{Decision, PositionStatus};
    use serde_json::json;

    #[test]
    fn test_dispatch_publishes_to_subscribers() {
        let (store, _intents) = Store::new(StoreConfig::default());
        let mut rx = store.subscribe();

        assert!(store.apply_push(
            "position_opened",
            &json!({"id": "p1", "mint": "A", "symbol": "AAA"}),
            1_000
        ));
        assert!(rx.has_changed().unwrap());
        let published = rx.borrow_and_update().clone();
        assert_eq!(published.positions.len(), 1);
        assert!(Arc::ptr_eq(&published, &store.state()));
    }

    #[test]
    fn test_malformed_and_unknown_events_are_dropped() {
        let (store, _intents) = Store::new(StoreConfig::default());
        let before = store.state();

        assert!(!store.apply_push("price_update", &json!({"price": "nope"}), 1));
        assert!(!store.apply_push("position_closed", &json!([1, 2, 3]), 1));
        assert!(!store.apply_push("not_an_event", &json!({}), 1));
        assert!(!store.apply_push("ping", &json!({}), 1));

        assert!(Arc::ptr_eq(&before, &store.state()));
    }

    #[test]
    fn test_intents_reach_outbox() {
        let (store, mut intents) = Store::new(StoreConfig::default());
        store.apply_push("migration_detected", &json!({"mint": "M", "symbol": "MM"}), 1);
        store.apply_push(
            "ai_reasoning",
            &json!({"mint": "M", "decision": "PASS", "confidence": 0.9}),
            2,
        );
        assert_eq!(
            store.state().migration("M").unwrap().ai.as_ref().unwrap().decision,
            Decision::Pass
        );

        for n in 0..5 {
            store.apply_push(
                "wallet_buy_detected",
                &json!({"mint": "M", "wallet": format!("w{n}"), "timestamp": 10 + n}),
                10 + n,
            );
        }

        assert_eq!(
            intents.try_recv().unwrap(),
            Intent::Reanalyze {
                mint: "M".to_string()
            }
        );
        assert!(intents.try_recv().is_err());
    }

    #[test]
    fn test_concurrent_writers_apply_sequentially() {
        let (store, _intents) = Store::new(StoreConfig::default());
        let handles: Vec<_> = (0..8)
            .map(|n| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for k in 0..25 {
                        store.apply_push(
                            "position_opened",
                            &json!({"id": format!("p{n}-{k}"), "mint": format!("M{n}-{k}")}),
                            1,
                        );
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let state = store.state();
        assert_eq!(state.positions.len(), 200);
        assert_eq!(state.version, 200);
        assert!(state
            .positions
            .iter()
            .all(|p| p.status == PositionStatus::Open));
    }
}
