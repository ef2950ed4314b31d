//! Application composition root.
//!
//! Builds the transport, backend client and store, routes push events into
//! the store, and runs the background tasks:
//! - status forwarders (one per channel)
//! - effect runner
//! - sync controller
//! - view server (optional)

use std::sync::Arc;

use pulse_api::{DynBackend, HttpBackend, SnapshotFetcher};
use pulse_core::{now_ms, EventType};
use pulse_dashboard::DynActionHandler;
use pulse_store::{Channel, Intent, RoutingTable, Store, StoreEvent};
use pulse_telemetry::Metrics;
use pulse_ws::{Subscription, TransportManager, WsClient, WsEnvelope};
use serde_json::json;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::config::AppConfig;
use crate::controller::{FetchLatch, ResyncHandle, SyncController};
use crate::dispatcher::ActionDispatcher;
use crate::effects::run_effects;
use crate::error::AppResult;

/// Main application.
pub struct Application {
    config: AppConfig,
    routes: RoutingTable,
    transport: TransportManager,
    backend: DynBackend,
    store: Store,
    intents: mpsc::UnboundedReceiver<Intent>,
    latch: Arc<FetchLatch>,
    shutdown: CancellationToken,
}

impl Application {
    /// Create an application talking to the configured backend.
    pub fn new(config: AppConfig) -> AppResult<Self> {
        let backend: DynBackend = Arc::new(HttpBackend::new(config.backend_config())?);
        Self::with_backend(config, backend)
    }

    /// Create an application over an existing backend.
    pub fn with_backend(config: AppConfig, backend: DynBackend) -> AppResult<Self> {
        let routes = config.routing_table()?;
        let transport = TransportManager::new(config.transport_config());
        let (store, intents) = Store::new(config.store.clone());
        Ok(Self {
            config,
            routes,
            transport,
            backend,
            store,
            intents,
            latch: Arc::new(FetchLatch::new()),
            shutdown: CancellationToken::new(),
        })
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn transport(&self) -> &TransportManager {
        &self.transport
    }

    /// Token that stops [`Application::run`] when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    fn client(&self, channel: Channel) -> WsClient {
        self.transport.client(self.config.path_for(channel))
    }

    /// Register one handler per routed event type on its channel's client.
    fn route_events(&self) -> Vec<Subscription> {
        let mut subscriptions = Vec::new();
        for (event_type, channel) in self.routes.routes() {
            let client = self.client(channel);
            let store = self.store.clone();
            let subscription = client.on(event_type.as_str(), move |envelope: &WsEnvelope| {
                let timestamp = if envelope.timestamp > 0 {
                    envelope.timestamp
                } else {
                    now_ms()
                };
                if event_type == EventType::Connected {
                    let data = json!({ "client_id": envelope.assigned_client_id() });
                    store.apply_push(&envelope.event_type, &data, timestamp);
                } else {
                    store.apply_push(&envelope.event_type, &envelope.data, timestamp);
                }
            });
            subscriptions.push(subscription);
        }
        debug!(count = subscriptions.len(), "Push events routed");
        subscriptions
    }

    /// Mirror each channel's status into the store and metrics.
    fn spawn_status_forwarders(&self) -> Vec<JoinHandle<()>> {
        [Channel::Trading, Channel::Reasoning]
            .into_iter()
            .map(|channel| {
                let client = self.client(channel);
                let path = client.config().path.clone();
                let store = self.store.clone();
                let cancel = self.shutdown.clone();
                let mut status_rx = client.subscribe_status();
                tokio::spawn(async move {
                    loop {
                        let status = *status_rx.borrow_and_update();
                        Metrics::connection_status(&path, &status.to_string());
                        store.dispatch(StoreEvent::ConnectionChanged { channel, status });
                        tokio::select! {
                            _ = cancel.cancelled() => break,
                            changed = status_rx.changed() => {
                                if changed.is_err() {
                                    break;
                                }
                            }
                        }
                    }
                })
            })
            .collect()
    }

    /// Run until the shutdown token is cancelled.
    pub async fn run(mut self, serve_dashboard: bool) -> AppResult<()> {
        info!(
            api = %self.config.api_base_url,
            ws = %self.config.ws_base_url,
            "Starting Pulse client"
        );

        // Swap in a closed receiver so the effect runner can own the real one.
        let intents = std::mem::replace(&mut self.intents, mpsc::unbounded_channel().1);

        let subscriptions = self.route_events();
        let mut tasks = self.spawn_status_forwarders();

        tasks.push(tokio::spawn(run_effects(
            intents,
            self.backend.clone(),
            self.config.sync.request_timeout(),
            self.shutdown.clone(),
        )));

        let (resync, requests) = ResyncHandle::channel();
        let controller = SyncController::new(
            self.store.clone(),
            SnapshotFetcher::new(self.backend.clone()),
            Arc::new(self.client(Channel::Trading)),
            self.config.sync.clone(),
            self.latch.clone(),
            requests,
        );
        tasks.push(tokio::spawn(controller.run(self.shutdown.clone())));

        if serve_dashboard && self.config.dashboard.enabled {
            let actions: DynActionHandler = Arc::new(ActionDispatcher::new(
                self.store.clone(),
                self.backend.clone(),
                resync.clone(),
                self.config.sync.request_timeout(),
            ));
            let store = self.store.clone();
            let config = self.config.dashboard.clone();
            let cancel = self.shutdown.clone();
            tasks.push(tokio::spawn(async move {
                if let Err(e) = pulse_dashboard::run_server(store, actions, config, cancel).await {
                    error!(error = %e, "View server failed");
                }
            }));
        }

        self.transport.connect_all();
        info!(paths = ?self.transport.paths(), "Transports connecting");

        self.shutdown.cancelled().await;
        info!("Shutting down");

        for subscription in subscriptions {
            subscription.unsubscribe();
        }
        self.transport.dispose();
        for task in tasks {
            if let Err(e) = task.await {
                error!(error = %e, "Background task panicked");
            }
        }
        drop(resync);

        info!("Pulse client stopped");
        Ok(())
    }
}
