//! Reconnection and fallback controller.
//!
//! Watches the trading channel's status and keeps the store's snapshot fresh:
//! - initial fetch exactly once per [`FetchLatch`]
//! - full resync whenever the channel becomes connected
//! - snapshot polling while it is not connected
//! - one `connect()` a fixed delay after it errors

use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use pulse_api::SnapshotFetcher;
use pulse_core::{now_ms, ConnectionStatus};
use pulse_store::{Store, StoreEvent};
use pulse_telemetry::Metrics;
use pulse_ws::WsClient;
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, Interval, MissedTickBehavior, Sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::SyncConfig;

/// Why a snapshot fetch runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchReason {
    Initial,
    Reconnect,
    Poll,
    /// Requested by a view client.
    Manual,
    /// Compensating refetch after a failed action.
    Rollback,
}

impl FetchReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initial => "initial",
            Self::Reconnect => "reconnect",
            Self::Poll => "poll",
            Self::Manual => "manual",
            Self::Rollback => "rollback",
        }
    }

    /// Whether the store should show a loading state while fetching.
    pub fn shows_loading(&self) -> bool {
        matches!(self, Self::Initial | Self::Manual)
    }
}

/// What the controller does in response to a status transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncCommand {
    Resync,
    StartPolling,
    StopPolling,
    ScheduleRetry,
    CancelRetry,
}

/// Commands for a status transition from `prev` to `next`.
pub fn transition(prev: ConnectionStatus, next: ConnectionStatus) -> Vec<SyncCommand> {
    use SyncCommand::*;

    if prev == next {
        return Vec::new();
    }
    match next {
        ConnectionStatus::Connected => vec![CancelRetry, StopPolling, Resync],
        ConnectionStatus::Error => vec![StartPolling, ScheduleRetry],
        ConnectionStatus::Connecting | ConnectionStatus::Disconnected => vec![StartPolling],
    }
}

/// Guards the initial fetch against running twice.
#[derive(Debug, Default)]
pub struct FetchLatch {
    fired: AtomicBool,
}

impl FetchLatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` exactly once.
    pub fn try_claim(&self) -> bool {
        !self.fired.swap(true, Ordering::AcqRel)
    }
}

/// The connection the controller observes and restarts.
pub trait ConnectionHandle: Send + Sync {
    fn path(&self) -> &str;

    fn subscribe_status(&self) -> watch::Receiver<ConnectionStatus>;

    fn reconnect(&self);
}

impl ConnectionHandle for WsClient {
    fn path(&self) -> &str {
        &self.config().path
    }

    fn subscribe_status(&self) -> watch::Receiver<ConnectionStatus> {
        WsClient::subscribe_status(self)
    }

    fn reconnect(&self) {
        self.connect();
    }
}

/// Requests out-of-band snapshot fetches from the controller.
#[derive(Debug, Clone)]
pub struct ResyncHandle {
    tx: mpsc::Sender<FetchReason>,
}

impl ResyncHandle {
    /// Channel pair; the receiver goes to [`SyncController::new`].
    pub fn channel() -> (Self, mpsc::Receiver<FetchReason>) {
        let (tx, rx) = mpsc::channel(4);
        (Self { tx }, rx)
    }

    /// Queue a fetch. Returns `false` if the queue is full or the controller
    /// is gone; a queued fetch already covers the request in the first case.
    pub fn request(&self, reason: FetchReason) -> bool {
        match self.tx.try_send(reason) {
            Ok(()) => true,
            Err(e) => {
                debug!(reason = reason.as_str(), error = %e, "Resync request not queued");
                false
            }
        }
    }
}

/// Drives snapshot fetches from connection status.
pub struct SyncController {
    store: Store,
    fetcher: SnapshotFetcher,
    connection: Arc<dyn ConnectionHandle>,
    config: SyncConfig,
    latch: Arc<FetchLatch>,
    requests: mpsc::Receiver<FetchReason>,
}

impl SyncController {
    pub fn new(
        store: Store,
        fetcher: SnapshotFetcher,
        connection: Arc<dyn ConnectionHandle>,
        config: SyncConfig,
        latch: Arc<FetchLatch>,
        requests: mpsc::Receiver<FetchReason>,
    ) -> Self {
        Self {
            store,
            fetcher,
            connection,
            config,
            latch,
            requests,
        }
    }

    /// Run until `cancel` fires.
    pub async fn run(mut self, cancel: CancellationToken) {
        let mut status_rx = self.connection.subscribe_status();
        let mut last = *status_rx.borrow_and_update();
        let mut poll: Option<Interval> = None;
        let mut retry: Option<Pin<Box<Sleep>>> = None;

        info!(path = self.connection.path(), status = %last, "Sync controller started");

        if !last.is_connected() {
            poll = Some(self.poll_interval());
        }
        if last == ConnectionStatus::Error {
            retry = Some(Box::pin(tokio::time::sleep(self.config.error_retry_delay())));
        }

        if self.latch.try_claim() {
            self.fetch(FetchReason::Initial).await;
        } else {
            debug!("Initial fetch already done");
        }

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                changed = status_rx.changed() => {
                    if changed.is_err() {
                        debug!("Status publisher dropped, stopping sync controller");
                        break;
                    }
                    let next = *status_rx.borrow_and_update();
                    for command in transition(last, next) {
                        match command {
                            SyncCommand::Resync => self.fetch(FetchReason::Reconnect).await,
                            SyncCommand::StartPolling => {
                                if poll.is_none() {
                                    debug!("Starting fallback polling");
                                    poll = Some(self.poll_interval());
                                }
                            }
                            SyncCommand::StopPolling => {
                                if poll.take().is_some() {
                                    debug!("Stopping fallback polling");
                                }
                            }
                            SyncCommand::ScheduleRetry => {
                                if retry.is_none() {
                                    retry = Some(Box::pin(tokio::time::sleep(
                                        self.config.error_retry_delay(),
                                    )));
                                }
                            }
                            SyncCommand::CancelRetry => retry = None,
                        }
                    }
                    last = next;
                }
                _ = next_tick(&mut poll) => self.fetch(FetchReason::Poll).await,
                _ = fire(&mut retry) => {
                    retry = None;
                    info!(path = self.connection.path(), "Retrying connection after error");
                    Metrics::reconnect(self.connection.path());
                    self.connection.reconnect();
                }
                Some(reason) = self.requests.recv() => self.fetch(reason).await,
            }
        }

        info!("Sync controller stopped");
    }

    fn poll_interval(&self) -> Interval {
        let period = self.config.fallback_poll_interval();
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval
    }

    async fn fetch(&self, reason: FetchReason) {
        if reason.shows_loading() {
            self.store.dispatch(StoreEvent::FetchStarted);
        }
        debug!(reason = reason.as_str(), "Fetching snapshot");

        match self.fetcher.fetch_initial_state().await {
            Ok(snapshot) => {
                Metrics::snapshot_fetch(reason.as_str(), true);
                self.store.dispatch(StoreEvent::SnapshotLoaded {
                    snapshot: Box::new(snapshot),
                    timestamp: now_ms(),
                });
            }
            Err(e) => {
                warn!(reason = reason.as_str(), error = %e, "Snapshot fetch failed");
                Metrics::snapshot_fetch(reason.as_str(), false);
                self.store.dispatch(StoreEvent::FetchFailed {
                    message: e.to_string(),
                });
            }
        }
    }
}

async fn next_tick(poll: &mut Option<Interval>) {
    match poll {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

async fn fire(retry: &mut Option<Pin<Box<Sleep>>>) {
    match retry {
        Some(sleep) => sleep.as_mut().await,
        None => std::future::pending().await,
    }
}
