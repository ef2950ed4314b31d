//! Action dispatcher.
//!
//! Every user action goes through [`ActionDispatcher::optimistic`]: apply a
//! local change, call the backend under the request timeout, and undo the
//! change if the call fails. The failure is returned to the caller.

use std::future::Future;
use std::time::Duration;

use pulse_api::{ApiError, ApiResult, BoxFuture, ConfigUpdate, DynBackend, TrackOptions};
use pulse_core::{now_ms, TrackedWallet, TransactionPage, WatchlistReasoning};
use pulse_dashboard::{ActionHandler, ActionResult};
use pulse_store::{Store, StoreEvent};
use pulse_telemetry::Metrics;
use tracing::{debug, info, warn};

use crate::controller::{FetchReason, ResyncHandle};

/// How to undo an optimistic change after the backend call fails.
#[derive(Debug)]
pub enum Rollback {
    /// Nothing was applied locally.
    Nothing,
    /// Apply this event to restore the previous value.
    Restore(StoreEvent),
    /// Refetch the snapshot; used when the change touched several
    /// collections.
    Resync,
}

/// Run `call` with a timeout, mapping expiry to [`ApiError::Timeout`].
pub async fn with_timeout<T>(
    timeout: Duration,
    call: impl Future<Output = ApiResult<T>>,
) -> ApiResult<T> {
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(ApiError::Timeout),
    }
}

#[derive(Clone)]
pub struct ActionDispatcher {
    store: Store,
    backend: DynBackend,
    resync: ResyncHandle,
    timeout: Duration,
}

impl ActionDispatcher {
    pub fn new(store: Store, backend: DynBackend, resync: ResyncHandle, timeout: Duration) -> Self {
        Self {
            store,
            backend,
            resync,
            timeout,
        }
    }

    /// Apply `apply`, await `call`, and roll back on failure.
    pub async fn optimistic<T>(
        &self,
        action: &'static str,
        apply: Option<StoreEvent>,
        call: impl Future<Output = ApiResult<T>>,
        rollback: Rollback,
    ) -> ActionResult<T> {
        if let Some(event) = apply {
            self.store.dispatch(event);
        }

        match with_timeout(self.timeout, call).await {
            Ok(value) => {
                debug!(action, "Action succeeded");
                Ok(value)
            }
            Err(e) => {
                warn!(action, error = %e, "Action failed");
                Metrics::action_failure(action);
                match rollback {
                    Rollback::Nothing => {}
                    Rollback::Restore(event) => {
                        self.store.dispatch(event);
                    }
                    Rollback::Resync => {
                        self.resync.request(FetchReason::Rollback);
                    }
                }
                Err(e.into())
            }
        }
    }

    pub async fn toggle_trading(&self, enabled: bool) -> ActionResult<()> {
        let previous = self.store.state().config.trading_enabled;
        let update = ConfigUpdate {
            trading_enabled: Some(enabled),
            ..Default::default()
        };
        let config = self
            .optimistic(
                "toggle_trading",
                Some(StoreEvent::SetTradingEnabled(enabled)),
                self.backend.update_trading_config(update),
                Rollback::Restore(StoreEvent::SetTradingEnabled(previous)),
            )
            .await?;

        info!(enabled = config.trading_enabled, "Trading toggled");
        self.store.dispatch(StoreEvent::ConfigReplaced(config));
        Ok(())
    }

    pub async fn close_position(&self, id: String) -> ActionResult<()> {
        self.optimistic(
            "close_position",
            Some(StoreEvent::ClosePositionLocally {
                id: id.clone(),
                timestamp: now_ms(),
            }),
            self.backend.close_position(id),
            Rollback::Resync,
        )
        .await
    }

    pub async fn track_migration(&self, mint: String, options: TrackOptions) -> ActionResult<()> {
        self.optimistic(
            "track_migration",
            None,
            self.backend.track_migration(mint, options),
            Rollback::Nothing,
        )
        .await
    }

    pub async fn analyze_migration(&self, mint: String) -> ActionResult<()> {
        self.optimistic(
            "analyze_migration",
            None,
            self.backend.analyze_migration(mint),
            Rollback::Nothing,
        )
        .await
    }

    pub async fn refresh_migration_data(&self, mint: String) -> ActionResult<()> {
        self.optimistic(
            "refresh_migration_data",
            None,
            self.backend.refresh_migration_data(mint),
            Rollback::Nothing,
        )
        .await
    }

    pub async fn sync_wallet_twitter_profile(&self, address: String) -> ActionResult<TrackedWallet> {
        let wallet = self
            .optimistic(
                "sync_wallet_twitter",
                None,
                self.backend.sync_wallet_twitter(address),
                Rollback::Nothing,
            )
            .await?;
        self.store.dispatch(StoreEvent::WalletReplaced(wallet.clone()));
        Ok(wallet)
    }

    pub async fn transactions(&self, limit: u32, offset: u32) -> ActionResult<TransactionPage> {
        Ok(with_timeout(self.timeout, self.backend.transactions(limit, offset)).await?)
    }

    pub async fn watchlist_reasoning(&self, mint: String) -> ActionResult<WatchlistReasoning> {
        Ok(with_timeout(self.timeout, self.backend.watchlist_reasoning(mint)).await?)
    }
}

impl ActionHandler for ActionDispatcher {
    fn toggle_trading(&self, enabled: bool) -> BoxFuture<'_, ActionResult<()>> {
        Box::pin(ActionDispatcher::toggle_trading(self, enabled))
    }

    fn close_position(&self, id: String) -> BoxFuture<'_, ActionResult<()>> {
        Box::pin(ActionDispatcher::close_position(self, id))
    }

    fn track_migration(
        &self,
        mint: String,
        options: TrackOptions,
    ) -> BoxFuture<'_, ActionResult<()>> {
        Box::pin(ActionDispatcher::track_migration(self, mint, options))
    }

    fn analyze_migration(&self, mint: String) -> BoxFuture<'_, ActionResult<()>> {
        Box::pin(ActionDispatcher::analyze_migration(self, mint))
    }

    fn refresh_migration_data(&self, mint: String) -> BoxFuture<'_, ActionResult<()>> {
        Box::pin(ActionDispatcher::refresh_migration_data(self, mint))
    }

    fn sync_wallet_twitter_profile(
        &self,
        address: String,
    ) -> BoxFuture<'_, ActionResult<TrackedWallet>> {
        Box::pin(ActionDispatcher::sync_wallet_twitter_profile(self, address))
    }

    fn transactions(
        &self,
        limit: u32,
        offset: u32,
    ) -> BoxFuture<'_, ActionResult<TransactionPage>> {
        Box::pin(ActionDispatcher::transactions(self, limit, offset))
    }

    fn watchlist_reasoning(&self, mint: String) -> BoxFuture<'_, ActionResult<WatchlistReasoning>> {
        Box::pin(ActionDispatcher::watchlist_reasoning(self, mint))
    }

    fn resync(&self) -> BoxFuture<'_, ActionResult<()>> {
        self.resync.request(FetchReason::Manual);
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulse_api::{BackendCall, MockBackend};
    use pulse_core::{DashboardSnapshot, PositionStatus, TradingConfig};
    use pulse_store::StoreConfig;
    use serde_json::json;
    use std::sync::Arc;
    use tokio::sync::mpsc;
    use tokio_test::{assert_err, assert_ok};

    struct Harness {
        backend: Arc<MockBackend>,
        store: Store,
        dispatcher: ActionDispatcher,
        requests: mpsc::Receiver<FetchReason>,
    }

    fn harness() -> Harness {
        let backend = Arc::new(MockBackend::new());
        let (store, _intents) = Store::new(StoreConfig::default());
        let (resync, requests) = ResyncHandle::channel();
        let dispatcher = ActionDispatcher::new(
            store.clone(),
            backend.clone(),
            resync,
            Duration::from_secs(10),
        );
        Harness {
            backend,
            store,
            dispatcher,
            requests,
        }
    }

    fn load(store: &Store, snapshot: DashboardSnapshot) {
        store.dispatch(StoreEvent::SnapshotLoaded {
            snapshot: Box::new(snapshot),
            timestamp: 1,
        });
    }

    #[tokio::test]
    async fn test_toggle_trading_reconciles_with_backend() {
        let h = harness();
        assert_ok!(h.dispatcher.toggle_trading(true).await);

        assert!(h.store.state().config.trading_enabled);
        assert_eq!(
            h.backend.calls(),
            vec![BackendCall::UpdateTradingConfig(ConfigUpdate {
                trading_enabled: Some(true),
                ..Default::default()
            })]
        );
    }

    #[tokio::test]
    async fn test_toggle_trading_rolls_back_on_failure() {
        let h = harness();
        load(
            &h.store,
            DashboardSnapshot {
                config: TradingConfig {
                    trading_enabled: false,
                    ..Default::default()
                },
                ..Default::default()
            },
        );

        h.backend.fail_next("config locked");
        let err = assert_err!(h.dispatcher.toggle_trading(true).await);

        assert!(err.to_string().contains("config locked"));
        assert!(!h.store.state().config.trading_enabled);
    }

    #[tokio::test]
    async fn test_close_position_moves_to_history() {
        let mut h = harness();
        h.store.apply_push(
            "position_opened",
            &json!({"id": "p1", "mint": "ABC", "symbol": "ABC"}),
            1,
        );

        assert_ok!(h.dispatcher.close_position("p1".to_string()).await);

        let state = h.store.state();
        assert!(state.positions.is_empty());
        assert_eq!(state.history[0].status, PositionStatus::Closed);
        assert!(h.requests.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_close_position_failure_requests_resync() {
        let mut h = harness();
        h.store.apply_push(
            "position_opened",
            &json!({"id": "p1", "mint": "ABC"}),
            1,
        );

        h.backend.fail_next("already closed");
        assert_err!(h.dispatcher.close_position("p1".to_string()).await);
        assert_eq!(assert_ok!(h.requests.try_recv()), FetchReason::Rollback);
    }

    #[tokio::test]
    async fn test_fire_and_forget_actions_leave_state_alone() {
        let h = harness();
        let before = h.store.state();

        assert_ok!(
            h.dispatcher
                .track_migration("M".to_string(), TrackOptions::default())
                .await
        );
        assert_ok!(h.dispatcher.analyze_migration("M".to_string()).await);
        h.backend.fail_next("rate limited");
        assert_err!(h.dispatcher.refresh_migration_data("M".to_string()).await);

        assert!(Arc::ptr_eq(&before, &h.store.state()));
        assert_eq!(h.backend.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_sync_wallet_replaces_entry() {
        let h = harness();
        load(
            &h.store,
            DashboardSnapshot {
                wallets: vec![
                    TrackedWallet {
                        address: "W1".to_string(),
                        ..Default::default()
                    },
                    TrackedWallet {
                        address: "W2".to_string(),
                        label: Some("whale".to_string()),
                        ..Default::default()
                    },
                ],
                ..Default::default()
            },
        );
        h.backend.set_wallets(vec![TrackedWallet {
            address: "W1".to_string(),
            twitter_handle: Some("@w1".to_string()),
            ..Default::default()
        }]);

        let wallet = assert_ok!(
            h.dispatcher
                .sync_wallet_twitter_profile("W1".to_string())
                .await
        );

        assert_eq!(wallet.address, "W1");
        let state = h.store.state();
        assert_eq!(state.wallets.len(), 2);
        assert_eq!(state.wallet("W1").unwrap(), &wallet);
        assert_eq!(state.wallet("W2").unwrap().label.as_deref(), Some("whale"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_calls_time_out() {
        let h = harness();
        h.backend.set_delay(Duration::from_secs(11));

        let err = assert_err!(h.dispatcher.transactions(50, 0).await);
        assert!(err.is_timeout());
        assert_eq!(err.to_string(), "request timed out");
    }
}
