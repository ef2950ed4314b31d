//! User actions exposed to view clients.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use pulse_api::{ApiError, BoxFuture, TrackOptions};
use pulse_core::{TrackedWallet, TransactionPage, WatchlistReasoning};

use crate::error::ActionResult;

/// Actions a view client can trigger.
///
/// Implemented by the application's action dispatcher; the view server only
/// forwards requests and reports the outcome.
pub trait ActionHandler: Send + Sync {
    fn toggle_trading(&self, enabled: bool) -> BoxFuture<'_, ActionResult<()>>;

    fn close_position(&self, id: String) -> BoxFuture<'_, ActionResult<()>>;

    fn track_migration(
        &self,
        mint: String,
        options: TrackOptions,
    ) -> BoxFuture<'_, ActionResult<()>>;

    fn analyze_migration(&self, mint: String) -> BoxFuture<'_, ActionResult<()>>;

    fn refresh_migration_data(&self, mint: String) -> BoxFuture<'_, ActionResult<()>>;

    fn sync_wallet_twitter_profile(
        &self,
        address: String,
    ) -> BoxFuture<'_, ActionResult<TrackedWallet>>;

    /// One page of transaction history, fetched on demand.
    fn transactions(&self, limit: u32, offset: u32)
        -> BoxFuture<'_, ActionResult<TransactionPage>>;

    /// Evaluation history for a watchlist token, fetched on demand.
    fn watchlist_reasoning(&self, mint: String) -> BoxFuture<'_, ActionResult<WatchlistReasoning>>;

    /// Request an immediate snapshot refetch.
    fn resync(&self) -> BoxFuture<'_, ActionResult<()>>;
}

pub type DynActionHandler = Arc<dyn ActionHandler>;

// ============================================================================
// Mock
// ============================================================================

/// One recorded action.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionCall {
    ToggleTrading(bool),
    ClosePosition(String),
    TrackMigration(String, TrackOptions),
    AnalyzeMigration(String),
    RefreshMigrationData(String),
    SyncWalletTwitter(String),
    Transactions { limit: u32, offset: u32 },
    WatchlistReasoning(String),
    Resync,
}

/// Action handler that records calls and replays queued failures.
#[derive(Debug, Default)]
pub struct MockActions {
    calls: Mutex<Vec<ActionCall>>,
    failures: Mutex<VecDeque<ApiError>>,
}

impl MockActions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next action fail with `error`.
    pub fn fail_next(&self, error: ApiError) {
        self.failures.lock().push_back(error);
    }

    pub fn calls(&self) -> Vec<ActionCall> {
        self.calls.lock().clone()
    }

    fn respond<T: Send + 'static>(
        &self,
        call: ActionCall,
        value: impl FnOnce() -> T + Send + 'static,
    ) -> BoxFuture<'_, ActionResult<T>> {
        self.calls.lock().push(call);
        let failure = self.failures.lock().pop_front();
        Box::pin(async move {
            match failure {
                Some(e) => Err(e.into()),
                None => Ok(value()),
            }
        })
    }
}

impl ActionHandler for MockActions {
    fn toggle_trading(&self, enabled: bool) -> BoxFuture<'_, ActionResult<()>> {
        self.respond(ActionCall::ToggleTrading(enabled), || ())
    }

    fn close_position(&self, id: String) -> BoxFuture<'_, ActionResult<()>> {
        self.respond(ActionCall::ClosePosition(id), || ())
    }

    fn track_migration(
        &self,
        mint: String,
        options: TrackOptions,
    ) -> BoxFuture<'_, ActionResult<()>> {
        self.respond(ActionCall::TrackMigration(mint, options), || ())
    }

    fn analyze_migration(&self, mint: String) -> BoxFuture<'_, ActionResult<()>> {
        self.respond(ActionCall::AnalyzeMigration(mint), || ())
    }

    fn refresh_migration_data(&self, mint: String) -> BoxFuture<'_, ActionResult<()>> {
        self.respond(ActionCall::RefreshMigrationData(mint), || ())
    }

    fn sync_wallet_twitter_profile(
        &self,
        address: String,
    ) -> BoxFuture<'_, ActionResult<TrackedWallet>> {
        let wallet = TrackedWallet {
            address: address.clone(),
            ..Default::default()
        };
        self.respond(ActionCall::SyncWalletTwitter(address), move || wallet)
    }

    fn transactions(
        &self,
        limit: u32,
        offset: u32,
    ) -> BoxFuture<'_, ActionResult<TransactionPage>> {
        self.respond(ActionCall::Transactions { limit, offset }, TransactionPage::default)
    }

    fn watchlist_reasoning(&self, mint: String) -> BoxFuture<'_, ActionResult<WatchlistReasoning>> {
        let reasoning = WatchlistReasoning {
            mint: mint.clone(),
            ..Default::default()
        };
        self.respond(ActionCall::WatchlistReasoning(mint), move || reasoning)
    }

    fn resync(&self) -> BoxFuture<'_, ActionResult<()>> {
        self.respond(ActionCall::Resync, || ())
    }
}
