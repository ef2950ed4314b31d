//! Backend API trait.
//!
//! Abstracts the REST surface so the fetcher, dispatcher and effect runner can
//! be tested against [`MockBackend`].

use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use pulse_core::{
    DashboardSnapshot, Position, RankedMigration, TrackedWallet, TradingConfig, TransactionPage,
    WatchlistReasoning, WatchlistStats, WatchlistToken,
};
use serde::Serialize;

use crate::error::{ApiError, ApiResult};

/// Boxed future for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

/// Watchlist resource: tokens plus counters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WatchlistData {
    pub tokens: Vec<WatchlistToken>,
    pub stats: WatchlistStats,
}

/// Partial trading config update; `None` fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConfigUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trading_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reanalyze_on_wallet_buy: Option<bool>,
}

/// Options for manually tracking a migration.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TrackOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Run AI analysis immediately after tracking.
    pub analyze: bool,
}

/// Backend REST surface.
pub trait BackendApi: Send + Sync {
    /// `GET /api/dashboard/init`. The watchlist fields of the result are empty.
    fn dashboard_init(&self) -> BoxFuture<'_, ApiResult<DashboardSnapshot>>;

    /// `GET /api/watchlist`.
    fn watchlist(&self) -> BoxFuture<'_, ApiResult<WatchlistData>>;

    /// `GET /api/config`.
    fn trading_config(&self) -> BoxFuture<'_, ApiResult<TradingConfig>>;

    /// `PATCH /api/config`, returning the updated config.
    fn update_trading_config(&self, update: ConfigUpdate)
        -> BoxFuture<'_, ApiResult<TradingConfig>>;

    /// `GET /api/positions`.
    fn positions(&self) -> BoxFuture<'_, ApiResult<Vec<Position>>>;

    /// `POST /api/positions/{id}/close`.
    fn close_position(&self, id: String) -> BoxFuture<'_, ApiResult<()>>;

    /// Transaction history page (`/api/transactions` or `/api/trades`).
    fn transactions(&self, limit: u32, offset: u32) -> BoxFuture<'_, ApiResult<TransactionPage>>;

    /// `GET /api/migrations`.
    fn migrations(&self, limit: u32, offset: u32)
        -> BoxFuture<'_, ApiResult<Vec<RankedMigration>>>;

    /// `POST /api/migrations/{mint}/track`.
    fn track_migration(&self, mint: String, options: TrackOptions)
        -> BoxFuture<'_, ApiResult<()>>;

    /// `POST /api/migrations/{mint}/analyze`.
    fn analyze_migration(&self, mint: String) -> BoxFuture<'_, ApiResult<()>>;

    /// `POST /api/migrations/{mint}/refresh`.
    fn refresh_migration_data(&self, mint: String) -> BoxFuture<'_, ApiResult<()>>;

    /// `GET /api/watchlist/{mint}/reasoning`.
    fn watchlist_reasoning(&self, mint: String) -> BoxFuture<'_, ApiResult<WatchlistReasoning>>;

    /// `GET /api/wallets`.
    fn wallets(&self) -> BoxFuture<'_, ApiResult<Vec<TrackedWallet>>>;

    /// `POST /api/wallets/{address}/sync-twitter`, returning the refreshed wallet.
    fn sync_wallet_twitter(&self, address: String) -> BoxFuture<'_, ApiResult<TrackedWallet>>;
}

/// Arc wrapper for BackendApi trait objects.
pub type DynBackend = Arc<dyn BackendApi>;

// ============================================================================
// Mock
// ============================================================================

/// One recorded backend call.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    DashboardInit,
    Watchlist,
    TradingConfig,
    UpdateTradingConfig(ConfigUpdate),
    Positions,
    ClosePosition(String),
    Transactions { limit: u32, offset: u32 },
    Migrations { limit: u32, offset: u32 },
    TrackMigration(String),
    AnalyzeMigration(String),
    RefreshMigrationData(String),
    WatchlistReasoning(String),
    Wallets,
    SyncWalletTwitter(String),
}

/// Mock backend for testing.
///
/// Returns a configurable snapshot, records every call, and fails calls while
/// a failure is queued.
#[derive(Debug, Default)]
pub struct MockBackend {
    snapshot: Mutex<DashboardSnapshot>,
    watchlist: Mutex<WatchlistData>,
    wallets: Mutex<Vec<TrackedWallet>>,
    transactions: Mutex<TransactionPage>,
    calls: Mutex<Vec<BackendCall>>,
    failures: Mutex<VecDeque<String>>,
    watchlist_fails: std::sync::atomic::AtomicBool,
    delay_ms: AtomicU64,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the snapshot returned by `dashboard_init`.
    pub fn set_snapshot(&self, snapshot: DashboardSnapshot) {
        *self.snapshot.lock() = snapshot;
    }

    pub fn set_watchlist(&self, watchlist: WatchlistData) {
        *self.watchlist.lock() = watchlist;
    }

    pub fn set_wallets(&self, wallets: Vec<TrackedWallet>) {
        *self.wallets.lock() = wallets;
    }

    pub fn set_transactions(&self, page: TransactionPage) {
        *self.transactions.lock() = page;
    }

    /// Make the next call (of any kind) fail with a backend error.
    pub fn fail_next(&self, message: impl Into<String>) {
        self.failures.lock().push_back(message.into());
    }

    /// Make every `watchlist` call fail.
    pub fn set_watchlist_fails(&self, fails: bool) {
        self.watchlist_fails.store(fails, Ordering::SeqCst);
    }

    /// Delay every response.
    pub fn set_delay(&self, delay: Duration) {
        self.delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    /// Recorded calls.
    pub fn calls(&self) -> Vec<BackendCall> {
        self.calls.lock().clone()
    }

    /// Number of recorded calls matching `pred`.
    pub fn count_calls(&self, pred: impl Fn(&BackendCall) -> bool) -> usize {
        self.calls.lock().iter().filter(|c| pred(c)).count()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    fn respond<T: Send + 'static>(
        &self,
        call: BackendCall,
        result: impl FnOnce() -> ApiResult<T> + Send + 'static,
    ) -> BoxFuture<'_, ApiResult<T>> {
        self.calls.lock().push(call);
        let failure = self.failures.lock().pop_front();
        let delay = self.delay_ms.load(Ordering::SeqCst);
        Box::pin(async move {
            if delay > 0 {
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }
            match failure {
                Some(message) => Err(ApiError::Backend(message)),
                None => result(),
            }
        })
    }
}

impl BackendApi for MockBackend {
    fn dashboard_init(&self) -> BoxFuture<'_, ApiResult<DashboardSnapshot>> {
        let snapshot = self.snapshot.lock().clone();
        self.respond(BackendCall::DashboardInit, move || Ok(snapshot))
    }

    fn watchlist(&self) -> BoxFuture<'_, ApiResult<WatchlistData>> {
        let data = self.watchlist.lock().clone();
        let fails = self.watchlist_fails.load(Ordering::SeqCst);
        self.respond(BackendCall::Watchlist, move || {
            if fails {
                Err(ApiError::Status {
                    status: 500,
                    body: "watchlist unavailable".to_string(),
                })
            } else {
                Ok(data)
            }
        })
    }

    fn trading_config(&self) -> BoxFuture<'_, ApiResult<TradingConfig>> {
        let config = self.snapshot.lock().config.clone();
        self.respond(BackendCall::TradingConfig, move || Ok(config))
    }

    fn update_trading_config(
        &self,
        update: ConfigUpdate,
    ) -> BoxFuture<'_, ApiResult<TradingConfig>> {
        let mut config = self.snapshot.lock().config.clone();
        if let Some(enabled) = update.trading_enabled {
            config.trading_enabled = enabled;
        }
        if let Some(reanalyze) = update.reanalyze_on_wallet_buy {
            config.reanalyze_on_wallet_buy = reanalyze;
        }
        self.respond(BackendCall::UpdateTradingConfig(update), move || Ok(config))
    }

    fn positions(&self) -> BoxFuture<'_, ApiResult<Vec<Position>>> {
        let positions = self.snapshot.lock().positions.clone();
        self.respond(BackendCall::Positions, move || Ok(positions))
    }

    fn close_position(&self, id: String) -> BoxFuture<'_, ApiResult<()>> {
        self.respond(BackendCall::ClosePosition(id), || Ok(()))
    }

    fn transactions(&self, limit: u32, offset: u32) -> BoxFuture<'_, ApiResult<TransactionPage>> {
        let page = self.transactions.lock().clone();
        self.respond(BackendCall::Transactions { limit, offset }, move || Ok(page))
    }

    fn migrations(
        &self,
        limit: u32,
        offset: u32,
    ) -> BoxFuture<'_, ApiResult<Vec<RankedMigration>>> {
        let migrations: Vec<RankedMigration> = self
            .snapshot
            .lock()
            .migrations
            .iter()
            .skip(offset as usize)
            .take(limit as usize)
            .cloned()
            .collect();
        self.respond(BackendCall::Migrations { limit, offset }, move || {
            Ok(migrations)
        })
    }

    fn track_migration(&self, mint: String, _options: TrackOptions) -> BoxFuture<'_, ApiResult<()>> {
        self.respond(BackendCall::TrackMigration(mint), || Ok(()))
    }

    fn analyze_migration(&self, mint: String) -> BoxFuture<'_, ApiResult<()>> {
        self.respond(BackendCall::AnalyzeMigration(mint), || Ok(()))
    }

    fn refresh_migration_data(&self, mint: String) -> BoxFuture<'_, ApiResult<()>> {
        self.respond(BackendCall::RefreshMigrationData(mint), || Ok(()))
    }

    fn watchlist_reasoning(&self, mint: String) -> BoxFuture<'_, ApiResult<WatchlistReasoning>> {
        let reasoning = WatchlistReasoning {
            mint: mint.clone(),
            summary: "criteria not met".to_string(),
            ..Default::default()
        };
        self.respond(BackendCall::WatchlistReasoning(mint), move || Ok(reasoning))
    }

    fn wallets(&self) -> BoxFuture<'_, ApiResult<Vec<TrackedWallet>>> {
        let wallets = self.wallets.lock().clone();
        self.respond(BackendCall::Wallets, move || Ok(wallets))
    }

    fn sync_wallet_twitter(&self, address: String) -> BoxFuture<'_, ApiResult<TrackedWallet>> {
        let wallet = self
            .wallets
            .lock()
            .iter()
            .find(|w| w.address == address)
            .cloned()
            .unwrap_or_else(|| TrackedWallet {
                address: address.clone(),
                ..Default::default()
            });
        let synced = TrackedWallet {
            twitter_handle: Some(format!("@{}", address.chars().take(6).collect::<String>())),
            synced_at: Some(pulse_core::now_ms()),
            ..wallet
        };
        self.respond(BackendCall::SyncWalletTwitter(address), move || Ok(synced))
    }
}
