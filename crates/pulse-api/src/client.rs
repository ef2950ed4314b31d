//! HTTP client for the backend REST API.

use std::time::Duration;

use pulse_core::{
    DashboardSnapshot, Position, RankedMigration, TrackedWallet, TradingConfig, TransactionPage,
    WatchlistReasoning,
};
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::backend::{BackendApi, BoxFuture, ConfigUpdate, TrackOptions, WatchlistData};
use crate::error::{ApiError, ApiResult};
use crate::wire::{
    self, ApiEnvelope, WireDashboardInit, WireMigration, WirePosition, WireTradingConfig,
    WireTransactionPage, WireWallet, WireWatchlist, WireWatchlistReasoning,
};

/// Default timeout for API requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP client settings.
#[derive(Debug, Clone)]
pub struct HttpBackendConfig {
    /// Base URL, e.g. `http://localhost:3001`.
    pub base_url: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Read transaction history from `/api/trades` instead of `/api/transactions`.
    pub trades_view: bool,
}

impl Default for HttpBackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3001".to_string(),
            timeout: DEFAULT_TIMEOUT,
            trades_view: false,
        }
    }
}

/// Backend REST client.
pub struct HttpBackend {
    client: Client,
    base_url: String,
    trades_view: bool,
}

impl HttpBackend {
    /// Create a new client.
    pub fn new(config: HttpBackendConfig) -> ApiResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ApiError::Http(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            trades_view: config.trades_view,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client.request(method, self.url(path))
    }

    /// Send a request and unwrap the `{success, data, error}` envelope.
    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> ApiResult<Option<T>> {
        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), %body, "Backend returned error status");
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response.bytes().await?;
        let envelope: ApiEnvelope<T> = serde_json::from_slice(&bytes)?;
        if !envelope.success {
            let message = envelope
                .error
                .unwrap_or_else(|| "request failed".to_string());
            return Err(ApiError::Backend(message));
        }
        Ok(envelope.data)
    }

    async fn get<T: DeserializeOwned + Default>(&self, path: &str) -> ApiResult<T> {
        debug!(path, "GET");
        Ok(self
            .send(self.request(Method::GET, path))
            .await?
            .unwrap_or_default())
    }

    async fn post_unit(&self, path: &str, body: Option<serde_json::Value>) -> ApiResult<()> {
        debug!(path, "POST");
        let mut request = self.request(Method::POST, path);
        if let Some(body) = body {
            request = request.json(&body);
        }
        self.send::<serde_json::Value>(request).await?;
        Ok(())
    }
}

impl BackendApi for HttpBackend {
    fn dashboard_init(&self) -> BoxFuture<'_, ApiResult<DashboardSnapshot>> {
        Box::pin(async move {
            let init: WireDashboardInit = self.get("/api/dashboard/init").await?;
            let snapshot = DashboardSnapshot {
                config: init.config.unwrap_or_default().into(),
                stats: init.stats.unwrap_or_default().into(),
                wallets: wire::map_wallets(init.wallets),
                positions: wire::map_positions(init.positions, "positions"),
                history: wire::map_positions(init.history, "history"),
                migrations: wire::map_migrations(init.migrations),
                migration_stats: init.migration_stats.unwrap_or_default().into(),
                ..Default::default()
            };
            info!(
                positions = snapshot.positions.len(),
                history = snapshot.history.len(),
                migrations = snapshot.migrations.len(),
                "Fetched dashboard init"
            );
            Ok(snapshot)
        })
    }

    fn watchlist(&self) -> BoxFuture<'_, ApiResult<WatchlistData>> {
        Box::pin(async move {
            let raw: WireWatchlist = self.get("/api/watchlist").await?;
            Ok(WatchlistData {
                tokens: wire::map_watchlist(raw.tokens),
                stats: raw.stats.unwrap_or_default().into(),
            })
        })
    }

    fn trading_config(&self) -> BoxFuture<'_, ApiResult<TradingConfig>> {
        Box::pin(async move {
            let raw: WireTradingConfig = self.get("/api/config").await?;
            Ok(raw.into())
        })
    }

    fn update_trading_config(
        &self,
        update: ConfigUpdate,
    ) -> BoxFuture<'_, ApiResult<TradingConfig>> {
        Box::pin(async move {
            info!(?update, "Updating trading config");
            let request = self.request(Method::PATCH, "/api/config").json(&update);
            let raw: WireTradingConfig = self.send(request).await?.unwrap_or_default();
            Ok(raw.into())
        })
    }

    fn positions(&self) -> BoxFuture<'_, ApiResult<Vec<Position>>> {
        Box::pin(async move {
            let rows: Vec<WirePosition> = self.get("/api/positions").await?;
            Ok(wire::map_positions(rows, "positions"))
        })
    }

    fn close_position(&self, id: String) -> BoxFuture<'_, ApiResult<()>> {
        Box::pin(async move {
            info!(position_id = %id, "Closing position");
            self.post_unit(&format!("/api/positions/{id}/close"), None)
                .await
        })
    }

    fn transactions(&self, limit: u32, offset: u32) -> BoxFuture<'_, ApiResult<TransactionPage>> {
        Box::pin(async move {
            let resource = if self.trades_view {
                "trades"
            } else {
                "transactions"
            };
            let path = format!("/api/{resource}?limit={limit}&offset={offset}");
            let raw: WireTransactionPage = self.get(&path).await?;
            Ok(raw.into_page(limit, offset))
        })
    }

    fn migrations(
        &self,
        limit: u32,
        offset: u32,
    ) -> BoxFuture<'_, ApiResult<Vec<RankedMigration>>> {
        Box::pin(async move {
            let path = format!("/api/migrations?limit={limit}&offset={offset}");
            let rows: Vec<WireMigration> = self.get(&path).await?;
            Ok(wire::map_migrations(rows))
        })
    }

    fn track_migration(&self, mint: String, options: TrackOptions) -> BoxFuture<'_, ApiResult<()>> {
        Box::pin(async move {
            info!(%mint, "Tracking migration");
            let body = serde_json::to_value(&options)?;
            self.post_unit(&format!("/api/migrations/{mint}/track"), Some(body))
                .await
        })
    }

    fn analyze_migration(&self, mint: String) -> BoxFuture<'_, ApiResult<()>> {
        Box::pin(async move {
            info!(%mint, "Requesting migration analysis");
            self.post_unit(&format!("/api/migrations/{mint}/analyze"), None)
                .await
        })
    }

    fn refresh_migration_data(&self, mint: String) -> BoxFuture<'_, ApiResult<()>> {
        Box::pin(async move {
            self.post_unit(&format!("/api/migrations/{mint}/refresh"), None)
                .await
        })
    }

    fn watchlist_reasoning(&self, mint: String) -> BoxFuture<'_, ApiResult<WatchlistReasoning>> {
        Box::pin(async move {
            let raw: WireWatchlistReasoning =
                self.get(&format!("/api/watchlist/{mint}/reasoning")).await?;
            Ok(raw.into_reasoning(&mint))
        })
    }

    fn wallets(&self) -> BoxFuture<'_, ApiResult<Vec<TrackedWallet>>> {
        Box::pin(async move {
            let rows: Vec<WireWallet> = self.get("/api/wallets").await?;
            Ok(wire::map_wallets(rows))
        })
    }

    fn sync_wallet_twitter(&self, address: String) -> BoxFuture<'_, ApiResult<TrackedWallet>> {
        Box::pin(async move {
            info!(%address, "Syncing wallet Twitter profile");
            let request = self.request(
                Method::POST,
                &format!("/api/wallets/{address}/sync-twitter"),
            );
            let raw: Option<WireWallet> = self.send(request).await?;
            raw.and_then(WireWallet::into_wallet)
                .ok_or_else(|| ApiError::Decode("sync response missing wallet".to_string()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash() {
        let backend = HttpBackend::new(HttpBackendConfig {
            base_url: "http://localhost:3001/".to_string(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(
            backend.url("/api/dashboard/init"),
            "http://localhost:3001/api/dashboard/init"
        );
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_http_error() {
        let backend = HttpBackend::new(HttpBackendConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            timeout: Duration::from_secs(2),
            trades_view: false,
        })
        .unwrap();

        let err = backend.dashboard_init().await.unwrap_err();
        assert!(matches!(err, ApiError::Http(_) | ApiError::Timeout));
    }
}
