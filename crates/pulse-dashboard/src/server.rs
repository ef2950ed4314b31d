//! HTTP server implementation using axum.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use futures_util::stream::StreamExt;
use futures_util::SinkExt;
use pulse_core::{TrackedWallet, TransactionPage, WatchlistReasoning};
use pulse_store::{Store, TradingState};
use pulse_telemetry::Metrics;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tracing::{debug, info, warn};

use crate::action::DynActionHandler;
use crate::broadcast::run_broadcaster;
use crate::config::DashboardConfig;
use crate::error::{ActionError, ActionResult, ServerError, ServerResult};
use crate::types::{ApiResponse, PageQuery, ToggleTradingRequest, TrackRequest, ViewMessage};

/// Buffered state messages per slow client before it starts lagging.
const BROADCAST_CAPACITY: usize = 32;

/// Connection limiter to prevent too many concurrent WebSocket connections.
pub struct ConnectionLimiter {
    current: AtomicUsize,
    max: usize,
}

impl ConnectionLimiter {
    pub fn new(max: usize) -> Self {
        Self {
            current: AtomicUsize::new(0),
            max,
        }
    }

    /// Reserve a slot. The slot is released when the guard is dropped, so the
    /// guard can move into the upgraded connection's task.
    pub fn try_acquire(self: &Arc<Self>) -> Option<ConnectionGuard> {
        loop {
            let current = self.current.load(Ordering::Acquire);
            if current >= self.max {
                return None;
            }
            if self
                .current
                .compare_exchange(current, current + 1, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                Metrics::view_clients(current + 1);
                return Some(ConnectionGuard {
                    limiter: Arc::clone(self),
                });
            }
        }
    }

    pub fn current_count(&self) -> usize {
        self.current.load(Ordering::Relaxed)
    }
}

pub struct ConnectionGuard {
    limiter: Arc<ConnectionLimiter>,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        let previous = self.limiter.current.fetch_sub(1, Ordering::Release);
        Metrics::view_clients(previous.saturating_sub(1));
    }
}

/// Shared application state for axum handlers.
#[derive(Clone)]
pub struct AppState {
    store: Store,
    actions: DynActionHandler,
    broadcast_tx: broadcast::Sender<String>,
    connection_limiter: Arc<ConnectionLimiter>,
    config: DashboardConfig,
    shutdown: CancellationToken,
}

impl AppState {
    pub fn new(
        store: Store,
        actions: DynActionHandler,
        broadcast_tx: broadcast::Sender<String>,
        config: DashboardConfig,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            store,
            actions,
            broadcast_tx,
            connection_limiter: Arc::new(ConnectionLimiter::new(config.max_connections)),
            config,
            shutdown,
        }
    }
}

/// Create the axum router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/state", get(get_state))
        .route("/api/positions", get(get_positions))
        .route("/api/history", get(get_history))
        .route("/api/migrations", get(get_migrations))
        .route("/api/watchlist", get(get_watchlist))
        .route("/api/activity", get(get_activity))
        .route("/api/transactions", get(get_transactions))
        .route("/api/watchlist/{mint}/reasoning", get(get_watchlist_reasoning))
        .route("/api/actions/trading", post(toggle_trading))
        .route("/api/actions/positions/{id}/close", post(close_position))
        .route("/api/actions/migrations/{mint}/{action}", post(migration_action))
        .route(
            "/api/actions/wallets/{address}/sync-twitter",
            post(sync_wallet_twitter),
        )
        .route("/api/actions/resync", post(resync))
        .route("/metrics", get(get_metrics))
        .route("/ws", get(ws_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ----------------------------------------------------------------------------
// State views
// ----------------------------------------------------------------------------

async fn get_state(State(app): State<AppState>) -> Json<ApiResponse<Arc<TradingState>>> {
    Json(ApiResponse::ok(app.store.state()))
}

async fn get_positions(State(app): State<AppState>) -> Response {
    Json(ApiResponse::ok(app.store.state().positions.clone())).into_response()
}

async fn get_history(State(app): State<AppState>) -> Response {
    Json(ApiResponse::ok(app.store.state().history.clone())).into_response()
}

async fn get_migrations(State(app): State<AppState>) -> Response {
    Json(ApiResponse::ok(app.store.state().migrations.clone())).into_response()
}

async fn get_watchlist(State(app): State<AppState>) -> Response {
    Json(ApiResponse::ok(app.store.state().watchlist.clone())).into_response()
}

async fn get_activity(State(app): State<AppState>) -> Response {
    Json(ApiResponse::ok(app.store.state().activity.clone())).into_response()
}

async fn get_metrics() -> Response {
    match Metrics::encode_global() {
        Ok(body) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            warn!(error = %e, "Failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

// ----------------------------------------------------------------------------
// On-demand reads
// ----------------------------------------------------------------------------

async fn get_transactions(
    State(app): State<AppState>,
    Query(query): Query<PageQuery>,
) -> ActionResult<Json<ApiResponse<TransactionPage>>> {
    let (limit, offset) = query
        .resolve()
        .ok_or_else(|| ActionError::InvalidRequest("limit out of range".to_string()))?;
    let page = app.actions.transactions(limit, offset).await?;
    Ok(Json(ApiResponse::ok(page)))
}

async fn get_watchlist_reasoning(
    State(app): State<AppState>,
    Path(mint): Path<String>,
) -> ActionResult<Json<ApiResponse<WatchlistReasoning>>> {
    let reasoning = app.actions.watchlist_reasoning(mint).await?;
    Ok(Json(ApiResponse::ok(reasoning)))
}

// ----------------------------------------------------------------------------
// Actions
// ----------------------------------------------------------------------------

async fn toggle_trading(
    State(app): State<AppState>,
    Json(req): Json<ToggleTradingRequest>,
) -> ActionResult<Json<ApiResponse<bool>>> {
    app.actions.toggle_trading(req.enabled).await?;
    Ok(Json(ApiResponse::ok(req.enabled)))
}

async fn close_position(
    State(app): State<AppState>,
    Path(id): Path<String>,
) -> ActionResult<Json<ApiResponse<String>>> {
    app.actions.close_position(id.clone()).await?;
    Ok(Json(ApiResponse::ok(id)))
}

async fn migration_action(
    State(app): State<AppState>,
    Path((mint, action)): Path<(String, String)>,
    body: Bytes,
) -> ActionResult<Json<ApiResponse<String>>> {
    match action.as_str() {
        "track" => {
            let req: TrackRequest = if body.is_empty() {
                TrackRequest::default()
            } else {
                serde_json::from_slice(&body)
                    .map_err(|e| ActionError::InvalidRequest(e.to_string()))?
            };
            app.actions.track_migration(mint.clone(), req.into()).await?;
        }
        "analyze" => app.actions.analyze_migration(mint.clone()).await?,
        "refresh" => app.actions.refresh_migration_data(mint.clone()).await?,
        other => {
            return Err(ActionError::InvalidRequest(format!(
                "unknown migration action: {other}"
            )))
        }
    }
    Ok(Json(ApiResponse::ok(mint)))
}

async fn sync_wallet_twitter(
    State(app): State<AppState>,
    Path(address): Path<String>,
) -> ActionResult<Json<ApiResponse<TrackedWallet>>> {
    let wallet = app.actions.sync_wallet_twitter_profile(address).await?;
    Ok(Json(ApiResponse::ok(wallet)))
}

async fn resync(State(app): State<AppState>) -> ActionResult<Json<ApiResponse<bool>>> {
    app.actions.resync().await?;
    Ok(Json(ApiResponse::ok(true)))
}

// ----------------------------------------------------------------------------
// WebSocket
// ----------------------------------------------------------------------------

/// WebSocket upgrade handler.
async fn ws_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    let Some(guard) = state.connection_limiter.try_acquire() else {
        warn!(
            current = state.connection_limiter.current_count(),
            max = state.config.max_connections,
            "WebSocket connection limit reached"
        );
        return (StatusCode::SERVICE_UNAVAILABLE, "Too many connections").into_response();
    };

    info!(
        connections = state.connection_limiter.current_count(),
        "New WebSocket connection"
    );

    ws.on_upgrade(move |socket| handle_ws_connection(socket, state, guard))
}

/// Handle a WebSocket connection.
async fn handle_ws_connection(socket: WebSocket, state: AppState, _guard: ConnectionGuard) {
    let (mut sender, mut receiver) = socket.split();

    // Subscribe before reading the current state so no change is missed.
    let mut broadcast_rx = state.broadcast_tx.subscribe();

    match ViewMessage::state(state.store.state()).to_json() {
        Ok(json) => {
            if sender.send(Message::Text(json.into())).await.is_err() {
                debug!("Failed to send initial state, client disconnected");
                return;
            }
        }
        Err(e) => {
            warn!(error = %e, "Failed to serialize initial state");
            return;
        }
    }

    let mut incoming_task = tokio::spawn(async move {
        while let Some(result) = receiver.next().await {
            match result {
                Ok(Message::Close(_)) => {
                    debug!("Client sent close frame");
                    break;
                }
                Err(e) => {
                    debug!(error = %e, "WebSocket receive error");
                    break;
                }
                // Pings are answered by axum.
                _ => {}
            }
        }
    });

    loop {
        tokio::select! {
            result = broadcast_rx.recv() => {
                match result {
                    Ok(msg) => {
                        if sender.send(Message::Text(msg.into())).await.is_err() {
                            debug!("Failed to send message, client disconnected");
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        // Every message is a full state; the next one catches up.
                        warn!(skipped = n, "WebSocket client lagged, catching up");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        debug!("Broadcast channel closed");
                        break;
                    }
                }
            }
            _ = &mut incoming_task => {
                debug!("Incoming task completed, closing connection");
                break;
            }
            _ = state.shutdown.cancelled() => {
                let _ = sender.send(Message::Close(None)).await;
                break;
            }
        }
    }

    incoming_task.abort();
    info!(
        connections = state.connection_limiter.current_count().saturating_sub(1),
        "WebSocket connection closed"
    );
}

// ----------------------------------------------------------------------------
// Entry points
// ----------------------------------------------------------------------------

/// Serve the view API on an already-bound listener until `shutdown` fires.
pub async fn serve(
    listener: TcpListener,
    store: Store,
    actions: DynActionHandler,
    config: DashboardConfig,
    shutdown: CancellationToken,
) -> ServerResult<()> {
    let (broadcast_tx, _) = broadcast::channel::<String>(BROADCAST_CAPACITY);

    let state = AppState::new(
        store.clone(),
        actions,
        broadcast_tx.clone(),
        config,
        shutdown.clone(),
    );
    let app = create_router(state);

    tokio::spawn(run_broadcaster(
        store.subscribe(),
        broadcast_tx,
        shutdown.clone(),
    ));

    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "Starting view server");
    }

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    info!("View server stopped");
    Ok(())
}

/// Bind the configured address and run the view server.
pub async fn run_server(
    store: Store,
    actions: DynActionHandler,
    config: DashboardConfig,
    shutdown: CancellationToken,
) -> ServerResult<()> {
    let addr = config.listen_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })?;
    serve(listener, store, actions, config, shutdown).await
}
