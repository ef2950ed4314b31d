//! End-to-end: push server and mock backend wired through the application.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{eventually, MockPushServer};
use pulse_api::{BackendCall, MockBackend};
use pulse_app::{AppConfig, Application};
use pulse_core::{ConnectionStatus, DashboardSnapshot, Decision, PositionStatus, RankedMigration};
use pulse_store::{Store, TradingState};
use serde_json::json;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const WAIT: Duration = Duration::from_secs(5);

struct Running {
    server: MockPushServer,
    backend: Arc<MockBackend>,
    store: Store,
    shutdown: CancellationToken,
    task: JoinHandle<()>,
}

impl Running {
    async fn start(snapshot: DashboardSnapshot) -> Self {
        let server = MockPushServer::start().await;
        let backend = Arc::new(MockBackend::new());
        backend.set_snapshot(snapshot);

        let config = AppConfig::from_toml(&format!(
            r#"
            ws_base_url = "{}"

            [transport]
            reconnect_base_delay_ms = 50
            reconnect_max_delay_ms = 200

            [dashboard]
            enabled = false
            "#,
            server.url()
        ))
        .unwrap();

        let app = Application::with_backend(config, backend.clone()).unwrap();
        let store = app.store().clone();
        let shutdown = app.shutdown_token();
        let task = tokio::spawn(async move {
            app.run(false).await.unwrap();
        });

        let running = Self {
            server,
            backend,
            store,
            shutdown,
            task,
        };
        running.wait_until_synced().await;
        running
    }

    /// Both channels open, trading connected, and any resync settled.
    async fn wait_until_synced(&self) {
        let server = &self.server;
        assert!(
            eventually(WAIT, move || async move {
                server.connected_paths().await == vec!["/ws/reasoning", "/ws/trading"]
            })
            .await
        );
        assert!(
            self.wait_for_state(|state| {
                state.connection == ConnectionStatus::Connected
                    && state.reasoning_connection == ConnectionStatus::Connected
                    && state.client_id.is_some()
                    && !state.loading
            })
            .await
        );
        tokio::time::sleep(Duration::from_millis(200)).await;
    }

    async fn wait_for_state(&self, check: impl Fn(&TradingState) -> bool) -> bool {
        let store = &self.store;
        let check = &check;
        eventually(WAIT, move || async move { check(store.state().as_ref()) }).await
    }

    async fn wait_for_calls(&self, pred: impl Fn(&BackendCall) -> bool, count: usize) -> bool {
        let backend = &self.backend;
        let pred = &pred;
        eventually(WAIT, move || async move { backend.count_calls(pred) == count }).await
    }

    async fn stop(self) {
        self.shutdown.cancel();
        tokio::time::timeout(WAIT, self.task)
            .await
            .expect("application did not stop")
            .unwrap();
    }
}

fn snapshot_with_migration(mint: &str) -> DashboardSnapshot {
    DashboardSnapshot {
        migrations: vec![RankedMigration::detected(mint, 1)],
        ..Default::default()
    }
}

#[tokio::test]
async fn test_startup_fetches_snapshot_and_records_client_id() {
    let running = Running::start(snapshot_with_migration("M")).await;

    let state = running.store.state();
    assert_eq!(state.client_id.as_deref(), Some("client/ws/trading"));
    assert!(state.migration("M").is_some());
    assert!(state.error.is_none());
    assert!(
        running
            .backend
            .count_calls(|c| matches!(c, BackendCall::DashboardInit))
            >= 1
    );

    running.stop().await;
}

#[tokio::test]
async fn test_position_lifecycle_over_trading_channel() {
    let running = Running::start(DashboardSnapshot::default()).await;

    running.server.push(
        "/ws/trading",
        "position_opened",
        json!({
            "id": "p1",
            "mint": "ABC",
            "symbol": "ABC",
            "entry_price": "0.001",
            "entry_amount_sol": "1",
            "entry_token_amount": "1000",
            "remaining_tokens": "1000"
        }),
    );
    assert!(
        running
            .wait_for_state(|state| state.position("ABC").is_some())
            .await
    );

    running.server.push(
        "/ws/trading",
        "take_profit_triggered",
        json!({"mint": "ABC", "realized": "0.5", "remaining": "500"}),
    );
    assert!(
        running
            .wait_for_state(|state| state.position("ABC").is_some_and(|p| p.target1_hit))
            .await
    );
    {
        let state = running.store.state();
        let position = state.position("ABC").unwrap();
        assert_eq!(position.status, PositionStatus::PartiallyClosed);
        assert_eq!(position.remaining_tokens.to_string(), "500");
    }

    running.server.push(
        "/ws/trading",
        "position_closed",
        json!({"mint": "ABC", "reason": "target2"}),
    );
    assert!(
        running
            .wait_for_state(|state| state.positions.is_empty())
            .await
    );
    let state = running.store.state();
    assert_eq!(state.history[0].id, "p1");
    assert_eq!(state.history[0].status, PositionStatus::Closed);

    running.stop().await;
}

#[tokio::test]
async fn test_events_only_apply_from_their_routed_channel() {
    let running = Running::start(snapshot_with_migration("M")).await;

    // Reasoning events are not routed on the trading channel.
    running.server.push(
        "/ws/trading",
        "ai_reasoning",
        json!({"mint": "M", "decision": "BUY", "confidence": 0.9}),
    );
    running.server.push(
        "/ws/reasoning",
        "ai_reasoning",
        json!({"mint": "M", "decision": "PASS", "confidence": 0.8, "reasoning": "strong holders"}),
    );

    assert!(
        running
            .wait_for_state(|state| state.migration("M").is_some_and(|m| m.ai.is_some()))
            .await
    );
    // Give a misrouted event time to land if it were going to.
    tokio::time::sleep(Duration::from_millis(100)).await;

    let state = running.store.state();
    let ai = state.migration("M").unwrap().ai.clone().unwrap();
    assert_eq!(ai.decision, Decision::Pass);
    assert_eq!(ai.reasoning, "strong holders");

    running.stop().await;
}

#[tokio::test]
async fn test_wallet_buy_on_passed_token_requests_one_reanalysis() {
    let running = Running::start(snapshot_with_migration("M")).await;

    running.server.push(
        "/ws/reasoning",
        "ai_reasoning",
        json!({"mint": "M", "decision": "PASS", "confidence": 0.8}),
    );
    assert!(
        running
            .wait_for_state(|state| {
                state
                    .migration("M")
                    .is_some_and(|m| m.last_decision_passed())
            })
            .await
    );

    for wallet in ["W1", "W2", "W3"] {
        running.server.push(
            "/ws/trading",
            "wallet_buy_detected",
            json!({"mint": "M", "wallet": wallet, "action": "buy", "amount_sol": "2"}),
        );
    }

    assert!(
        running
            .wait_for_state(|state| {
                state
                    .migration("M")
                    .is_some_and(|m| m.wallet_signal_count == 3)
            })
            .await
    );
    assert!(
        running
            .wait_for_calls(
                |c| matches!(c, BackendCall::AnalyzeMigration(m) if m == "M"),
                1
            )
            .await
    );
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(
        running
            .backend
            .count_calls(|c| matches!(c, BackendCall::AnalyzeMigration(_))),
        1
    );

    running.stop().await;
}
