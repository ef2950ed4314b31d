//! Push channel lifecycle against a local mock server.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use pulse_core::ConnectionStatus;
use pulse_ws::{TransportConfig, TransportManager, WsClient, WILDCARD};

use common::{eventually, unused_url, MockPushServer};

const WAIT: Duration = Duration::from_secs(5);

fn manager_for(base_url: String) -> TransportManager {
    TransportManager::new(TransportConfig {
        base_url,
        max_reconnect_attempts: 5,
        reconnect_base_delay_ms: 20,
        reconnect_max_delay_ms: 200,
        heartbeat_interval_ms: 30_000,
    })
}

async fn wait_for_status(client: &WsClient, status: ConnectionStatus) -> bool {
    let mut rx = client.subscribe_status();
    let ok = tokio::time::timeout(WAIT, rx.wait_for(|s| *s == status))
        .await
        .is_ok();
    ok
}

#[tokio::test]
async fn test_connect_assigns_client_id_and_dispatches() {
    let server = MockPushServer::start().await;
    let manager = manager_for(server.url());
    let client = manager.client("/ws/trading");

    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = seen.clone();
    let _sub = client.on(WILDCARD, move |env| log.lock().push(env.event_type.clone()));

    client.connect();
    assert!(wait_for_status(&client, ConnectionStatus::Connected).await);
    let c = &client;
    assert!(eventually(WAIT, move || async move { c.client_id().is_some() }).await);
    assert_eq!(client.client_id().as_deref(), Some("client-1"));

    server.push("price_update", serde_json::json!({"mint": "M1", "price": 2}));
    let s = &seen;
    assert!(
        eventually(WAIT, move || async move {
            s.lock().iter().any(|t| t == "price_update")
        })
        .await
    );
    assert_eq!(seen.lock()[0], "connected");

    manager.dispose();
    server.shutdown().await;
}

#[tokio::test]
async fn test_emit_reaches_server() {
    let server = MockPushServer::start().await;
    let manager = manager_for(server.url());
    let client = manager.client("/ws/trading");

    client.connect();
    assert!(wait_for_status(&client, ConnectionStatus::Connected).await);

    assert!(client.emit("subscribe_feed", serde_json::json!({"topic": "migrations"})));
    let srv = &server;
    assert!(
        eventually(WAIT, move || async move {
            !srv.received_of_type("subscribe_feed").await.is_empty()
        })
        .await
    );
    let sent = server.received_of_type("subscribe_feed").await;
    assert_eq!(sent[0]["data"]["topic"], "migrations");

    manager.dispose();
    server.shutdown().await;
}

#[tokio::test]
async fn test_reconnects_after_server_close() {
    let server = MockPushServer::start().await;
    let manager = manager_for(server.url());
    let client = manager.client("/ws/trading");

    client.connect();
    assert!(wait_for_status(&client, ConnectionStatus::Connected).await);

    server.close_all();
    let srv = &server;
    assert!(eventually(WAIT, move || async move { srv.connection_count().await >= 2 }).await);
    assert!(wait_for_status(&client, ConnectionStatus::Connected).await);
    assert_eq!(client.reconnect_count(), 0);

    manager.dispose();
    server.shutdown().await;
}

#[tokio::test]
async fn test_disconnect_suppresses_reconnection() {
    let server = MockPushServer::start().await;
    let manager = manager_for(server.url());
    let client = manager.client("/ws/trading");

    client.connect();
    assert!(wait_for_status(&client, ConnectionStatus::Connected).await);

    client.disconnect();
    assert_eq!(client.status(), ConnectionStatus::Disconnected);
    assert!(!client.emit("ping", serde_json::json!({})));

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(server.connection_count().await, 1);
    assert_eq!(client.status(), ConnectionStatus::Disconnected);

    server.shutdown().await;
}

#[tokio::test]
async fn test_gives_up_after_max_attempts() {
    let manager = TransportManager::new(TransportConfig {
        base_url: unused_url().await,
        max_reconnect_attempts: 2,
        reconnect_base_delay_ms: 10,
        reconnect_max_delay_ms: 50,
        heartbeat_interval_ms: 30_000,
    });
    let client = manager.client("/ws/trading");

    client.connect();
    let c = &client;
    assert!(eventually(WAIT, move || async move { !c.is_running() }).await);
    assert_eq!(client.status(), ConnectionStatus::Error);
}

#[tokio::test]
async fn test_heartbeat_pings_server() {
    let server = MockPushServer::start().await;
    let manager = TransportManager::new(TransportConfig {
        base_url: server.url(),
        heartbeat_interval_ms: 50,
        ..Default::default()
    });
    let client = manager.client("/ws/trading");

    let pongs = Arc::new(AtomicUsize::new(0));
    let counter = pongs.clone();
    let _sub = client.on("pong", move |_env| {
        counter.fetch_add(1, Ordering::Relaxed);
    });

    client.connect();
    let srv = &server;
    assert!(
        eventually(WAIT, move || async move {
            srv.received_of_type("ping").await.len() >= 2
        })
        .await
    );
    let p = &pongs;
    assert!(eventually(WAIT, move || async move { p.load(Ordering::Relaxed) > 0 }).await);

    let stats = client.heartbeat_stats();
    assert!(stats.pings_sent >= 2);
    assert!(stats.last_message_at.is_some());
    assert!(stats.last_pong_at.is_some());

    manager.dispose();
    server.shutdown().await;
}

#[tokio::test]
async fn test_unsubscribe_stops_delivery() {
    let server = MockPushServer::start().await;
    let manager = manager_for(server.url());
    let client = manager.client("/ws/trading");

    let first = Arc::new(AtomicUsize::new(0));
    let second = Arc::new(AtomicUsize::new(0));
    let (a, b) = (first.clone(), second.clone());
    let sub_a = client.on("stats_update", move |_env| {
        a.fetch_add(1, Ordering::Relaxed);
    });
    let _sub_b = client.on("stats_update", move |_env| {
        b.fetch_add(1, Ordering::Relaxed);
    });

    client.connect();
    assert!(wait_for_status(&client, ConnectionStatus::Connected).await);

    server.push("stats_update", serde_json::json!({}));
    let seen_b = &second;
    assert!(eventually(WAIT, move || async move { seen_b.load(Ordering::Relaxed) == 1 }).await);

    assert!(sub_a.unsubscribe());
    server.push("stats_update", serde_json::json!({}));
    assert!(eventually(WAIT, move || async move { seen_b.load(Ordering::Relaxed) == 2 }).await);
    assert_eq!(first.load(Ordering::Relaxed), 1);

    manager.dispose();
    server.shutdown().await;
}
