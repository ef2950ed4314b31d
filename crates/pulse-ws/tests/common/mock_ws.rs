//! Mock push server for integration tests.
//!
//! Provides a WebSocket server that can:
//! - Accept connections and greet them with a `connected` message
//! - Push envelopes to every open connection
//! - Drop every open connection on demand
//! - Record received messages

use futures_util::{SinkExt, StreamExt};
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio_tungstenite::{accept_async, tungstenite::Message};

#[derive(Debug, Clone)]
enum ServerCommand {
    Send(String),
    CloseAll,
}

/// A mock push server for testing.
pub struct MockPushServer {
    addr: SocketAddr,
    shutdown_tx: mpsc::Sender<()>,
    commands: broadcast::Sender<ServerCommand>,
    messages: Arc<Mutex<VecDeque<String>>>,
    connections: Arc<Mutex<u32>>,
}

impl MockPushServer {
    /// Start a new mock server on an available port.
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let messages: Arc<Mutex<VecDeque<String>>> = Arc::new(Mutex::new(VecDeque::new()));
        let connections: Arc<Mutex<u32>> = Arc::new(Mutex::new(0));
        let (commands, _) = broadcast::channel(64);
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

        let messages_clone = messages.clone();
        let connections_clone = connections.clone();
        let commands_clone = commands.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    Ok((stream, _)) = listener.accept() => {
                        let messages = messages_clone.clone();
                        let connections = connections_clone.clone();
                        let command_rx = commands_clone.subscribe();
                        tokio::spawn(handle_connection(stream, messages, connections, command_rx));
                    }
                    _ = shutdown_rx.recv() => {
                        break;
                    }
                }
            }
        });

        Self {
            addr,
            shutdown_tx,
            commands,
            messages,
            connections,
        }
    }

    /// Base URL of the server.
    pub fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Number of connections accepted so far.
    pub async fn connection_count(&self) -> u32 {
        *self.connections.lock().await
    }

    /// All received text messages.
    pub async fn received_messages(&self) -> Vec<String> {
        self.messages.lock().await.iter().cloned().collect()
    }

    /// Received messages whose `type` equals `event_type`.
    pub async fn received_of_type(&self, event_type: &str) -> Vec<serde_json::Value> {
        self.received_messages()
            .await
            .iter()
            .filter_map(|m| serde_json::from_str::<serde_json::Value>(m).ok())
            .filter(|v| v["type"] == event_type)
            .collect()
    }

    /// Push an envelope to every open connection.
    pub fn push(&self, event_type: &str, data: serde_json::Value) {
        let envelope = serde_json::json!({
            "type": event_type,
            "data": data,
            "timestamp": 1_700_000_000_000_i64,
        });
        let _ = self.commands.send(ServerCommand::Send(envelope.to_string()));
    }

    /// Close every open connection from the server side.
    pub fn close_all(&self) {
        let _ = self.commands.send(ServerCommand::CloseAll);
    }

    /// Shutdown the server.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
    }
}

async fn handle_connection(
    stream: TcpStream,
    messages: Arc<Mutex<VecDeque<String>>>,
    connections: Arc<Mutex<u32>>,
    mut command_rx: broadcast::Receiver<ServerCommand>,
) {
    let connection_id = {
        let mut count = connections.lock().await;
        *count += 1;
        *count
    };

    let ws_stream = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            eprintln!("WebSocket handshake failed: {}", e);
            return;
        }
    };

    let (mut write, mut read) = ws_stream.split();

    let greeting = serde_json::json!({
        "type": "connected",
        "data": { "message": "welcome" },
        "timestamp": 1_700_000_000_000_i64,
        "clientId": format!("client-{connection_id}"),
    });
    if write.send(Message::Text(greeting.to_string())).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        messages.lock().await.push_back(text.clone());
                        if let Ok(parsed) = serde_json::from_str::<serde_json::Value>(&text) {
                            if parsed["type"] == "ping" {
                                let pong = serde_json::json!({
                                    "type": "pong",
                                    "data": {},
                                    "timestamp": 1_700_000_000_000_i64,
                                });
                                let _ = write.send(Message::Text(pong.to_string())).await;
                            }
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        let _ = write.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    _ => {}
                }
            }
            cmd = command_rx.recv() => {
                match cmd {
                    Ok(ServerCommand::Send(text)) => {
                        if write.send(Message::Text(text)).await.is_err() {
                            break;
                        }
                    }
                    Ok(ServerCommand::CloseAll) => {
                        let _ = write.send(Message::Close(None)).await;
                        break;
                    }
                    Err(_) => {}
                }
            }
        }
    }
}
