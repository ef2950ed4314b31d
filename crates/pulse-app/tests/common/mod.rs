//! Backend push server stand-in for end-to-end tests.
//!
//! Accepts connections on any path, greets each with a `connected` message,
//! and pushes envelopes to the connections of one path.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, Mutex};
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::accept_hdr_async;

#[derive(Debug, Clone)]
struct Push {
    path: String,
    text: String,
}

pub struct MockPushServer {
    addr: SocketAddr,
    pushes: broadcast::Sender<Push>,
    paths: Arc<Mutex<Vec<String>>>,
}

impl MockPushServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (pushes, _) = broadcast::channel(64);
        let paths = Arc::new(Mutex::new(Vec::new()));

        let pushes_clone = pushes.clone();
        let paths_clone = paths.clone();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(handle_connection(
                    stream,
                    paths_clone.clone(),
                    pushes_clone.subscribe(),
                ));
            }
        });

        Self {
            addr,
            pushes,
            paths,
        }
    }

    pub fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Paths with an open handshake so far.
    pub async fn connected_paths(&self) -> Vec<String> {
        let mut paths = self.paths.lock().await.clone();
        paths.sort();
        paths
    }

    /// Push an envelope to every connection on `path`.
    pub fn push(&self, path: &str, event_type: &str, data: serde_json::Value) {
        let envelope = serde_json::json!({
            "type": event_type,
            "data": data,
            "timestamp": 1_700_000_000_000_i64,
        });
        let _ = self.pushes.send(Push {
            path: path.to_string(),
            text: envelope.to_string(),
        });
    }
}

async fn handle_connection(
    stream: TcpStream,
    paths: Arc<Mutex<Vec<String>>>,
    mut pushes: broadcast::Receiver<Push>,
) {
    let mut path = String::new();
    let ws_stream = match accept_hdr_async(stream, |req: &Request, resp: Response| {
        path = req.uri().path().to_string();
        Ok::<Response, ErrorResponse>(resp)
    })
    .await
    {
        Ok(ws) => ws,
        Err(e) => {
            eprintln!("WebSocket handshake failed: {}", e);
            return;
        }
    };
    paths.lock().await.push(path.clone());

    let (mut write, mut read) = ws_stream.split();
    let greeting = serde_json::json!({
        "type": "connected",
        "data": {},
        "timestamp": 1_700_000_000_000_i64,
        "clientId": format!("client{path}"),
    });
    if write.send(Message::Text(greeting.to_string())).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            msg = read.next() => match msg {
                Some(Ok(Message::Ping(data))) => {
                    let _ = write.send(Message::Pong(data)).await;
                }
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                _ => {}
            },
            push = pushes.recv() => match push {
                Ok(push) if push.path == path => {
                    if write.send(Message::Text(push.text)).await.is_err() {
                        break;
                    }
                }
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }
}

/// Poll `check` every 10ms until it returns true or `within` elapses.
pub async fn eventually<F, Fut>(within: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + within;
    loop {
        if check().await {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
