//! WebSocket broadcast server.
//!
//! Streams transcription records to every connected client. The pipeline
//! side is a fire-and-forget `RecordSink`; delivery is best-effort and a
//! slow client only loses its own messages.

use crate::error::Result;
use crate::pipeline::sink::RecordSink;
use crate::pipeline::types::Emission;
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use axum::routing::any;
use axum::Router;
use chrono::{SecondsFormat, Utc};
use futures_util::{SinkExt, StreamExt};
use log::{debug, info, warn};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::broadcast;

/// Broadcast queue depth per server; lagging clients skip messages.
const CHANNEL_CAPACITY: usize = 256;

#[derive(Clone)]
struct ServerState {
    tx: broadcast::Sender<String>,
    clients: Arc<AtomicUsize>,
}

/// Messages clients may send.
#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientMessage {
    Ping,
    StatusRequest,
    #[serde(other)]
    Unknown,
}

/// WebSocket fan-out server.
pub struct WsServer {
    host: String,
    port: u16,
    state: ServerState,
}

impl WsServer {
    pub fn new(host: &str, port: u16) -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            host: host.to_string(),
            port,
            state: ServerState {
                tx,
                clients: Arc::new(AtomicUsize::new(0)),
            },
        }
    }

    /// Sink handle feeding this server.
    pub fn sink(&self) -> WsSink {
        WsSink {
            tx: self.state.tx.clone(),
        }
    }

    /// Bind and serve until the task is dropped.
    pub async fn run(self) -> Result<()> {
        let app = Router::new()
            .route("/", any(ws_handler))
            .with_state(self.state);

        let addr = format!("{}:{}", self.host, self.port);
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        info!("websocket server listening on ws://{}", addr);
        axum::serve(listener, app).await?;
        Ok(())
    }
}

async fn ws_handler(upgrade: WebSocketUpgrade, State(state): State<ServerState>) -> Response {
    upgrade.on_upgrade(move |socket| handle_client(socket, state))
}

async fn handle_client(socket: WebSocket, state: ServerState) {
    let clients = state.clients.fetch_add(1, Ordering::SeqCst) + 1;
    info!("client connected, total={}", clients);

    let (mut ws_tx, mut ws_rx) = socket.split();
    let mut feed = state.tx.subscribe();

    let welcome = json!({
        "type": "status",
        "message": "Connected to livesense transcription stream",
        "timestamp": now_rfc3339(),
        "clients_connected": clients,
    });
    if ws_tx
        .send(Message::Text(welcome.to_string().into()))
        .await
        .is_err()
    {
        state.clients.fetch_sub(1, Ordering::SeqCst);
        return;
    }

    loop {
        tokio::select! {
            broadcasted = feed.recv() => match broadcasted {
                Ok(payload) => {
                    if ws_tx.send(Message::Text(payload.into())).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!("client lagged, skipped {} records", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            incoming = ws_rx.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    if let Some(reply) = handle_message(&text, &state) {
                        if ws_tx.send(Message::Text(reply.into())).await.is_err() {
                            break;
                        }
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!("client socket error: {}", e);
                    break;
                }
            },
        }
    }

    let remaining = state.clients.fetch_sub(1, Ordering::SeqCst) - 1;
    info!("client disconnected, total={}", remaining);
}

fn handle_message(text: &str, state: &ServerState) -> Option<String> {
    let message = match serde_json::from_str::<ClientMessage>(text) {
        Ok(message) => message,
        Err(_) => {
            warn!("invalid client message: {}", text);
            return None;
        }
    };

    match message {
        ClientMessage::Ping => Some(
            json!({ "type": "pong", "timestamp": now_rfc3339() }).to_string(),
        ),
        ClientMessage::StatusRequest => Some(
            json!({
                "type": "status",
                "message": "transcription service running",
                "timestamp": now_rfc3339(),
                "clients_connected": state.clients.load(Ordering::SeqCst),
            })
            .to_string(),
        ),
        ClientMessage::Unknown => None,
    }
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Pipeline-side sink pushing records into the broadcast channel.
///
/// `broadcast::Sender::send` never blocks; with no clients connected the
/// record is simply discarded.
pub struct WsSink {
    tx: broadcast::Sender<String>,
}

impl RecordSink for WsSink {
    fn broadcast(&mut self, emission: &Emission) -> Result<()> {
        match serde_json::to_string(&emission.record) {
            Ok(payload) => {
                // Err here only means no subscribers; that's fine.
                let _ = self.tx.send(payload);
                Ok(())
            }
            Err(e) => {
                debug!("record serialization failed: {}", e);
                Ok(())
            }
        }
    }

    fn name(&self) -> &'static str {
        "websocket"
    }
}
