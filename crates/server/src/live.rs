//! WebSocket endpoint: binds each upgraded socket into the broadcast hub.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::hub::{EventType, WsEvent};
use crate::state::AppState;

pub async fn ws_upgrade(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws(socket, state))
}

async fn handle_ws(socket: WebSocket, state: Arc<AppState>) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
    let connection_id = state.hub.register(tx.clone());

    // Welcome event, sent exactly once per connection.
    let welcome = WsEvent::new(
        EventType::ConnectionEstablished,
        serde_json::json!({ "message": "connected to maintenance alert stream" }),
    );
    if !state.hub.send_to(connection_id, &welcome) {
        return;
    }

    // Forward hub messages to this client.
    let send_task = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            let closing = matches!(message, Message::Close(_));
            if sink.send(message).await.is_err() || closing {
                break;
            }
        }
    });

    // Consume client frames: answer ping, stop on close, ignore the rest.
    let ping_tx = tx.clone();
    let recv_task = tokio::spawn(async move {
        while let Some(Ok(message)) = stream.next().await {
            match message {
                Message::Text(text) => handle_client_frame(&ping_tx, text.as_str()),
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = send_task => {},
        _ = recv_task => {},
    }

    state.hub.unregister(connection_id);
    debug!(connection_id, "websocket session ended");
}

fn handle_client_frame(tx: &mpsc::UnboundedSender<Message>, text: &str) {
    let parsed: serde_json::Value = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(e) => {
            warn!(error = %e, "ignoring unparseable websocket frame");
            return;
        }
    };

    if parsed.get("type").and_then(|t| t.as_str()) == Some("ping") {
        let pong = WsEvent::new(EventType::Pong, serde_json::json!({}));
        let body = serde_json::to_string(&pong).unwrap_or_default();
        let _ = tx.send(Message::Text(body.into()));
    }
}
