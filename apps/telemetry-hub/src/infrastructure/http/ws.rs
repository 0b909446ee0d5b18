//! Live push channel.
//!
//! Each WebSocket connection is one hub subscriber. Events arrive as JSON
//! text frames shaped `{"event": "...", "data": {...}}`.

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};

use super::AppState;
use crate::infrastructure::broadcast::SharedBroadcastHub;

/// Upgrade the connection and attach it to the broadcast hub.
pub(super) async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state.hub))
}

async fn handle_socket(socket: WebSocket, hub: SharedBroadcastHub) {
    let mut subscription = hub.subscribe();
    let id = subscription.id();
    tracing::info!(subscriber = %id, "Client connected");

    let (mut sink, mut stream) = socket.split();

    let mut send_task = tokio::spawn(async move {
        while let Some(event) = subscription.recv().await {
            let text = match serde_json::to_string(&event) {
                Ok(text) => text,
                Err(e) => {
                    tracing::error!(subscriber = %id, error = %e, "Failed to encode event");
                    continue;
                }
            };
            if sink.send(Message::Text(text.into())).await.is_err() {
                tracing::debug!(subscriber = %id, "WebSocket sink closed");
                break;
            }
        }
    });

    // Inbound frames carry nothing; only watch for the peer going away.
    let mut recv_task = tokio::spawn(async move {
        while let Some(result) = stream.next().await {
            match result {
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(e) => {
                    tracing::debug!(subscriber = %id, error = %e, "WebSocket receive error");
                    break;
                }
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    hub.unregister(id);
    tracing::info!(subscriber = %id, "Client disconnected");
}
