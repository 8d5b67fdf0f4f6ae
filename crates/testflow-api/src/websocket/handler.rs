//! WebSocket connection handler.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::state::AppState;

use super::message::WsMessage;

/// WebSocket upgrade handler.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle a WebSocket connection for its lifetime.
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let connection_id = Uuid::new_v4().to_string();
    info!("WebSocket connected: {}", connection_id);

    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = tokio::sync::mpsc::channel::<WsMessage>(100);

    // Send connected message
    let connected = WsMessage::Connected {
        connection_id: connection_id.clone(),
    };
    if let Ok(json) = serde_json::to_string(&connected) {
        let _ = sender.send(Message::Text(json.into())).await;
    }

    // Spawn sender task
    let sender_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if let Ok(json) = serde_json::to_string(&msg) {
                if sender.send(Message::Text(json.into())).await.is_err() {
                    break;
                }
            }
        }
    });

    // Handle incoming messages
    while let Some(result) = receiver.next().await {
        match result {
            Ok(Message::Text(text)) => {
                debug!("Received: {}", text);
                if let Ok(ws_msg) = serde_json::from_str::<WsMessage>(&text) {
                    handle_message(ws_msg, &tx, &connection_id, &state).await;
                } else {
                    warn!("Failed to parse WebSocket message");
                    let _ = tx
                        .send(WsMessage::error("PARSE_ERROR", "Failed to parse message"))
                        .await;
                }
            }
            Ok(Message::Close(_)) => {
                info!("WebSocket closed: {}", connection_id);
                break;
            }
            Ok(Message::Ping(data)) => {
                debug!("Ping received");
                let _ = data;
            }
            Err(e) => {
                error!("WebSocket error: {}", e);
                break;
            }
            _ => {}
        }
    }

    // Cleanup
    state.hub.remove_connection(&connection_id);
    sender_task.abort();
    info!("WebSocket disconnected: {}", connection_id);
}

/// Handle a parsed WebSocket message.
async fn handle_message(
    msg: WsMessage,
    tx: &tokio::sync::mpsc::Sender<WsMessage>,
    connection_id: &str,
    state: &Arc<AppState>,
) {
    match msg {
        WsMessage::Ping { timestamp } => {
            let _ = tx.send(WsMessage::Pong { timestamp }).await;
        }
        WsMessage::SubscribeToAutomation { automation_id } => {
            state.hub.subscribe(&automation_id, connection_id, tx.clone());
            let _ = tx.send(WsMessage::Subscribed { automation_id }).await;
        }
        WsMessage::Pong { .. } => {
            debug!("Pong received from {}", connection_id);
        }
        _ => {
            warn!("Unhandled message type");
        }
    }
}
