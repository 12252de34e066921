//! Relay WebSocket handler
//!
//! Splits each accepted client socket into a reader loop and a writer task,
//! and runs one [`RelaySession`] per socket in between them.

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade, rejection::WebSocketUpgradeRejection},
    },
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::select;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::core::relay::{
    ClientRoute, OpenAIUpstream, RelayMessage, RelaySession, SessionEvent,
};
use crate::state::AppState;

/// Client writer channel capacity
const CHANNEL_BUFFER_SIZE: usize = 1024;

/// Maximum WebSocket frame size (10 MB)
const MAX_WS_FRAME_SIZE: usize = 10 * 1024 * 1024;

/// Maximum WebSocket message size (10 MB)
const MAX_WS_MESSAGE_SIZE: usize = 10 * 1024 * 1024;

/// Relay WebSocket handler
///
/// Upgrades the connection and starts a relay session for it. The upstream
/// connection is opened by the session, never by the client.
///
/// # Arguments
/// * `ws` - The WebSocket upgrade request from Axum
/// * `state` - Application state holding the upstream configuration
pub async fn relay_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    debug!("Relay WebSocket connection upgrade requested");

    ws.max_frame_size(MAX_WS_FRAME_SIZE)
        .max_message_size(MAX_WS_MESSAGE_SIZE)
        .on_upgrade(move |socket| handle_relay_socket(socket, state))
}

/// Fallback for every path other than the relay path.
///
/// WebSocket upgrades are accepted and closed right away without opening an
/// upstream connection. Plain HTTP requests get a 404.
pub async fn reject_handler(
    uri: Uri,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    match ws {
        Ok(ws) => {
            info!("Invalid path {}, closing connection", uri.path());
            ws.on_upgrade(|mut socket| async move {
                if let Err(e) = socket.send(Message::Close(None)).await {
                    debug!("Failed to close rejected WebSocket: {}", e);
                }
            })
        }
        Err(_) => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Handle one relay WebSocket connection
async fn handle_relay_socket(socket: WebSocket, app_state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let (client_tx, mut client_rx) = mpsc::channel::<ClientRoute>(CHANNEL_BUFFER_SIZE);

    // Sender task for outgoing frames
    let sender_task = tokio::spawn(async move {
        while let Some(route) = client_rx.recv().await {
            let should_close = matches!(route, ClientRoute::Close);

            let result = match route {
                ClientRoute::Message(RelayMessage::Text(text)) => {
                    sender.send(Message::Text(text.into())).await
                }
                ClientRoute::Message(RelayMessage::Binary(data)) => {
                    sender.send(Message::Binary(data)).await
                }
                ClientRoute::Close => {
                    info!("Closing client WebSocket connection");
                    sender.send(Message::Close(None)).await
                }
            };

            if let Err(e) = result {
                error!("Failed to send WebSocket message: {}", e);
                break;
            }

            if should_close {
                break;
            }
        }
    });

    let upstream = OpenAIUpstream::new(app_state.upstream.clone());
    let (session, events) = RelaySession::new(upstream, client_tx, app_state.retry_policy());
    let session_id = session.id();
    info!(session_id = %session_id, "Relay WebSocket connection established");

    let mut session_task = tokio::spawn(session.run());
    let mut session_running = true;

    loop {
        select! {
            msg_result = receiver.next() => {
                let message = match msg_result {
                    Some(Ok(Message::Text(text))) => RelayMessage::Text(text.as_str().to_owned()),
                    Some(Ok(Message::Binary(data))) => RelayMessage::Binary(data),
                    Some(Ok(Message::Close(_))) | None => {
                        info!(session_id = %session_id, "Client disconnected");
                        break;
                    }
                    // Ping replies are sent by axum
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        warn!(session_id = %session_id, "Client WebSocket error: {}", e);
                        break;
                    }
                };

                if events.send(SessionEvent::ClientMessage(message)).is_err() {
                    break;
                }
            }
            result = &mut session_task => {
                session_running = false;
                if let Err(e) = result {
                    error!(session_id = %session_id, "Relay session task failed: {}", e);
                }
                break;
            }
        }
    }

    // Cleanup
    if session_running {
        let _ = events.send(SessionEvent::ClientClosed);
        if let Err(e) = session_task.await {
            error!(session_id = %session_id, "Relay session task failed: {}", e);
        }
    }
    drop(events);

    // The session owned the last writer handle, so the sender task drains and exits
    if let Err(e) = sender_task.await {
        error!(session_id = %session_id, "Client writer task failed: {}", e);
    }

    info!(session_id = %session_id, "Relay WebSocket connection terminated");
}
