//! OpenAI Realtime API upstream connector.
//!
//! Implements [`UpstreamConnector`] over `tokio-tungstenite`. Each call to
//! [`UpstreamConnector::connect`] spawns one connection task that performs the
//! authenticated handshake, then pumps frames in both directions until either
//! side closes. The task reports back to the session over the session's event
//! channel and never reconnects by itself.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::config::UpstreamConfig;
use crate::core::relay::base::{
    RelayError, RelayMessage, RelayResult, SessionEvent, UpstreamConnector, UpstreamEvent,
};

/// Channel capacity for frames waiting to be written upstream.
const WS_CHANNEL_CAPACITY: usize = 256;

/// Upper bound on the close handshake once the relay asks to close.
const CLOSE_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

type UpstreamStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Upstream connector for the OpenAI Realtime API.
pub struct OpenAIUpstream {
    /// Shared endpoint and credential
    config: Arc<UpstreamConfig>,
    /// Writer channel of the current connection task
    ws_sender: Option<mpsc::Sender<RelayMessage>>,
    /// Current connection task
    connection_handle: Option<JoinHandle<()>>,
    /// Set by the connection task once its handshake completes
    connected: Arc<AtomicBool>,
}

impl OpenAIUpstream {
    pub fn new(config: Arc<UpstreamConfig>) -> Self {
        Self {
            config,
            ws_sender: None,
            connection_handle: None,
            connected: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Whether a connection task is accepting frames.
    pub fn is_open(&self) -> bool {
        self.ws_sender
            .as_ref()
            .map(|sender| !sender.is_closed())
            .unwrap_or(false)
    }

    /// Whether the current connection task completed its handshake.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Abort the connection task if its handshake has not completed yet.
    ///
    /// Established connections are left to finish their close handshake.
    fn abort_pending_handshake(&mut self) {
        if self.is_connected() {
            return;
        }
        if let Some(handle) = self.connection_handle.take() {
            handle.abort();
        }
    }

    /// Perform the handshake, bounded by the configured timeout if any.
    async fn open(config: &UpstreamConfig) -> RelayResult<UpstreamStream> {
        let request = config.build_request()?;
        let connect = tokio_tungstenite::connect_async(request);

        let result = match config.connect_timeout {
            Some(limit) => tokio::time::timeout(limit, connect)
                .await
                .map_err(|_| RelayError::ConnectTimeout(limit.as_secs()))?,
            None => connect.await,
        };

        let (ws_stream, _response) =
            result.map_err(|e| RelayError::UpstreamConnect(e.to_string()))?;
        Ok(ws_stream)
    }

    /// Body of one connection task.
    async fn run_connection(
        config: Arc<UpstreamConfig>,
        session_id: Uuid,
        attempt: u32,
        connected: Arc<AtomicBool>,
        mut outbound: mpsc::Receiver<RelayMessage>,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) {
        // The session may already be gone; nothing left to notify then.
        let report = |event: UpstreamEvent| {
            let _ = events.send(SessionEvent::Upstream { attempt, event });
        };

        info!(session_id = %session_id, attempt = attempt + 1, "Connecting to upstream");

        let ws_stream = match Self::open(&config).await {
            Ok(stream) => stream,
            Err(e) => {
                error!(session_id = %session_id, attempt = attempt + 1, error = %e, "Error connecting to upstream");
                report(UpstreamEvent::ConnectFailed(e));
                return;
            }
        };

        connected.store(true, Ordering::SeqCst);
        info!(session_id = %session_id, attempt = attempt + 1, "Upstream WebSocket handshake completed");
        report(UpstreamEvent::Connected);

        let (mut ws_sink, mut ws_stream) = ws_stream.split();
        let mut close_code: Option<u16> = None;
        let mut close_reason = String::new();

        loop {
            tokio::select! {
                // Handle outgoing frames
                outgoing = outbound.recv() => match outgoing {
                    Some(message) => {
                        if let Err(e) = ws_sink.send(into_ws_message(message)).await {
                            error!(session_id = %session_id, error = %e, "Failed to send upstream WebSocket message");
                            close_reason = e.to_string();
                            break;
                        }
                    }
                    None => {
                        // Sender dropped: the session asked us to close
                        debug!(session_id = %session_id, "Closing upstream WebSocket");
                        match tokio::time::timeout(CLOSE_HANDSHAKE_TIMEOUT, ws_sink.close()).await {
                            Ok(Ok(())) => {}
                            Ok(Err(e)) => {
                                debug!(session_id = %session_id, error = %e, "Upstream close handshake failed");
                            }
                            Err(_) => {
                                debug!(session_id = %session_id, "Upstream close handshake timed out");
                            }
                        }
                        close_reason = "closed by relay".to_string();
                        break;
                    }
                },

                // Handle incoming frames
                incoming = ws_stream.next() => match incoming {
                    Some(Ok(Message::Text(text))) => {
                        report(UpstreamEvent::Message(RelayMessage::Text(text.as_str().to_owned())));
                    }
                    Some(Ok(Message::Binary(data))) => {
                        report(UpstreamEvent::Message(RelayMessage::Binary(data)));
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if let Err(e) = ws_sink.send(Message::Pong(data)).await {
                            error!(session_id = %session_id, error = %e, "Failed to send pong");
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        if let Some(frame) = frame {
                            close_code = Some(u16::from(frame.code));
                            close_reason = frame.reason.as_str().to_owned();
                        }
                        info!(session_id = %session_id, code = ?close_code, "Upstream WebSocket closed by server");
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(session_id = %session_id, error = %e, "Upstream WebSocket error");
                        close_reason = e.to_string();
                        break;
                    }
                    None => break,
                },
            }
        }

        report(UpstreamEvent::Closed {
            code: close_code,
            reason: close_reason,
        });
    }
}

fn into_ws_message(message: RelayMessage) -> Message {
    match message {
        RelayMessage::Text(text) => Message::Text(text.into()),
        RelayMessage::Binary(data) => Message::Binary(data),
    }
}

#[async_trait]
impl UpstreamConnector for OpenAIUpstream {
    fn connect(
        &mut self,
        session_id: Uuid,
        attempt: u32,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) {
        // At most one connection per connector
        if let Some(handle) = self.connection_handle.take() {
            handle.abort();
        }

        let (tx, rx) = mpsc::channel(WS_CHANNEL_CAPACITY);
        self.ws_sender = Some(tx);

        // Fresh flag per attempt so a stale task cannot mark this one connected
        self.connected = Arc::new(AtomicBool::new(false));

        self.connection_handle = Some(tokio::spawn(Self::run_connection(
            self.config.clone(),
            session_id,
            attempt,
            self.connected.clone(),
            rx,
            events,
        )));
    }

    async fn send(&mut self, message: RelayMessage) -> RelayResult<()> {
        let sender = self.ws_sender.as_ref().ok_or(RelayError::NotConnected)?;
        sender
            .send(message)
            .await
            .map_err(|_| RelayError::SendOnClosedPeer("upstream".to_string()))
    }

    async fn close(&mut self) {
        // Dropping the sender lets an established connection finish the close
        // handshake; a handshake still in flight is abandoned
        if self.ws_sender.take().is_some() {
            info!("Closing upstream connection");
        }
        self.abort_pending_handshake();
    }
}

impl Drop for OpenAIUpstream {
    fn drop(&mut self) {
        self.abort_pending_handshake();
    }
}
