//! WebSocket Mock Server for the OpenAI Realtime upstream
//!
//! Records every handshake and every frame it receives, and can be told to
//! stall the handshake, reject it, or drop connections right after accepting.

// Not every test binary uses every helper
#![allow(dead_code)]

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;

/// How the mock behaves on each connection
#[derive(Debug, Clone, Default)]
pub struct MockBehavior {
    /// Delay before answering the handshake
    pub handshake_delay: Duration,
    /// Text frames sent right after the handshake
    pub initial_events: Vec<String>,
    /// Binary frames sent after the text ones
    pub initial_binary: Vec<Bytes>,
    /// Number of connections (counted from the first) closed right after the
    /// initial events. `usize::MAX` drops every connection.
    pub close_first: usize,
    /// Answer every handshake with 401
    pub reject_handshake: bool,
}

/// Request data captured during the handshake
#[derive(Debug, Clone)]
pub struct RecordedHandshake {
    pub path: String,
    pub query: Option<String>,
    pub authorization: Option<String>,
    pub openai_beta: Option<String>,
}

#[derive(Default)]
pub struct MockState {
    pub handshakes: Mutex<Vec<RecordedHandshake>>,
    /// (connection index, text) for every text frame received
    pub received: Mutex<Vec<(usize, String)>>,
    /// (connection index, payload) for every binary frame received
    pub received_binary: Mutex<Vec<(usize, Bytes)>>,
    pub connections: AtomicUsize,
    pub disconnects: AtomicUsize,
}

pub struct MockUpstream {
    pub addr: SocketAddr,
    pub state: Arc<MockState>,
    handle: JoinHandle<()>,
}

impl MockUpstream {
    pub async fn start(behavior: MockBehavior) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(MockState::default());
        let behavior = Arc::new(behavior);

        let server_state = state.clone();
        let handle = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let state = server_state.clone();
                let behavior = behavior.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, state, behavior).await {
                        eprintln!("Mock upstream connection error: {}", e);
                    }
                });
            }
        });

        Self {
            addr,
            state,
            handle,
        }
    }

    pub fn url(&self) -> String {
        format!("ws://{}/v1/realtime", self.addr)
    }

    pub fn connections(&self) -> usize {
        self.state.connections.load(Ordering::SeqCst)
    }

    pub fn disconnects(&self) -> usize {
        self.state.disconnects.load(Ordering::SeqCst)
    }

    pub fn handshakes(&self) -> Vec<RecordedHandshake> {
        self.state.handshakes.lock().clone()
    }

    pub fn received(&self) -> Vec<(usize, String)> {
        self.state.received.lock().clone()
    }

    pub fn received_binary(&self) -> Vec<(usize, Bytes)> {
        self.state.received_binary.lock().clone()
    }

    pub fn received_texts(&self) -> Vec<String> {
        self.received().into_iter().map(|(_, text)| text).collect()
    }
}

impl Drop for MockUpstream {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn header_value(request: &Request, name: &str) -> Option<String> {
    request
        .headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned)
}

async fn handle_connection(
    stream: TcpStream,
    state: Arc<MockState>,
    behavior: Arc<MockBehavior>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    if !behavior.handshake_delay.is_zero() {
        tokio::time::sleep(behavior.handshake_delay).await;
    }

    let recorder = state.clone();
    let reject = behavior.reject_handshake;
    let callback = move |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
        recorder.handshakes.lock().push(RecordedHandshake {
            path: request.uri().path().to_owned(),
            query: request.uri().query().map(str::to_owned),
            authorization: header_value(request, "authorization"),
            openai_beta: header_value(request, "openai-beta"),
        });

        if reject {
            let mut error = ErrorResponse::new(Some("invalid api key".to_string()));
            *error.status_mut() = StatusCode::UNAUTHORIZED;
            return Err(error);
        }
        Ok(response)
    };

    let ws_stream = accept_hdr_async(stream, callback).await?;
    let index = state.connections.fetch_add(1, Ordering::SeqCst);
    let (mut write, mut read) = ws_stream.split();

    for event in &behavior.initial_events {
        write.send(Message::Text(event.clone().into())).await?;
    }
    for data in &behavior.initial_binary {
        write.send(Message::Binary(data.clone())).await?;
    }

    if index < behavior.close_first {
        write.send(Message::Close(None)).await?;
        state.disconnects.fetch_add(1, Ordering::SeqCst);
        return Ok(());
    }

    while let Some(msg) = read.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                state.received.lock().push((index, text.as_str().to_owned()));
            }
            Ok(Message::Binary(data)) => {
                state.received_binary.lock().push((index, data));
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                eprintln!("Mock upstream WebSocket error: {}", e);
                break;
            }
        }
    }

    state.disconnects.fetch_add(1, Ordering::SeqCst);
    Ok(())
}
