//! Per-connection relay session.
//!
//! A [`RelaySession`] pairs one client socket with one [`UpstreamConnector`].
//! All of its state lives in explicit fields and is only touched from inside
//! the session task: the client reader and the connector report into a single
//! event channel, and [`RelaySession::run`] dispatches each event to a named
//! handler one at a time.
//!
//! # State machine
//!
//! ```text
//! Init ──start──▶ Connecting ──connected──▶ Ready
//!                    ▲                        │
//!                    └──upstream closed, ─────┘
//!                       retries remain
//!
//! Connecting | Ready ──client close / connect failure / retries exhausted──▶ Closed
//! ```

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::base::{
    ClientRoute, RelayError, RelayMessage, RelayResult, SessionEvent, SessionState,
    UpstreamConnector, UpstreamEvent,
};
use super::queue::MessageQueue;
use super::retry::RetryPolicy;

/// Stateful pairing of one client connection and one upstream connection.
pub struct RelaySession<U: UpstreamConnector> {
    id: Uuid,
    state: SessionState,

    /// Outbound leg
    upstream: U,
    /// Whether the connector holds a connection (or an attempt in flight)
    upstream_active: bool,
    /// Attempt number of the connection the session is currently tracking
    attempt: u32,

    /// Client frames received before the upstream became ready
    queue: MessageQueue,
    retry: RetryPolicy,

    /// Writer side of the client socket
    client_tx: mpsc::Sender<ClientRoute>,
    client_open: bool,

    events_tx: mpsc::UnboundedSender<SessionEvent>,
    events_rx: mpsc::UnboundedReceiver<SessionEvent>,
}

impl<U: UpstreamConnector> RelaySession<U> {
    /// Create a session in the `Init` state.
    ///
    /// Returns the session together with the sender the client reader uses to
    /// report frames and disconnects.
    pub fn new(
        upstream: U,
        client_tx: mpsc::Sender<ClientRoute>,
        retry: RetryPolicy,
    ) -> (Self, mpsc::UnboundedSender<SessionEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let session = Self {
            id: Uuid::new_v4(),
            state: SessionState::Init,
            upstream,
            upstream_active: false,
            attempt: 0,
            queue: MessageQueue::new(),
            retry,
            client_tx,
            client_open: true,
            events_tx: events_tx.clone(),
            events_rx,
        };

        (session, events_tx)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Attempt number of the current upstream connection (0 for the first).
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn retry(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Number of client frames waiting for upstream readiness.
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    pub fn is_client_open(&self) -> bool {
        self.client_open
    }

    /// Start the session and process events until it closes.
    pub async fn run(mut self) {
        self.start();

        while self.state != SessionState::Closed {
            match self.events_rx.recv().await {
                Some(event) => self.handle_event(event).await,
                None => {
                    self.on_client_close().await;
                    break;
                }
            }
        }
    }

    /// Begin the first upstream connection attempt.
    pub fn start(&mut self) {
        if self.state != SessionState::Init {
            return;
        }

        info!(session_id = %self.id, "Relay session started, connecting to upstream");
        self.begin_attempt();
    }

    /// Dispatch one event to its handler.
    pub async fn handle_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::ClientMessage(message) => self.on_client_message(message).await,
            SessionEvent::ClientClosed => self.on_client_close().await,
            SessionEvent::Upstream { attempt, event } => {
                if attempt != self.attempt {
                    debug!(
                        session_id = %self.id,
                        attempt,
                        current = self.attempt,
                        "Ignoring event from superseded upstream attempt"
                    );
                    return;
                }

                match event {
                    UpstreamEvent::Connected => self.on_upstream_connect_success().await,
                    UpstreamEvent::ConnectFailed(e) => self.on_upstream_connect_failure(e).await,
                    UpstreamEvent::Message(message) => self.on_upstream_event(message).await,
                    UpstreamEvent::Closed { code, reason } => {
                        self.on_upstream_close(code, reason).await
                    }
                }
            }
        }
    }

    /// Frame received from the client.
    pub async fn on_client_message(&mut self, message: RelayMessage) {
        match self.state {
            SessionState::Closed => {
                debug!(session_id = %self.id, "Session closed, dropping client message");
            }
            SessionState::Init | SessionState::Connecting => {
                self.queue.enqueue(message);
                debug!(
                    session_id = %self.id,
                    queued = self.queue.len(),
                    "Upstream not ready, queueing client message"
                );
            }
            SessionState::Ready => {
                if let Err(e) = self.forward_upstream(message).await {
                    warn!(session_id = %self.id, error = %e, "Dropping client message");
                }
            }
        }
    }

    /// Frame received from the upstream.
    pub async fn on_upstream_event(&mut self, message: RelayMessage) {
        if self.state == SessionState::Closed {
            return;
        }

        let event_type = message.event_type_hint();

        if !self.client_open {
            debug!(
                session_id = %self.id,
                event_type = %event_type,
                "Client socket is not open, dropping upstream event"
            );
            return;
        }

        debug!(session_id = %self.id, event_type = %event_type, "Relaying event to client");

        if self
            .client_tx
            .send(ClientRoute::Message(message))
            .await
            .is_err()
        {
            self.client_open = false;
            let e = RelayError::SendOnClosedPeer("client".to_string());
            warn!(session_id = %self.id, error = %e, event_type = %event_type, "Dropping upstream event");
        }
    }

    /// Client socket closed. Safe to call more than once.
    pub async fn on_client_close(&mut self) {
        if self.state == SessionState::Closed {
            debug!(session_id = %self.id, "Client close after teardown, nothing to do");
            return;
        }

        info!(session_id = %self.id, "Client socket closed");
        self.client_open = false;
        self.close_upstream().await;
        self.finalize("client disconnected");
    }

    /// Upstream connection ended after having connected.
    pub async fn on_upstream_close(&mut self, code: Option<u16>, reason: String) {
        if self.state == SessionState::Closed {
            return;
        }

        self.upstream_active = false;
        let e = RelayError::UpstreamDisconnect(format!("code={code:?} reason={reason:?}"));
        info!(session_id = %self.id, attempt = self.attempt, error = %e, "Upstream connection closed");

        // A client that left while the upstream was open cancels the reconnect.
        if !self.client_open {
            self.finalize("client disconnected");
            return;
        }

        if self.retry.attempt() {
            info!(
                session_id = %self.id,
                "Retrying upstream connection ({}/{})",
                self.retry.count(),
                self.retry.max_retries()
            );
            self.attempt += 1;
            self.begin_attempt();
        } else {
            warn!(
                session_id = %self.id,
                max_retries = self.retry.max_retries(),
                "Max retries reached, closing client connection"
            );
            self.close_client().await;
            self.finalize("upstream retries exhausted");
        }
    }

    /// Upstream handshake completed: mark ready and drain the queue.
    pub async fn on_upstream_connect_success(&mut self) {
        if self.state != SessionState::Connecting {
            debug!(session_id = %self.id, state = %self.state, "Ignoring late upstream connect");
            return;
        }

        self.state = SessionState::Ready;
        info!(session_id = %self.id, attempt = self.attempt, "Connected to upstream");

        let pending = self.queue.drain_all();
        if !pending.is_empty() {
            info!(session_id = %self.id, count = pending.len(), "Relaying queued client messages");
        }

        for message in pending {
            if let Err(e) = self.forward_upstream(message).await {
                warn!(session_id = %self.id, error = %e, "Dropping queued client message");
            }
        }
    }

    /// Upstream handshake failed. Fatal regardless of remaining retries.
    pub async fn on_upstream_connect_failure(&mut self, error: RelayError) {
        if self.state == SessionState::Closed {
            return;
        }

        error!(
            session_id = %self.id,
            attempt = self.attempt,
            error = %error,
            "Error connecting to upstream, closing client connection"
        );
        self.upstream_active = false;
        self.close_client().await;
        self.finalize("upstream connect failed");
    }

    fn begin_attempt(&mut self) {
        self.state = SessionState::Connecting;
        self.upstream_active = true;
        debug!(session_id = %self.id, attempt = self.attempt, "Requesting upstream connection");
        self.upstream.connect(self.id, self.attempt, self.events_tx.clone());
    }

    async fn forward_upstream(&mut self, message: RelayMessage) -> RelayResult<()> {
        let envelope = message.parse_envelope()?;
        debug!(
            session_id = %self.id,
            event_type = envelope.type_name(),
            "Relaying event to upstream"
        );
        self.upstream.send(message).await
    }

    async fn close_upstream(&mut self) {
        if self.upstream_active {
            self.upstream_active = false;
            self.upstream.close().await;
        }
    }

    async fn close_client(&mut self) {
        if self.client_open {
            self.client_open = false;
            // The writer may already be gone; the socket closes either way.
            let _ = self.client_tx.send(ClientRoute::Close).await;
        }
    }

    fn finalize(&mut self, reason: &str) {
        self.state = SessionState::Closed;

        if !self.queue.is_empty() {
            let dropped = self.queue.drain_all().len();
            debug!(session_id = %self.id, dropped, "Discarding queued client messages");
        }

        info!(
            session_id = %self.id,
            reason,
            retries = self.retry.count(),
            "Relay session closed"
        );
    }
}
