//! Base traits and types for the relay.
//!
//! This module defines the pieces shared by the session and the upstream
//! connector: the error taxonomy, the raw message type that flows in both
//! directions, the session event channel payloads, and the
//! [`UpstreamConnector`] trait the session drives.

use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur while relaying a session.
///
/// Every variant is contained within the session that raised it.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Client frame was not a JSON object
    #[error("Malformed client event: {0}")]
    ClientProtocol(String),

    /// Upstream handshake failed
    #[error("Upstream connection failed: {0}")]
    UpstreamConnect(String),

    /// Upstream handshake did not complete in time
    #[error("Upstream connection timed out after {0}s")]
    ConnectTimeout(u64),

    /// Upstream closed after having connected
    #[error("Upstream disconnected: {0}")]
    UpstreamDisconnect(String),

    /// Forward attempted after the receiving peer already closed
    #[error("Peer already closed: {0}")]
    SendOnClosedPeer(String),

    /// No active upstream connection
    #[error("Not connected")]
    NotConnected,
}

/// Result type for relay operations.
pub type RelayResult<T> = Result<T, RelayError>;

// =============================================================================
// Messages
// =============================================================================

/// A raw frame relayed between the client and the upstream.
///
/// The payload is never rewritten; text frames stay text and binary frames
/// stay binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayMessage {
    Text(String),
    Binary(Bytes),
}

impl RelayMessage {
    /// Raw payload bytes.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Text(text) => text.as_bytes(),
            Self::Binary(data) => data,
        }
    }

    /// Payload length in bytes.
    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Parse the payload as an event envelope.
    ///
    /// Only the outer JSON object is checked; the rest of the payload is
    /// opaque to the relay.
    pub fn parse_envelope(&self) -> RelayResult<EventEnvelope> {
        let object: Map<String, Value> = serde_json::from_slice(self.as_bytes())
            .map_err(|e| RelayError::ClientProtocol(e.to_string()))?;

        let event_type = object
            .get("type")
            .and_then(Value::as_str)
            .map(str::to_owned);

        Ok(EventEnvelope { event_type })
    }

    /// Event type for log lines, without failing on unparseable payloads.
    pub fn event_type_hint(&self) -> String {
        match self.parse_envelope() {
            Ok(envelope) => envelope.type_name().to_string(),
            Err(_) => "<unparsed>".to_string(),
        }
    }
}

impl From<String> for RelayMessage {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for RelayMessage {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<Bytes> for RelayMessage {
    fn from(data: Bytes) -> Self {
        Self::Binary(data)
    }
}

/// Outer envelope of a relayed event: `{"type": "...", ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EventEnvelope {
    pub event_type: Option<String>,
}

impl EventEnvelope {
    pub fn type_name(&self) -> &str {
        self.event_type.as_deref().unwrap_or("<untyped>")
    }
}

// =============================================================================
// Session State
// =============================================================================

/// Lifecycle of a relay session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// Created, no upstream attempt yet
    #[default]
    Init,
    /// An upstream handshake is in flight
    Connecting,
    /// Upstream handshake completed; messages are forwarded directly
    Ready,
    /// Torn down; terminal
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Init => write!(f, "init"),
            Self::Connecting => write!(f, "connecting"),
            Self::Ready => write!(f, "ready"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

// =============================================================================
// Session Events
// =============================================================================

/// Outcome reported by an upstream connector for one connection attempt.
#[derive(Debug)]
pub enum UpstreamEvent {
    /// Handshake completed
    Connected,
    /// Handshake failed
    ConnectFailed(RelayError),
    /// Inbound frame from the upstream
    Message(RelayMessage),
    /// Connection ended after having connected
    Closed { code: Option<u16>, reason: String },
}

/// Everything a session reacts to, delivered over its event channel.
#[derive(Debug)]
pub enum SessionEvent {
    /// Frame received from the client
    ClientMessage(RelayMessage),
    /// Client socket closed or errored
    ClientClosed,
    /// Outcome of the upstream connection attempt numbered `attempt`
    Upstream { attempt: u32, event: UpstreamEvent },
}

/// Commands routed to the client socket writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientRoute {
    Message(RelayMessage),
    Close,
}

// =============================================================================
// Upstream Connector Trait
// =============================================================================

/// Outbound leg of a relay session.
///
/// An implementation owns at most one upstream connection at a time. It never
/// reconnects on its own: every attempt is requested by the session through
/// [`UpstreamConnector::connect`].
#[async_trait]
pub trait UpstreamConnector: Send {
    /// Start connection attempt `attempt` on behalf of session `session_id`.
    ///
    /// Returns immediately. Outcomes are delivered on `events` as
    /// [`SessionEvent::Upstream`] tagged with `attempt`: first exactly one of
    /// `Connected` or `ConnectFailed`, then after `Connected` any number of
    /// `Message` followed by one `Closed`.
    fn connect(
        &mut self,
        session_id: Uuid,
        attempt: u32,
        events: mpsc::UnboundedSender<SessionEvent>,
    );

    /// Send a frame over the current connection.
    async fn send(&mut self, message: RelayMessage) -> RelayResult<()>;

    /// Close the current connection. A handshake still in flight is
    /// abandoned. Calling it again is a no-op.
    async fn close(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_envelope_extracts_type() {
        let msg = RelayMessage::from(r#"{"type":"ping"}"#);
        let envelope = msg.parse_envelope().unwrap();
        assert_eq!(envelope.event_type.as_deref(), Some("ping"));
    }

    #[test]
    fn test_parse_envelope_binary_frame() {
        let msg = RelayMessage::Binary(Bytes::from_static(br#"{"type":"input_audio_buffer.append","audio":"AAAA"}"#));
        assert_eq!(msg.event_type_hint(), "input_audio_buffer.append");
    }

    #[test]
    fn test_parse_envelope_without_type() {
        let msg = RelayMessage::from(r#"{"foo":1}"#);
        let envelope = msg.parse_envelope().unwrap();
        assert_eq!(envelope.event_type, None);
        assert_eq!(envelope.type_name(), "<untyped>");
    }

    #[test]
    fn test_parse_envelope_rejects_malformed_json() {
        let msg = RelayMessage::from("not json {");
        match msg.parse_envelope() {
            Err(RelayError::ClientProtocol(_)) => {}
            other => panic!("Expected ClientProtocol error, got {:?}", other),
        }
        assert_eq!(msg.event_type_hint(), "<unparsed>");
    }

    #[test]
    fn test_parse_envelope_rejects_non_object() {
        assert!(RelayMessage::from("42").parse_envelope().is_err());
        assert!(RelayMessage::from(r#"["type","ping"]"#).parse_envelope().is_err());
    }

    #[test]
    fn test_non_string_type_is_untyped() {
        let msg = RelayMessage::from(r#"{"type":7}"#);
        assert_eq!(msg.parse_envelope().unwrap().type_name(), "<untyped>");
    }

    #[test]
    fn test_session_state_display() {
        assert_eq!(SessionState::default(), SessionState::Init);
        assert_eq!(SessionState::Connecting.to_string(), "connecting");
        assert_eq!(SessionState::Closed.to_string(), "closed");
    }
}
