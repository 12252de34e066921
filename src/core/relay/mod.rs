//! Client ⇄ upstream relay.
//!
//! Each accepted client socket gets its own [`RelaySession`], which owns an
//! [`UpstreamConnector`] (in production an [`OpenAIUpstream`]), a
//! [`MessageQueue`] for frames that arrive before the upstream is ready, and a
//! [`RetryPolicy`] bounding reconnects after the upstream drops.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use realtime_relay::core::relay::{OpenAIUpstream, RelaySession, RetryPolicy, UpstreamConfig};
//!
//! let upstream = OpenAIUpstream::new(Arc::new(UpstreamConfig::new("sk-...")));
//! let (client_tx, client_rx) = tokio::sync::mpsc::channel(1024);
//! let (session, events) = RelaySession::new(upstream, client_tx, RetryPolicy::default());
//! tokio::spawn(session.run());
//! ```

pub mod base;
pub mod openai;
mod queue;
mod retry;
mod session;

pub use base::{
    ClientRoute, EventEnvelope, RelayError, RelayMessage, RelayResult, SessionEvent, SessionState,
    UpstreamConnector, UpstreamEvent,
};
pub use openai::{OpenAIUpstream, UpstreamConfig};
pub use queue::MessageQueue;
pub use retry::{DEFAULT_MAX_RETRIES, RetryPolicy};
pub use session::RelaySession;
