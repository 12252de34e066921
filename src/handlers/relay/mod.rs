//! Relay WebSocket handlers
//!
//! Clients connect to the configured relay path and speak the OpenAI Realtime
//! event protocol directly. The relay adds no framing of its own:
//!
//! ## Client → Server
//!
//! - JSON event objects (`session.update`, `input_audio_buffer.append`, ...),
//!   forwarded upstream once the upstream connection is ready. Frames sent
//!   earlier are queued in arrival order.
//!
//! ## Server → Client
//!
//! - Every upstream frame, unmodified.
//! - A close frame when the upstream cannot be (re)established.
//!
//! Upgrades on any other path are accepted and closed immediately.

mod handler;

pub use handler::{reject_handler, relay_handler};
