//! WebSocket request handlers
//!
//! - `relay` - Client ⇄ OpenAI Realtime relay socket and path rejection

pub mod relay;

pub use relay::{reject_handler, relay_handler};
