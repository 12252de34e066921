//! OpenAI Realtime API upstream.
//!
//! - Endpoint: `wss://api.openai.com/v1/realtime?model=<model>`
//! - Headers: `Authorization: Bearer <key>`, `OpenAI-Beta: realtime=v1`
//! - Protocol: WebSocket with JSON events, relayed verbatim

mod client;
mod config;

pub use client::OpenAIUpstream;
pub use config::{
    DEFAULT_REALTIME_MODEL, OPENAI_BETA_HEADER, OPENAI_BETA_VALUE, OPENAI_REALTIME_URL,
    UpstreamConfig,
};
