//! Relay WebSocket route configuration
//!
//! Exposes a single WebSocket endpoint on the configured relay path. Every
//! other path falls through to [`reject_handler`].

use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use crate::handlers::relay::{reject_handler, relay_handler};
use crate::state::AppState;
use std::sync::Arc;

/// Create the relay WebSocket router
///
/// # Endpoint
///
/// `GET {path}` - WebSocket upgrade for a relay session
///
/// # Protocol
///
/// Frames are relayed verbatim in both directions. Client events must be JSON
/// objects; anything else is dropped before reaching the upstream.
///
/// # Example
///
/// ```json
/// // Client sends
/// {"type": "session.update", "session": {"voice": "alloy"}}
///
/// // Upstream responds, relayed unmodified
/// {"type": "session.updated", "session": {"voice": "alloy"}}
/// ```
pub fn create_relay_router(path: &str) -> Router<Arc<AppState>> {
    Router::new()
        .route(path, get(relay_handler))
        .fallback(reject_handler)
        .layer(TraceLayer::new_for_http())
}

/// Build the complete application for the given state.
pub fn create_app(state: Arc<AppState>) -> Router {
    create_relay_router(&state.config.relay_path).with_state(state)
}
