use std::sync::Arc;

use crate::config::ServerConfig;
use crate::core::relay::{RetryPolicy, UpstreamConfig};

/// Shared application state handed to every request handler.
pub struct AppState {
    pub config: ServerConfig,
    /// Upstream endpoint and credential, shared by all relay sessions
    pub upstream: Arc<UpstreamConfig>,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Arc<Self> {
        let upstream = Arc::new(config.upstream_config());
        Arc::new(Self { config, upstream })
    }

    /// Fresh retry budget for a new session.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.config.max_retries)
    }
}
