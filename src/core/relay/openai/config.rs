//! OpenAI Realtime API upstream configuration.
//!
//! Holds the server-side credential and builds the authenticated handshake
//! request. The credential only ever leaves this struct inside the
//! `Authorization` header of the outbound request.

use std::fmt;
use std::time::Duration;

use http::{HeaderValue, header::AUTHORIZATION};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use url::Url;
use zeroize::Zeroize;

use crate::core::relay::base::{RelayError, RelayResult};

/// OpenAI Realtime API WebSocket endpoint.
pub const OPENAI_REALTIME_URL: &str = "wss://api.openai.com/v1/realtime";

/// Model requested when none is configured.
pub const DEFAULT_REALTIME_MODEL: &str = "gpt-4o-realtime-preview-2024-10-01";

/// Feature-flag header required by the Realtime API beta.
pub const OPENAI_BETA_HEADER: &str = "OpenAI-Beta";
pub const OPENAI_BETA_VALUE: &str = "realtime=v1";

/// Process-wide upstream settings shared read-only by every session.
#[derive(Clone)]
pub struct UpstreamConfig {
    /// Base endpoint URL (`ws://` or `wss://`)
    pub url: String,
    /// Model passed as the `model` query parameter; empty to omit
    pub model: String,
    /// Bearer credential
    pub api_key: String,
    /// Optional bound on the upstream handshake
    pub connect_timeout: Option<Duration>,
}

impl UpstreamConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            url: OPENAI_REALTIME_URL.to_string(),
            model: DEFAULT_REALTIME_MODEL.to_string(),
            api_key: api_key.into(),
            connect_timeout: None,
        }
    }

    /// Full endpoint URL including the model query parameter.
    pub fn endpoint(&self) -> Result<Url, url::ParseError> {
        let mut url = Url::parse(&self.url)?;
        if !self.model.is_empty() {
            url.query_pairs_mut().append_pair("model", &self.model);
        }
        Ok(url)
    }

    /// Build the WebSocket handshake request with credential headers attached.
    pub fn build_request(&self) -> RelayResult<Request> {
        let endpoint = self
            .endpoint()
            .map_err(|e| RelayError::UpstreamConnect(format!("invalid upstream URL: {e}")))?;

        let mut request = endpoint
            .as_str()
            .into_client_request()
            .map_err(|e| RelayError::UpstreamConnect(e.to_string()))?;

        let mut bearer = HeaderValue::from_str(&format!("Bearer {}", self.api_key))
            .map_err(|_| RelayError::UpstreamConnect("API key is not a valid header value".to_string()))?;
        bearer.set_sensitive(true);

        let headers = request.headers_mut();
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(OPENAI_BETA_HEADER, HeaderValue::from_static(OPENAI_BETA_VALUE));

        Ok(request)
    }
}

impl fmt::Debug for UpstreamConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpstreamConfig")
            .field("url", &self.url)
            .field("model", &self.model)
            .field("api_key", &"[REDACTED]")
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

impl Drop for UpstreamConfig {
    fn drop(&mut self) {
        self.api_key.zeroize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_appends_model() {
        let config = UpstreamConfig::new("sk-test");
        assert_eq!(
            config.endpoint().unwrap().as_str(),
            "wss://api.openai.com/v1/realtime?model=gpt-4o-realtime-preview-2024-10-01"
        );
    }

    #[test]
    fn test_endpoint_without_model() {
        let mut config = UpstreamConfig::new("sk-test");
        config.url = "ws://127.0.0.1:9000/realtime".to_string();
        config.model = String::new();
        assert_eq!(config.endpoint().unwrap().as_str(), "ws://127.0.0.1:9000/realtime");
    }

    #[test]
    fn test_build_request_attaches_credential_headers() {
        let config = UpstreamConfig::new("sk-test");
        let request = config.build_request().unwrap();

        assert_eq!(
            request.headers().get(AUTHORIZATION).unwrap(),
            "Bearer sk-test"
        );
        assert_eq!(
            request.headers().get(OPENAI_BETA_HEADER).unwrap(),
            OPENAI_BETA_VALUE
        );
        assert_eq!(request.uri().host(), Some("api.openai.com"));
    }

    #[test]
    fn test_build_request_rejects_bad_url() {
        let mut config = UpstreamConfig::new("sk-test");
        config.url = "not a url".to_string();
        match config.build_request() {
            Err(RelayError::UpstreamConnect(msg)) => assert!(msg.contains("invalid upstream URL")),
            other => panic!("Expected UpstreamConnect error, got {:?}", other),
        }
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let config = UpstreamConfig::new("sk-very-secret");
        let debug = format!("{:?}", config);
        assert!(!debug.contains("sk-very-secret"));
        assert!(debug.contains("[REDACTED]"));
    }
}
