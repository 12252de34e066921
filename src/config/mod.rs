//! Configuration module for the relay server
//!
//! This module handles server configuration from .env files, YAML files, and
//! environment variables. Priority: YAML > ENV vars > .env values > defaults.
//!
//! # Modules
//! - `env`: Environment variable loading
//! - `yaml`: YAML configuration file loading
//!
//! # Example
//! ```rust,no_run
//! use realtime_relay::config::ServerConfig;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load from environment variables only
//! let config = ServerConfig::from_env()?;
//!
//! // Load from YAML file with environment variable base
//! let config = ServerConfig::from_file(&PathBuf::from("relay.yaml"))?;
//!
//! println!("Relay listening on {}", config.address());
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;
use url::Url;
use zeroize::Zeroize;

use crate::core::relay::openai::{DEFAULT_REALTIME_MODEL, OPENAI_REALTIME_URL, UpstreamConfig};
use crate::core::relay::DEFAULT_MAX_RETRIES;

mod env;
mod yaml;

pub use env::EnvConfig;
pub use yaml::{ServerYaml, UpstreamYaml, YamlConfig};

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8081;
pub const DEFAULT_RELAY_PATH: &str = "/";

/// Startup configuration errors. Any of these aborts the process.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("OPENAI_API_KEY is not defined; set it in the environment, a .env file, or upstream.api_key")]
    MissingCredential,

    #[error("Invalid value for {name}: {message}")]
    InvalidValue { name: &'static str, message: String },

    #[error("Failed to read config file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {}: {source}", path.display())]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Server configuration
///
/// Contains everything needed to run the relay:
/// - Listener settings (host, port, accepted path)
/// - Upstream endpoint, model, and credential
/// - Reconnect bound and optional handshake timeout
#[derive(Clone)]
pub struct ServerConfig {
    // Listener settings
    pub host: String,
    pub port: u16,
    /// The only request path that gets a relay session
    pub relay_path: String,

    // Upstream settings
    /// OpenAI API key, attached to upstream handshakes and never sent to clients
    pub openai_api_key: String,
    pub upstream_url: String,
    pub upstream_model: String,

    /// Reconnects allowed per session after the upstream drops
    /// Default: 3
    pub max_retries: u32,
    /// Upstream handshake timeout
    /// Default: None (wait for the transport to fail)
    pub connect_timeout_seconds: Option<u64>,
}

/// Zeroize the credential when the configuration is dropped.
impl Drop for ServerConfig {
    fn drop(&mut self) {
        self.openai_api_key.zeroize();
    }
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("relay_path", &self.relay_path)
            .field("openai_api_key", &"[REDACTED]")
            .field("upstream_url", &self.upstream_url)
            .field("upstream_model", &self.upstream_model)
            .field("max_retries", &self.max_retries)
            .field("connect_timeout_seconds", &self.connect_timeout_seconds)
            .finish()
    }
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// `.env` values are expected to have been loaded into the environment
    /// already (done in `main`).
    ///
    /// # Errors
    /// Returns [`ConfigError::MissingCredential`] if `OPENAI_API_KEY` is unset,
    /// or [`ConfigError::InvalidValue`] if any variable fails to parse or
    /// validate.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::merge(EnvConfig::load()?, None)
    }

    /// Load configuration from a YAML file with environment variable base
    ///
    /// Environment variables provide the base configuration and YAML values
    /// override them. The merged result is validated.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let yaml = YamlConfig::from_file(path)?;
        Self::merge(EnvConfig::load()?, Some(yaml))
    }

    fn merge(env: EnvConfig, yaml: Option<YamlConfig>) -> Result<Self, ConfigError> {
        let yaml = yaml.unwrap_or_default();
        let server = yaml.server.unwrap_or_default();
        let upstream = yaml.upstream.unwrap_or_default();

        let openai_api_key = upstream
            .api_key
            .or(env.openai_api_key)
            .filter(|key| !key.trim().is_empty())
            .ok_or(ConfigError::MissingCredential)?;

        let config = Self {
            host: server
                .host
                .or(env.host)
                .unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: server.port.or(env.port).unwrap_or(DEFAULT_PORT),
            relay_path: server
                .path
                .or(env.relay_path)
                .unwrap_or_else(|| DEFAULT_RELAY_PATH.to_string()),
            openai_api_key,
            upstream_url: upstream
                .url
                .or(env.upstream_url)
                .unwrap_or_else(|| OPENAI_REALTIME_URL.to_string()),
            upstream_model: upstream
                .model
                .or(env.upstream_model)
                .unwrap_or_else(|| DEFAULT_REALTIME_MODEL.to_string()),
            max_retries: upstream
                .max_retries
                .or(env.max_retries)
                .unwrap_or(DEFAULT_MAX_RETRIES),
            connect_timeout_seconds: upstream
                .connect_timeout_seconds
                .or(env.connect_timeout_seconds),
        };

        config.validate()?;
        Ok(config)
    }

    /// Check the merged configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.openai_api_key.trim().is_empty() {
            return Err(ConfigError::MissingCredential);
        }

        if !self.relay_path.starts_with('/') {
            return Err(ConfigError::InvalidValue {
                name: "RELAY_PATH",
                message: format!("{:?} must start with '/'", self.relay_path),
            });
        }

        let url = Url::parse(&self.upstream_url).map_err(|e| ConfigError::InvalidValue {
            name: "OPENAI_REALTIME_URL",
            message: e.to_string(),
        })?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(ConfigError::InvalidValue {
                name: "OPENAI_REALTIME_URL",
                message: format!("unsupported scheme {:?}, expected ws or wss", url.scheme()),
            });
        }

        if self.connect_timeout_seconds == Some(0) {
            return Err(ConfigError::InvalidValue {
                name: "UPSTREAM_CONNECT_TIMEOUT_SECONDS",
                message: "must be greater than zero".to_string(),
            });
        }

        Ok(())
    }

    /// Get the server address as "host:port"
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Upstream settings shared by all sessions.
    pub fn upstream_config(&self) -> UpstreamConfig {
        let mut upstream = UpstreamConfig::new(self.openai_api_key.clone());
        upstream.url = self.upstream_url.clone();
        upstream.model = self.upstream_model.clone();
        upstream.connect_timeout = self.connect_timeout_seconds.map(Duration::from_secs);
        upstream
    }
}
