use std::env;
use std::fmt::Display;
use std::str::FromStr;

use super::ConfigError;

/// Values read from the process environment.
///
/// Every field is optional here; defaults and the required-credential check
/// are applied when merging into [`super::ServerConfig`].
#[derive(Debug, Clone, Default)]
pub struct EnvConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub relay_path: Option<String>,
    pub openai_api_key: Option<String>,
    pub upstream_url: Option<String>,
    pub upstream_model: Option<String>,
    pub max_retries: Option<u32>,
    pub connect_timeout_seconds: Option<u64>,
}

impl EnvConfig {
    pub fn load() -> Result<Self, ConfigError> {
        Ok(Self {
            host: var("HOST"),
            port: parse_var("PORT")?,
            relay_path: var("RELAY_PATH"),
            openai_api_key: var("OPENAI_API_KEY"),
            upstream_url: var("OPENAI_REALTIME_URL"),
            upstream_model: var("OPENAI_REALTIME_MODEL"),
            max_retries: parse_var("RELAY_MAX_RETRIES")?,
            connect_timeout_seconds: parse_var("UPSTREAM_CONNECT_TIMEOUT_SECONDS")?,
        })
    }
}

/// Read a variable, treating blank values as unset.
fn var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_var<T>(name: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    var(name)
        .map(|raw| {
            raw.parse::<T>().map_err(|e| ConfigError::InvalidValue {
                name,
                message: format!("{raw:?}: {e}"),
            })
        })
        .transpose()
}
