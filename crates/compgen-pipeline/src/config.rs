//! Process configuration read from the environment (and `.env`).

use std::net::SocketAddr;
use std::time::Duration;

use compgen_harness::vendors::cerebras::API_KEY_ENV;

pub const BASE_URL_ENV: &str = "COMPGEN_BASE_URL";
pub const MODEL_ENV: &str = "COMPGEN_MODEL";
pub const TIMEOUT_ENV: &str = "COMPGEN_TIMEOUT_SECS";
pub const STRICT_EXPORT_ENV: &str = "COMPGEN_STRICT_EXPORT";
pub const BIND_ENV: &str = "COMPGEN_BIND";

pub const DEFAULT_MODEL: &str = "llama3.1-8b";
const DEFAULT_TIMEOUT_SECS: u64 = 60;
const DEFAULT_BIND: &str = "127.0.0.1:3000";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },
}

/// Settings shared by the CLI and the HTTP server.
///
/// The API key may be absent here; a generation started without it ends
/// with a configuration error instead of a network call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppConfig {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub model: String,
    pub timeout: Duration,
    pub strict_export: bool,
    pub bind: SocketAddr,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: None,
            model: DEFAULT_MODEL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            strict_export: false,
            bind: DEFAULT_BIND
                .parse()
                .unwrap_or_else(|_| SocketAddr::from(([127, 0, 0, 1], 3000))),
        }
    }
}

impl AppConfig {
    /// Loads `.env` (if present) and then reads the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let mut config = Self {
            api_key: get(API_KEY_ENV),
            base_url: get(BASE_URL_ENV),
            ..Self::default()
        };
        if let Some(model) = get(MODEL_ENV) {
            config.model = model.trim().to_string();
        }
        if let Some(raw) = get(TIMEOUT_ENV) {
            let secs: u64 = raw
                .trim()
                .parse()
                .ok()
                .filter(|secs| *secs > 0)
                .ok_or(ConfigError::InvalidValue {
                    key: TIMEOUT_ENV,
                    value: raw.clone(),
                })?;
            config.timeout = Duration::from_secs(secs);
        }
        if let Some(raw) = get(STRICT_EXPORT_ENV) {
            config.strict_export = parse_bool(&raw).ok_or(ConfigError::InvalidValue {
                key: STRICT_EXPORT_ENV,
                value: raw.clone(),
            })?;
        }
        if let Some(raw) = get(BIND_ENV) {
            config.bind = raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: BIND_ENV,
                value: raw.clone(),
            })?;
        }
        Ok(config)
    }
}

pub(crate) fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" | "enabled" => Some(true),
        "0" | "false" | "no" | "off" | "disabled" => Some(false),
        _ => None,
    }
}
