//! Environment configuration for petkat
//!
//! The backend base URL is required and validated at startup (fail fast).
//! The LLM credential is deliberately NOT checked here: it is read lazily by
//! the provider so a missing key fails the chat request, not the process.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// Environment variable naming the forecasting backend origin.
pub const API_URL_VAR: &str = "FORECAST_API_URL";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{API_URL_VAR} environment variable not set")]
    MissingApiUrl,

    #[error("{API_URL_VAR} is not a valid URL: {0}")]
    InvalidApiUrl(String),

    #[error("invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },
}

/// Main configuration structure
#[derive(Debug, Clone)]
pub struct Config {
    pub api: ApiConfig,
    pub server: ServerConfig,
    pub chat: ChatConfig,
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Backend origin; all endpoint paths are joined onto this.
    pub base_url: Url,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    pub model: String,
    pub max_tokens: u32,
    /// Hard ceiling on sequential tool-invocation rounds per user turn.
    pub max_tool_rounds: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            model: "claude-sonnet-4-20250514".to_string(),
            max_tokens: 1024,
            max_tool_rounds: 5,
        }
    }
}

impl Config {
    /// Load configuration from process environment variables.
    ///
    /// `FORECAST_API_URL` is required; `PETKAT_HOST`, `PETKAT_PORT` and
    /// `ANTHROPIC_MODEL` are optional overrides.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build a config from an arbitrary variable lookup (testable seam).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let raw_url = lookup(API_URL_VAR).ok_or(ConfigError::MissingApiUrl)?;
        let base_url = parse_base_url(&raw_url)?;

        let mut server = ServerConfig::default();
        if let Some(host) = lookup("PETKAT_HOST") {
            server.host = host;
        }
        if let Some(port) = lookup("PETKAT_PORT") {
            server.port = port.parse().map_err(|_| ConfigError::InvalidValue {
                name: "PETKAT_PORT",
                value: port,
            })?;
        }

        let mut chat = ChatConfig::default();
        if let Some(model) = lookup("ANTHROPIC_MODEL") {
            chat.model = model;
        }

        Ok(Self {
            api: ApiConfig { base_url },
            server,
            chat,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Config pointing at a throwaway backend, defaults everywhere else.
    #[cfg(test)]
    pub fn for_tests(base_url: Url) -> Self {
        Self {
            api: ApiConfig { base_url },
            server: ServerConfig::default(),
            chat: ChatConfig::default(),
        }
    }
}

fn parse_base_url(raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw).map_err(|e| ConfigError::InvalidApiUrl(e.to_string()))?;
    // The client appends path segments; origins like `mailto:` cannot take them.
    if url.cannot_be_a_base() {
        return Err(ConfigError::InvalidApiUrl(format!(
            "{raw} cannot serve as a base URL"
        )));
    }
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ConfigError::InvalidApiUrl(format!(
            "unsupported scheme: {other}"
        ))),
    }
}
