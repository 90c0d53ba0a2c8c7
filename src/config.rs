//! Configuration parsing.
//!
//! The client reads a TOML file (default `./config/docqa.toml`):
//!
//! ```toml
//! [service]
//! base_url = "http://127.0.0.1:8000"
//! connect_timeout_secs = 10
//!
//! [chat]
//! entertainment = false
//!
//! [log]
//! filter = "warn"
//! ```
//!
//! Only `[service].base_url` is required.

use anyhow::{Context, Result};
use reqwest::Url;
use serde::Deserialize;
use std::path::Path;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub service: ServiceConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    pub base_url: String,
    /// Bounds connection establishment only. Answer streams are never
    /// timed out.
    #[serde(default)]
    pub connect_timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ChatConfig {
    /// Default for `--entertainment` on `ask` and `chat`.
    #[serde(default)]
    pub entertainment: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogConfig {
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

fn default_log_filter() -> String {
    "warn".to_string()
}

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";

impl Config {
    /// Used when no config file exists: a local service on the default port.
    pub fn minimal() -> Self {
        Self {
            service: ServiceConfig {
                base_url: DEFAULT_BASE_URL.to_string(),
                connect_timeout_secs: None,
            },
            chat: ChatConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl ServiceConfig {
    pub fn url(&self) -> Result<Url> {
        Url::parse(&self.base_url)
            .with_context(|| format!("service.base_url is not a valid URL: {}", self.base_url))
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    let url = config.service.url()?;
    match url.scheme() {
        "http" | "https" => {}
        other => anyhow::bail!(
            "Unsupported service.base_url scheme: '{}'. Must be http or https.",
            other
        ),
    }
    if url.host_str().is_none() {
        anyhow::bail!("service.base_url must include a host");
    }

    if config.service.connect_timeout_secs == Some(0) {
        anyhow::bail!("service.connect_timeout_secs must be > 0");
    }

    EnvFilter::try_new(&config.log.filter)
        .with_context(|| format!("log.filter is not a valid filter: '{}'", config.log.filter))?;

    Ok(())
}
