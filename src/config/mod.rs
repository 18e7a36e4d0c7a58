//! Configuration system for qcwatch
//!
//! Supports loading configuration from:
//! 1. CLI --config argument (`.json` or `.toml`)
//! 2. ~/.config/qcwatch/config.{QCWATCH_ENV}.json
//! 3. Default values
//!
//! Where QCWATCH_ENV can be: production (default), development, test
//!
//! # Examples
//!
//! ```no_run
//! use qcwatch::config::AppConfig;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AppConfig::load(None)?;
//! println!("Backend: {}", config.api.base_url);
//! # Ok(())
//! # }
//! ```
//!
//! ## Environment Variables
//!
//! Environment variables override config file values:
//! - QCWATCH_API_URL
//! - QCWATCH_MAX_RECONNECT
//! - QCWATCH_RECONNECT_INTERVAL_MS

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::progress::EarlierStepPolicy;
use crate::sse::ReconnectPolicy;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse config JSON: {0}")]
    ParseError(#[from] serde_json::Error),

    #[error("Failed to parse config TOML: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Backend REST settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Timeout for plain REST calls in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Connect timeout for streams; the stream itself never times out
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

fn default_base_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_connect_timeout() -> u64 {
    10
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

impl ApiConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// Progress stream settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SseSettings {
    #[serde(default = "default_max_reconnect")]
    pub max_reconnect_attempts: u32,

    #[serde(default = "default_reconnect_interval")]
    pub reconnect_interval_ms: u64,
}

fn default_max_reconnect() -> u32 {
    3
}

fn default_reconnect_interval() -> u64 {
    3000
}

impl Default for SseSettings {
    fn default() -> Self {
        Self {
            max_reconnect_attempts: default_max_reconnect(),
            reconnect_interval_ms: default_reconnect_interval(),
        }
    }
}

impl SseSettings {
    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            max_attempts: self.max_reconnect_attempts,
            interval: Duration::from_millis(self.reconnect_interval_ms),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Token storage file; defaults to the data dir
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_file: Option<PathBuf>,
}

impl AuthConfig {
    pub fn token_file(&self) -> PathBuf {
        self.token_file.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .map(|d| d.join("qcwatch").join("tokens.json"))
                .unwrap_or_else(|| PathBuf::from("qcwatch-tokens.json"))
        })
    }
}

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub sse: SseSettings,

    #[serde(default)]
    pub auth: AuthConfig,

    /// How the "later step implies earlier steps done" rule treats
    /// disabled steps
    #[serde(default)]
    pub earlier_step_policy: EarlierStepPolicy,

    /// Enable debug logging
    #[serde(default)]
    pub debug: bool,
}

impl AppConfig {
    /// Load configuration from file, format picked by extension
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let mut config: AppConfig = match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => toml::from_str(&content)?,
            _ => serde_json::from_str(&content)?,
        };

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Load configuration with standard priority:
    /// 1. Explicit path
    /// 2. ~/.config/qcwatch/config.{QCWATCH_ENV}.json
    /// 3. Defaults
    pub fn load(explicit_path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit_path {
            if path.exists() {
                tracing::info!("Loading config from: {:?}", path);
                return Self::from_file(path);
            } else {
                return Err(ConfigError::ValidationError(format!(
                    "Config file not found: {:?}",
                    path
                )));
            }
        }

        let env = std::env::var("QCWATCH_ENV").unwrap_or_else(|_| "production".to_string());

        if let Some(config_dir) = Self::config_dir() {
            let config_path = config_dir.join(format!("config.{}.json", env));

            if config_path.exists() {
                tracing::info!("Loading config from: {:?}", config_path);
                return Self::from_file(&config_path);
            }
        }

        tracing::info!("Using default configuration with environment overrides");
        let mut config = Self::default();
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("QCWATCH_API_URL") {
            self.api.base_url = url;
        }

        if let Ok(value) = std::env::var("QCWATCH_MAX_RECONNECT") {
            match value.parse() {
                Ok(n) => self.sse.max_reconnect_attempts = n,
                Err(_) => tracing::warn!("Ignoring QCWATCH_MAX_RECONNECT={}", value),
            }
        }

        if let Ok(value) = std::env::var("QCWATCH_RECONNECT_INTERVAL_MS") {
            match value.parse() {
                Ok(ms) => self.sse.reconnect_interval_ms = ms,
                Err(_) => tracing::warn!("Ignoring QCWATCH_RECONNECT_INTERVAL_MS={}", value),
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api.base_url.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "api.base_url cannot be empty".to_string(),
            ));
        }

        if !self.api.base_url.starts_with("http://") && !self.api.base_url.starts_with("https://")
        {
            return Err(ConfigError::ValidationError(format!(
                "api.base_url must be an http(s) URL, got {}",
                self.api.base_url
            )));
        }

        if self.api.request_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "api.request_timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.sse.max_reconnect_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "sse.max_reconnect_attempts must be greater than 0".to_string(),
            ));
        }

        if self.sse.reconnect_interval_ms == 0 {
            return Err(ConfigError::ValidationError(
                "sse.reconnect_interval_ms must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    pub fn config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("qcwatch"))
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
