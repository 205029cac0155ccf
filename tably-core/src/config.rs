//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/tably/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/tably/` (~/.config/tably/)
//! - Data: `$XDG_DATA_HOME/tably/` (~/.local/share/tably/)
//! - State/Logs: `$XDG_STATE_HOME/tably/` (~/.local/state/tably/)

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::PathBuf;

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_DATA_HOME or ~/.local/share
fn xdg_data_home() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/share"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Receipt recognizer service configuration
    #[serde(default)]
    pub recognizer: RecognizerConfig,

    /// History store configuration
    #[serde(default)]
    pub history: HistoryConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Receipt recognizer service configuration
#[derive(Debug, Deserialize, Clone)]
pub struct RecognizerConfig {
    /// Service base URL
    #[serde(default = "default_recognizer_endpoint")]
    pub endpoint: String,

    /// API key (required to scan receipts)
    pub api_key: Option<String>,

    /// Model used for extraction
    #[serde(default = "default_recognizer_model")]
    pub model: String,

    /// HTTP request timeout in seconds
    #[serde(default = "default_recognizer_timeout")]
    pub timeout_secs: u64,

    /// Max retry attempts for transient failures
    #[serde(default = "default_recognizer_max_retries")]
    pub max_retries: usize,
}

impl Default for RecognizerConfig {
    fn default() -> Self {
        Self {
            endpoint: default_recognizer_endpoint(),
            api_key: None,
            model: default_recognizer_model(),
            timeout_secs: default_recognizer_timeout(),
            max_retries: default_recognizer_max_retries(),
        }
    }
}

impl RecognizerConfig {
    /// Validate configuration, returning an error message if invalid
    pub fn validate(&self) -> Result<()> {
        if self.api_key.is_none() {
            return Err(Error::Config(
                "recognizer.api_key is required to scan receipts".to_string(),
            ));
        }
        if self.endpoint.trim().is_empty() {
            return Err(Error::Config(
                "recognizer.endpoint must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_recognizer_endpoint() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_recognizer_model() -> String {
    "gemini-3-flash-preview".to_string()
}

fn default_recognizer_timeout() -> u64 {
    60
}

fn default_recognizer_max_retries() -> usize {
    2
}

/// History store configuration
#[derive(Debug, Deserialize)]
pub struct HistoryConfig {
    /// Records retained, oldest evicted first
    #[serde(default = "default_history_max_records")]
    pub max_records: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_records: default_history_max_records(),
        }
    }
}

fn default_history_max_records() -> usize {
    10
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        Ok(config)
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/tably/config.toml` (~/.config/tably/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("tably").join("config.toml")
    }

    /// Returns the data directory path (for the history store)
    pub fn data_dir() -> PathBuf {
        xdg_data_home().join("tably")
    }

    /// Returns the state directory path (for logs)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("tably")
    }

    /// Returns the history store file path
    pub fn database_path() -> PathBuf {
        Self::data_dir().join("history.db")
    }

    /// Returns the log file path
    pub fn log_path() -> PathBuf {
        Self::state_dir().join("tably.log")
    }
}
