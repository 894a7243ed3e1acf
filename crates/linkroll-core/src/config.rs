//! Application configuration
//!
//! Configuration is loaded from:
//! 1. Default values
//! 2. Config file (~/.config/linkroll/config.toml)
//! 3. Environment variables (LINKROLL_* prefix)
//!
//! Environment variables take precedence over config file values.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::events::RetryPolicy;

/// Environment variable prefix
const ENV_PREFIX: &str = "LINKROLL";

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory for data storage (SQLite database)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Broker URL for the event publisher
    #[serde(default = "default_amqp_url")]
    pub amqp_url: String,

    /// Reconnect attempts before the publisher fails permanently
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base delay, in milliseconds, of the quadratic backoff schedule
    #[serde(default = "default_retry_base_ms")]
    pub retry_base_ms: u64,

    /// Whether read operations publish viewed:* log events
    #[serde(default = "default_publish_reads")]
    pub publish_reads: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            amqp_url: default_amqp_url(),
            max_retries: default_max_retries(),
            retry_base_ms: default_retry_base_ms(),
            publish_reads: default_publish_reads(),
        }
    }
}

impl Config {
    /// Load configuration from default location and environment
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::config_file_path())
    }

    /// Load configuration from a specific path
    ///
    /// Environment variables are still applied as overrides.
    /// If the file doesn't exist, defaults are used.
    pub fn load_from_path(path: &PathBuf) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        config.ensure_data_dir()?;
        Ok(config)
    }

    /// Load configuration from a TOML string (useful for testing)
    pub fn load_from_str(toml_content: &str) -> Result<Self> {
        let mut config: Config =
            toml::from_str(toml_content).context("Failed to parse config TOML")?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var(format!("{}_DATA_DIR", ENV_PREFIX)) {
            self.data_dir = PathBuf::from(val);
        }

        if let Ok(val) = std::env::var(format!("{}_AMQP_URL", ENV_PREFIX)) {
            if !val.is_empty() {
                self.amqp_url = val;
            }
        }

        if let Ok(val) = std::env::var(format!("{}_MAX_RETRIES", ENV_PREFIX)) {
            if let Ok(parsed) = val.parse() {
                self.max_retries = parsed;
            }
        }

        if let Ok(val) = std::env::var(format!("{}_PUBLISH_READS", ENV_PREFIX)) {
            self.publish_reads = val.eq_ignore_ascii_case("true") || val == "1";
        }
    }

    /// Ensure data directory exists
    fn ensure_data_dir(&self) -> Result<()> {
        if !self.data_dir.exists() {
            std::fs::create_dir_all(&self.data_dir)
                .with_context(|| format!("Failed to create data directory: {:?}", self.data_dir))?;
        }
        Ok(())
    }

    /// Get the config file path
    ///
    /// Can be overridden with LINKROLL_CONFIG environment variable
    pub fn config_file_path() -> PathBuf {
        if let Ok(path) = std::env::var(format!("{}_CONFIG", ENV_PREFIX)) {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("linkroll")
            .join("config.toml")
    }

    /// Path to the SQLite database
    pub fn sqlite_path(&self) -> PathBuf {
        self.data_dir.join("linkroll.db")
    }

    /// Backoff policy for the event publisher
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            base_delay: Duration::from_millis(self.retry_base_ms),
            max_retries: self.max_retries,
        }
    }
}

/// Get the default data directory
fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("linkroll")
}

fn default_amqp_url() -> String {
    "amqp://localhost:5672".to_string()
}

fn default_max_retries() -> u32 {
    10
}

fn default_retry_base_ms() -> u64 {
    100
}

fn default_publish_reads() -> bool {
    true
}
