/*!
 * Configuration types for the order client
 */

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{OrderClientError, Result};
use crate::timestamp::TimestampPolicy;

/// Bounds for establishing the connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of dial attempts
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Per-attempt dial timeout, also the delay between attempts
    #[serde(default = "default_retry_interval_ms")]
    pub retry_interval_ms: u64,

    /// Budget for the whole connect operation
    #[serde(default = "default_total_timeout_ms")]
    pub total_timeout_ms: u64,
}

fn default_max_retries() -> u32 {
    5
}

fn default_retry_interval_ms() -> u64 {
    2_000
}

fn default_total_timeout_ms() -> u64 {
    15_000
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            retry_interval_ms: default_retry_interval_ms(),
            total_timeout_ms: default_total_timeout_ms(),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, retry_interval: Duration, total_timeout: Duration) -> Self {
        Self {
            max_retries,
            retry_interval_ms: retry_interval.as_millis() as u64,
            total_timeout_ms: total_timeout.as_millis() as u64,
        }
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }

    pub fn total_timeout(&self) -> Duration {
        Duration::from_millis(self.total_timeout_ms)
    }
}

/// Log verbosity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Convert to tracing::Level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

/// Everything needed to build an `OrderClient`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Order service address, `host:port` or a full URI
    pub address: String,

    /// What to do with creation times that fail to decode
    #[serde(default)]
    pub timestamps: TimestampPolicy,

    /// Default per-call deadline, applied when the caller sets none
    #[serde(default)]
    pub request_timeout_ms: Option<u64>,

    #[serde(default)]
    pub log_level: LogLevel,

    /// Write JSON logs here instead of stdout
    #[serde(default)]
    pub log_file: Option<PathBuf>,

    #[serde(default)]
    pub retry: RetryPolicy,
}

impl ClientConfig {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            timestamps: TimestampPolicy::default(),
            request_timeout_ms: None,
            log_level: LogLevel::default(),
            log_file: None,
            retry: RetryPolicy::default(),
        }
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| OrderClientError::Config(format!("Failed to read {}: {}", path.display(), e)))?;
        toml::from_str(&contents)
            .map_err(|e| OrderClientError::Config(format!("Failed to parse {}: {}", path.display(), e)))
    }

    /// Save configuration to a TOML file
    pub fn to_file(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| OrderClientError::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)
            .map_err(|e| OrderClientError::Config(format!("Failed to write {}: {}", path.display(), e)))
    }
}
