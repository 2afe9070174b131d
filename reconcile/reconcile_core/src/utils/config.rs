//! Controller configuration.
//!
//! The configuration is built once at startup, validated, and then shared by
//! reference with every component of the controller. It can be loaded from a
//! JSON or TOML file; any field left out takes its default.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{info, warn};

use crate::error::ConfigError;
use crate::utils::logging::LoggingConfig;

/// Per-key retry backoff applied by the work queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackoffConfig {
    /// Delay before the first retry, in milliseconds. Doubles per failure.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Upper bound on the retry delay, in milliseconds.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_base_delay_ms() -> u64 {
    5
}

fn default_max_delay_ms() -> u64 {
    1_000_000
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl BackoffConfig {
    /// Delay before the first retry.
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    /// Upper bound on the retry delay.
    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

/// Controller configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Name used in logs.
    #[serde(default = "default_name")]
    pub name: String,

    /// Guard token this controller places on the records it manages.
    #[serde(default = "default_guard_token")]
    pub guard_token: String,

    /// Maximum number of records reconciled at the same time.
    #[serde(default = "default_max_concurrent_reconciles")]
    pub max_concurrent_reconciles: usize,

    /// Deadline for each store or convergence engine call, in milliseconds.
    #[serde(default = "default_call_timeout_ms")]
    pub call_timeout_ms: u64,

    /// Retry backoff.
    #[serde(default)]
    pub backoff: BackoffConfig,

    /// Interval between full resyncs of every record, in seconds.
    #[serde(default)]
    pub resync_interval_secs: Option<u64>,

    /// How long shutdown waits for in-flight reconciles, in seconds.
    #[serde(default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_name() -> String {
    "managed-record".to_string()
}

fn default_guard_token() -> String {
    "reconcile.io/resources".to_string()
}

fn default_max_concurrent_reconciles() -> usize {
    3
}

fn default_call_timeout_ms() -> u64 {
    30_000
}

fn default_shutdown_timeout_secs() -> u64 {
    30
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            guard_token: default_guard_token(),
            max_concurrent_reconciles: default_max_concurrent_reconciles(),
            call_timeout_ms: default_call_timeout_ms(),
            backoff: BackoffConfig::default(),
            resync_interval_secs: None,
            shutdown_timeout_secs: default_shutdown_timeout_secs(),
            logging: LoggingConfig::default(),
        }
    }
}

impl ControllerConfig {
    /// Load configuration from a file, falling back to defaults.
    ///
    /// Files ending in `.toml` are parsed as TOML, anything else as JSON.
    /// A missing file is not an error.
    pub async fn load(path: Option<&str>) -> Result<Self> {
        let mut config = ControllerConfig::default();

        if let Some(path) = path {
            info!("Loading configuration from {}", path);

            if !Path::new(path).exists() {
                warn!("Configuration file not found: {}", path);
                return Ok(config);
            }

            let content = fs::read_to_string(path)
                .await
                .context(format!("Failed to read configuration file: {}", path))?;

            config = Self::parse(path, &content)
                .context(format!("Failed to parse configuration file: {}", path))?;
        } else {
            info!("No configuration file specified, using defaults");
        }

        config.validate()?;

        Ok(config)
    }

    /// Parse configuration text, choosing the format from the file name.
    pub fn parse(path: &str, content: &str) -> std::result::Result<Self, ConfigError> {
        if path.ends_with(".toml") {
            toml::from_str(content).map_err(|e| ConfigError::ParseFailed(e.to_string()))
        } else {
            serde_json::from_str(content).map_err(|e| ConfigError::ParseFailed(e.to_string()))
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.guard_token.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "Guard token cannot be empty".to_string(),
            ));
        }

        if self.max_concurrent_reconciles == 0 {
            return Err(ConfigError::Invalid(
                "Max concurrent reconciles cannot be zero".to_string(),
            ));
        }

        if self.call_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "Call timeout cannot be zero".to_string(),
            ));
        }

        if self.backoff.base_delay_ms == 0 {
            return Err(ConfigError::Invalid(
                "Backoff base delay cannot be zero".to_string(),
            ));
        }

        if self.backoff.max_delay_ms < self.backoff.base_delay_ms {
            return Err(ConfigError::Invalid(format!(
                "Backoff max delay ({}ms) is below the base delay ({}ms)",
                self.backoff.max_delay_ms, self.backoff.base_delay_ms
            )));
        }

        if self.resync_interval_secs == Some(0) {
            return Err(ConfigError::Invalid(
                "Resync interval cannot be zero".to_string(),
            ));
        }

        if self.shutdown_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "Shutdown timeout cannot be zero".to_string(),
            ));
        }

        Ok(())
    }

    /// Deadline for each external call.
    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    /// Interval between full resyncs, if enabled.
    pub fn resync_interval(&self) -> Option<Duration> {
        self.resync_interval_secs.map(Duration::from_secs)
    }

    /// How long shutdown waits for in-flight work.
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}
