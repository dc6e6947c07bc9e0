// src/config.rs

//! Manages server configuration: loading from TOML, defaults, and validation.

use crate::core::protocol::line_codec::DEFAULT_MAX_LINE_LENGTH;
use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::warn;

/// Configuration for the Prometheus metrics exporter.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct MetricsConfig {
    /// If true, an HTTP server will be started to expose Prometheus metrics.
    #[serde(default)]
    pub enabled: bool,
    /// The port for the Prometheus metrics server.
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: default_metrics_port(),
        }
    }
}

fn default_metrics_port() -> u16 {
    9998
}

/// The complete server configuration. Every field has a default, so an empty
/// file yields `Config::default()`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_host")]
    pub host: String,
    /// Port `0` asks the OS for an ephemeral port.
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Capacity of each connection's outgoing response queue. Lookup results
    /// that do not fit are shed.
    #[serde(default = "default_outgoing_queue_capacity")]
    pub outgoing_queue_capacity: usize,
    /// Capacity of the core serializer's request queue.
    #[serde(default = "default_request_queue_capacity")]
    pub request_queue_capacity: usize,
    /// Longest request line accepted before the connection is torn down.
    #[serde(default = "default_max_line_length")]
    pub max_line_length: usize,
    /// How long shutdown waits for connection tasks after signalling them.
    #[serde(default = "default_shutdown_grace_ms")]
    pub shutdown_grace_ms: u64,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    9999
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_outgoing_queue_capacity() -> usize {
    500
}
fn default_request_queue_capacity() -> usize {
    1
}
fn default_max_line_length() -> usize {
    DEFAULT_MAX_LINE_LENGTH
}
fn default_shutdown_grace_ms() -> u64 {
    5000
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
            outgoing_queue_capacity: default_outgoing_queue_capacity(),
            request_queue_capacity: default_request_queue_capacity(),
            max_line_length: default_max_line_length(),
            shutdown_grace_ms: default_shutdown_grace_ms(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl Config {
    /// Creates a new `Config` instance by reading and parsing a TOML file.
    pub fn from_file(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file at '{path}'"))?;
        let config = Self::from_toml_str(&contents)
            .with_context(|| format!("Invalid configuration in '{path}'"))?;
        Ok(config)
    }

    /// Loads `path` if it exists, otherwise falls back to the defaults.
    pub fn from_file_or_default(path: &str) -> Result<Self> {
        if Path::new(path).exists() {
            Self::from_file(path)
        } else {
            warn!("Config file '{}' not found, using defaults.", path);
            Ok(Self::default())
        }
    }

    /// Parses and validates configuration from TOML text.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents).context("Failed to parse TOML")?;
        config.validate()?;
        Ok(config)
    }

    /// A default configuration bound to `port` on all interfaces.
    pub fn with_port(port: u16) -> Self {
        Self {
            port,
            ..Self::default()
        }
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }

    /// Validates the configuration to ensure logical consistency.
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(anyhow!("host cannot be empty"));
        }
        if self.outgoing_queue_capacity == 0 {
            return Err(anyhow!("outgoing_queue_capacity cannot be 0"));
        }
        if self.request_queue_capacity == 0 {
            return Err(anyhow!("request_queue_capacity cannot be 0"));
        }
        if self.max_line_length == 0 {
            return Err(anyhow!("max_line_length cannot be 0"));
        }
        if self.request_queue_capacity > 1024 {
            warn!(
                "request_queue_capacity is {}. The core serializer still handles one request at a time; a deep queue only hides backpressure.",
                self.request_queue_capacity
            );
        }

        if self.metrics.enabled {
            if self.metrics.port == 0 {
                return Err(anyhow!("metrics.port cannot be 0"));
            }
            if self.metrics.port == self.port {
                return Err(anyhow!(
                    "metrics.port cannot be the same as the main server port"
                ));
            }
        }
        Ok(())
    }
}
