//! Configuration management for the inspector.
//!
//! This module handles loading, validation, and conversion of the inspector
//! configuration from TOML files and command-line arguments.

use crate::cli::CliArgs;
use relay_server::config::{DEFAULT_OUTBOUND_QUEUE, DEFAULT_PORT};
use relay_server::ServerOptions;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Log levels accepted by `logging.level` and `--log-level`.
pub const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Application configuration loaded from TOML file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Relay listener settings
    #[serde(default)]
    pub server: ServerSettings,
    /// Command read-out settings
    #[serde(default)]
    pub history: HistorySettings,
    /// Logging configuration settings
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Relay listener settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerSettings {
    /// IP address to listen on
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
    /// Frames buffered per client before broadcasts to it are dropped
    #[serde(default = "default_outbound_queue")]
    pub outbound_queue: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_outbound_queue() -> usize {
    DEFAULT_OUTBOUND_QUEUE
}

/// Command read-out settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistorySettings {
    /// Log every received command at info level
    #[serde(default = "default_echo_commands")]
    pub echo_commands: bool,
}

fn default_echo_commands() -> bool {
    true
}

/// Logging system configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level filter (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Whether to output logs in JSON format
    #[serde(default)]
    pub json_format: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            outbound_queue: default_outbound_queue(),
        }
    }
}

impl Default for HistorySettings {
    fn default() -> Self {
        Self {
            echo_commands: default_echo_commands(),
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json_format: false,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerSettings::default(),
            history: HistorySettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from a TOML file.
    ///
    /// If the file doesn't exist, creates a default configuration file at the
    /// specified path and returns the default configuration.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// The loaded or default configuration, or an error if loading/creation failed.
    pub async fn load_from_file(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        if path.exists() {
            let content = tokio::fs::read_to_string(path).await?;
            let config: AppConfig = toml::from_str(&content)?;
            Ok(config)
        } else {
            let default_config = AppConfig::default();
            let toml_content = toml::to_string_pretty(&default_config)?;
            tokio::fs::write(path, toml_content).await?;
            info!("📝 Created default configuration file: {}", path.display());
            Ok(default_config)
        }
    }

    /// Applies command-line overrides on top of the file settings.
    pub fn apply_cli(&mut self, args: &CliArgs) {
        if let Some(host) = &args.host {
            self.server.host = host.clone();
        }
        if let Some(port) = args.port {
            self.server.port = port;
        }
        if let Some(level) = &args.log_level {
            self.logging.level = level.clone();
        }
        if args.json_logs {
            self.logging.json_format = true;
        }
    }

    /// Validates the configuration for consistency and correctness.
    ///
    /// # Returns
    ///
    /// `Ok(())` if the configuration is valid, or an error string describing the issue.
    pub fn validate(&self) -> Result<(), String> {
        if self.server.host.parse::<std::net::IpAddr>().is_err() {
            return Err(format!("Invalid listen host: {}", &self.server.host));
        }

        if self.server.outbound_queue == 0 {
            return Err("server.outbound_queue must be greater than 0".to_string());
        }

        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            return Err(format!(
                "Invalid log level: {}. Must be one of: {VALID_LOG_LEVELS:?}",
                &self.logging.level
            ));
        }

        Ok(())
    }

    /// Converts the listener settings into relay options.
    ///
    /// Callbacks are attached separately by the application.
    pub fn to_server_options(&self) -> ServerOptions {
        ServerOptions::new()
            .host(self.server.host.clone())
            .port(self.server.port)
            .outbound_queue(self.server.outbound_queue)
    }
}
