//! Configuration module for the sku-feeder server.
//!
//! Supports command-line arguments, environment variables and a TOML
//! configuration file. CLI arguments take precedence over environment
//! variables, which take precedence over config file values.

use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::time::Instant;

/// Deadline used when the configured time budget does not fit in an `Instant`
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// Command-line arguments for the ingest server
#[derive(Parser, Debug)]
#[command(name = "sku-feeder")]
#[command(author = "sku-feeder authors")]
#[command(version = "0.1.0")]
#[command(about = "A one-line-per-connection SKU ingest server", long_about = None)]
pub struct CliArgs {
    /// Path to TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Address to bind to (e.g., 127.0.0.1:4000)
    #[arg(short = 'l', long, env = "SOCKET_ADDR")]
    pub listen: Option<String>,

    /// Maximum number of connections handled concurrently (<= 0 accepts nothing)
    #[arg(short = 'n', long, env = "MAX_CONCURRENT_CONNECTIONS", allow_negative_numbers = true)]
    pub max_connections: Option<i64>,

    /// Time budget for the whole run in seconds
    #[arg(short = 't', long = "timeout", env = "TIMEOUT_IN_SECS")]
    pub timeout_secs: Option<u64>,

    /// File the final report line is appended to
    #[arg(short = 'r', long, env = "LOG_FILE_NAME")]
    pub report_file: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

/// TOML configuration file structure
#[derive(Debug, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub report: ReportConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server-related configuration
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// Address to bind to
    #[serde(default = "default_listen")]
    pub listen: String,
    /// Maximum number of concurrently handled connections
    #[serde(default = "default_max_connections")]
    pub max_connections: i64,
    /// Time budget for the whole run in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Pending-connection queue length handed to listen(2)
    #[serde(default = "default_backlog")]
    pub backlog: i32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            max_connections: default_max_connections(),
            timeout_secs: default_timeout_secs(),
            backlog: default_backlog(),
        }
    }
}

/// Report output configuration
#[derive(Debug, Deserialize)]
pub struct ReportConfig {
    /// File the summary line is appended to
    #[serde(default = "default_report_file")]
    pub file: PathBuf,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            file: default_report_file(),
        }
    }
}

/// Storage-related configuration
#[derive(Debug, Deserialize, Default)]
pub struct StorageConfig {
    /// Maximum number of stored SKUs (0 = unbounded)
    #[serde(default)]
    pub max_skus: usize,
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level
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

fn default_listen() -> String {
    "127.0.0.1:4000".to_string()
}

fn default_max_connections() -> i64 {
    5
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_backlog() -> i32 {
    1024
}

fn default_report_file() -> PathBuf {
    PathBuf::from("server_report_file.txt")
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Final resolved configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub listen: String,
    pub max_connections: usize,
    pub timeout: Duration,
    pub backlog: i32,
    pub report_file: PathBuf,
    pub max_skus: usize,
    pub log_level: String,
}

impl Config {
    /// Load configuration from CLI args, environment and optional TOML file.
    pub fn load() -> Result<Self, ConfigError> {
        let cli = CliArgs::parse();

        let toml_config = if let Some(ref config_path) = cli.config {
            let contents = std::fs::read_to_string(config_path)
                .map_err(|e| ConfigError::FileRead(config_path.clone(), e))?;
            toml::from_str(&contents)
                .map_err(|e| ConfigError::TomlParse(config_path.clone(), e))?
        } else {
            TomlConfig::default()
        };

        Ok(Self::merge(cli, toml_config))
    }

    /// Merge CLI args with TOML config (CLI takes precedence)
    fn merge(cli: CliArgs, toml_config: TomlConfig) -> Self {
        let max_connections = cli
            .max_connections
            .unwrap_or(toml_config.server.max_connections);

        Config {
            listen: cli.listen.unwrap_or(toml_config.server.listen),
            max_connections: normalize_max_connections(max_connections),
            timeout: Duration::from_secs(
                cli.timeout_secs.unwrap_or(toml_config.server.timeout_secs),
            ),
            backlog: toml_config.server.backlog,
            report_file: cli.report_file.unwrap_or(toml_config.report.file),
            max_skus: toml_config.storage.max_skus,
            log_level: if cli.log_level != "info" {
                cli.log_level
            } else {
                toml_config.logging.level
            },
        }
    }

    /// Absolute end of a run started at `start`.
    pub fn deadline(&self, start: Instant) -> Instant {
        start
            .checked_add(self.timeout)
            .unwrap_or_else(|| start + FAR_FUTURE)
    }
}

/// Negative ceilings are legal input and mean "accept nothing"; the
/// upper end is bounded by what a semaphore can hold.
fn normalize_max_connections(value: i64) -> usize {
    usize::try_from(value)
        .unwrap_or(0)
        .min(Semaphore::MAX_PERMITS)
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{}': {1}", .0.display())]
    FileRead(PathBuf, #[source] std::io::Error),
    #[error("Failed to parse config file '{}': {1}", .0.display())]
    TomlParse(PathBuf, #[source] toml::de::Error),
}
