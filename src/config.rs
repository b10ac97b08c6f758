//! Configuration module for the updown-echo server.
//!
//! Supports command-line arguments, the `DIRECTION` / `PADDING` environment
//! variables and an optional TOML configuration file.
//! CLI arguments (and their environment fallbacks) take precedence over
//! config file values.

use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Command-line arguments for the server
#[derive(Parser, Debug)]
#[command(name = "updown-echo")]
#[command(author = "updown-echo authors")]
#[command(version = "0.1.0")]
#[command(about = "A TCP echo/checksum server for network path testing", long_about = None)]
pub struct CliArgs {
    /// Path to TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Address to bind to (e.g., 0.0.0.0:8888)
    #[arg(short = 'l', long)]
    pub listen: Option<String>,

    /// Default direction; "UP" marks the server as upstream
    #[arg(short = 'd', long, env = "DIRECTION")]
    pub direction: Option<String>,

    /// Memory padding to allocate at startup, in MiB
    #[arg(short = 'p', long, env = "PADDING")]
    pub padding: Option<String>,

    /// Number of worker threads (defaults to number of CPU cores)
    #[arg(short = 'w', long)]
    pub workers: Option<usize>,

    /// Per-connection idle timeout in seconds
    #[arg(short = 't', long)]
    pub timeout: Option<u64>,

    /// Close connections that stay idle longer than the timeout
    #[arg(long)]
    pub enforce_timeout: bool,

    /// Log level (trace, debug, info, warn, error) [default: info]
    #[arg(long)]
    pub log_level: Option<String>,
}

/// TOML configuration file structure
#[derive(Debug, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub mode: ModeConfig,
    #[serde(default)]
    pub connection: ConnectionConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server-related configuration
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// Address to bind to
    #[serde(default = "default_listen")]
    pub listen: String,
    /// Number of worker threads
    pub workers: Option<usize>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            workers: None,
        }
    }
}

/// Response mode and footprint settings
#[derive(Debug, Deserialize, Default)]
pub struct ModeConfig {
    /// Direction selector, "UP" for upstream
    pub direction: Option<String>,
    /// Padding allocation in MiB
    #[serde(default)]
    pub padding_mb: i64,
}

/// Per-connection settings
#[derive(Debug, Deserialize)]
pub struct ConnectionConfig {
    /// Idle timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// Whether the idle timeout is applied to reads
    #[serde(default)]
    pub enforce_timeout: bool,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout(),
            enforce_timeout: false,
        }
    }
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
    "0.0.0.0:8888".to_string()
}

fn default_timeout() -> u64 {
    15
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Default traffic direction reported at startup.
///
/// Informational only: per-chunk routing is decided by the first byte of
/// each chunk, never by this flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Echo,
    Upstream,
}

impl Direction {
    /// Only the exact selector `UP` selects upstream.
    pub fn from_selector(selector: Option<&str>) -> Self {
        match selector {
            Some("UP") => Direction::Upstream,
            _ => Direction::Echo,
        }
    }

    /// Flag value printed in the startup banner.
    pub fn flag(self) -> u8 {
        match self {
            Direction::Echo => 0,
            Direction::Upstream => 1,
        }
    }
}

/// Parse a padding size the way C's `atoi` would, clamping negatives to 0.
///
/// Leading whitespace and an optional sign are accepted, parsing stops at the
/// first non-digit, and anything without leading digits is 0.
pub fn parse_padding(value: &str) -> usize {
    let value = value.trim_start();
    let (negative, digits) = match value.as_bytes().first() {
        Some(b'-') => (true, &value[1..]),
        Some(b'+') => (false, &value[1..]),
        _ => (false, value),
    };

    let mut mb: usize = 0;
    for b in digits.bytes().take_while(u8::is_ascii_digit) {
        mb = mb.saturating_mul(10).saturating_add(usize::from(b - b'0'));
    }

    if negative {
        0
    } else {
        mb
    }
}

/// Final resolved configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub listen: String,
    pub direction: Direction,
    pub padding_mb: usize,
    pub workers: Option<usize>,
    pub timeout: Duration,
    pub enforce_timeout: bool,
    pub log_level: String,
}

impl Config {
    /// Load configuration from CLI args, environment and optional TOML file.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_args(CliArgs::parse())
    }

    /// Merge parsed CLI args with the TOML file they point to, if any.
    /// CLI arguments take precedence over TOML file values.
    pub fn from_args(cli: CliArgs) -> Result<Self, ConfigError> {
        let toml_config = if let Some(ref config_path) = cli.config {
            let contents = std::fs::read_to_string(config_path)
                .map_err(|e| ConfigError::FileRead(config_path.clone(), e))?;
            toml::from_str(&contents)
                .map_err(|e| ConfigError::TomlParse(config_path.clone(), e))?
        } else {
            TomlConfig::default()
        };

        let padding_mb = match cli.padding {
            Some(ref padding) => parse_padding(padding),
            None => usize::try_from(toml_config.mode.padding_mb).unwrap_or(0),
        };

        Ok(Config {
            listen: cli.listen.unwrap_or(toml_config.server.listen),
            direction: Direction::from_selector(
                cli.direction
                    .as_deref()
                    .or(toml_config.mode.direction.as_deref()),
            ),
            padding_mb,
            workers: cli.workers.or(toml_config.server.workers),
            timeout: Duration::from_secs(
                cli.timeout.unwrap_or(toml_config.connection.timeout_secs),
            ),
            enforce_timeout: cli.enforce_timeout || toml_config.connection.enforce_timeout,
            log_level: cli.log_level.unwrap_or(toml_config.logging.level),
        })
    }

    /// Idle deadline applied to each read, if enforcement is on.
    pub fn read_deadline(&self) -> Option<Duration> {
        self.enforce_timeout.then_some(self.timeout)
    }
}

/// Configuration loading errors
#[derive(Debug)]
pub enum ConfigError {
    FileRead(PathBuf, std::io::Error),
    TomlParse(PathBuf, toml::de::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::FileRead(path, e) => {
                write!(f, "Failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::TomlParse(path, e) => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), e)
            }
        }
    }
}

impl std::error::Error for ConfigError {}
