//! Configuration module for the telly client.
//!
//! Supports both command-line arguments and TOML configuration file.
//! CLI arguments take precedence over config file values.

use crate::client::{ConnectOptions, DEFAULT_MAX_FRAME_SIZE, DEFAULT_READ_SIZE};
use crate::resp::ProtocolVersion;
use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Command-line arguments for the client
#[derive(Parser, Debug)]
#[command(name = "telly")]
#[command(version)]
#[command(about = "A minimal RESP2/RESP3 command-line client", long_about = None)]
pub struct CliArgs {
    /// Path to TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Server host name or address
    #[arg(short = 'H', long)]
    pub host: Option<String>,

    /// Server port
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Protocol version to negotiate with HELLO (2 or 3)
    #[arg(short, long, value_parser = clap::value_parser!(u8).range(2..=3))]
    pub resp: Option<u8>,

    /// Do not announce the library name and version with CLIENT SETINFO
    #[arg(long)]
    pub no_setinfo: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Command to run once; reads commands from stdin when omitted
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,
}

/// TOML configuration file structure
#[derive(Debug, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server address configuration
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Connection and handshake configuration
#[derive(Debug, Deserialize)]
pub struct ClientConfig {
    /// RESP version requested with HELLO
    #[serde(default)]
    pub protocol: ProtocolVersion,
    /// Issue CLIENT SETINFO during the handshake
    #[serde(default = "default_set_info")]
    pub set_info: bool,
    pub lib_name: Option<String>,
    pub lib_version: Option<String>,
    /// Bytes requested from the socket per read
    #[serde(default = "default_read_buffer_size")]
    pub read_buffer_size: usize,
    /// Largest reply accepted, in bytes
    #[serde(default = "default_max_frame_size")]
    pub max_frame_size: usize,
    /// Connect timeout in milliseconds (0 = none)
    #[serde(default)]
    pub connect_timeout_ms: u64,
    /// Read/write timeout in milliseconds (0 = none)
    #[serde(default)]
    pub io_timeout_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            protocol: ProtocolVersion::default(),
            set_info: default_set_info(),
            lib_name: None,
            lib_version: None,
            read_buffer_size: default_read_buffer_size(),
            max_frame_size: default_max_frame_size(),
            connect_timeout_ms: 0,
            io_timeout_ms: 0,
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

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    6379
}

fn default_set_info() -> bool {
    true
}

fn default_read_buffer_size() -> usize {
    DEFAULT_READ_SIZE
}

fn default_max_frame_size() -> usize {
    DEFAULT_MAX_FRAME_SIZE
}

// Replies go to stdout; keep the log quiet unless asked.
fn default_log_level() -> String {
    "warn".to_string()
}

/// Final resolved configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub protocol: ProtocolVersion,
    pub set_info: bool,
    pub lib_name: String,
    pub lib_version: String,
    pub read_buffer_size: usize,
    pub max_frame_size: usize,
    pub connect_timeout: Option<Duration>,
    pub io_timeout: Option<Duration>,
    pub log_level: String,
    pub command: Vec<String>,
}

impl Config {
    /// Load configuration from CLI args and optional TOML file.
    /// CLI arguments take precedence over TOML file values.
    pub fn load() -> Result<Self, ConfigError> {
        let cli = CliArgs::parse();

        // Load TOML config if specified
        let toml_config = if let Some(ref config_path) = cli.config {
            let contents = std::fs::read_to_string(config_path)
                .map_err(|e| ConfigError::FileRead(config_path.clone(), e))?;
            toml::from_str(&contents)
                .map_err(|e| ConfigError::TomlParse(config_path.clone(), e))?
        } else {
            TomlConfig::default()
        };

        Self::merge(cli, toml_config)
    }

    /// Merge CLI args over TOML values.
    pub fn merge(cli: CliArgs, toml_config: TomlConfig) -> Result<Self, ConfigError> {
        let protocol = match cli.resp {
            Some(version) => {
                ProtocolVersion::try_from(version).map_err(ConfigError::InvalidProtocol)?
            }
            None => toml_config.client.protocol,
        };

        Ok(Config {
            host: cli.host.unwrap_or(toml_config.server.host),
            port: cli.port.unwrap_or(toml_config.server.port),
            protocol,
            set_info: !cli.no_setinfo && toml_config.client.set_info,
            lib_name: toml_config
                .client
                .lib_name
                .unwrap_or_else(|| env!("CARGO_PKG_NAME").to_string()),
            lib_version: toml_config
                .client
                .lib_version
                .unwrap_or_else(|| env!("CARGO_PKG_VERSION").to_string()),
            read_buffer_size: toml_config.client.read_buffer_size,
            max_frame_size: toml_config.client.max_frame_size,
            connect_timeout: millis(toml_config.client.connect_timeout_ms),
            io_timeout: millis(toml_config.client.io_timeout_ms),
            log_level: cli.log_level.unwrap_or(toml_config.logging.level),
            command: cli.command,
        })
    }

    pub fn connect_options(&self) -> ConnectOptions {
        ConnectOptions {
            host: self.host.clone(),
            port: self.port,
            protocol: self.protocol,
            set_info: self.set_info,
            lib_name: Some(self.lib_name.clone()),
            lib_version: Some(self.lib_version.clone()),
            read_size: self.read_buffer_size,
            max_frame_size: self.max_frame_size,
            connect_timeout: self.connect_timeout,
            io_timeout: self.io_timeout,
        }
    }
}

fn millis(ms: u64) -> Option<Duration> {
    (ms > 0).then(|| Duration::from_millis(ms))
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {1}", path = .0.display())]
    FileRead(PathBuf, #[source] std::io::Error),
    #[error("Failed to parse config file '{path}': {1}", path = .0.display())]
    TomlParse(PathBuf, #[source] toml::de::Error),
    #[error("Invalid protocol: {0}")]
    InvalidProtocol(String),
}
