//! # Configuration Management
//!
//! Centralized configuration for the reactor.
//!
//! This module provides structured configuration for the worker pool, socket
//! tuning applied at registration time, scratch buffer sizing and logging.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()`
//! - Direct instantiation with defaults
//! - Environment-specific overrides via `from_env()`
//!
//! ## Sizing Considerations
//! - `read_buffer_size` bounds a single non-blocking read
//! - `max_packet_size` bounds both the declared frame length and the inflated
//!   payload, so a peer cannot make a worker buffer more than that per frame

use crate::error::{ReactorError, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Duration;
use tracing::Level;

/// Default socket send/receive buffer size and single-read chunk (bytes)
pub const SOCKET_BUFFER_SIZE: usize = 262_143;

/// Max allowed frame body and inflated payload size (3-byte VarInt maximum)
pub const MAX_PACKET_SIZE: usize = 2_097_151;

/// Whether Nagle's algorithm is disabled on accepted sockets by default
pub const NO_DELAY: bool = true;

/// Default number of readiness events fetched per poll
pub const EVENTS_CAPACITY: usize = 1024;

/// Default number of reads per connection per dispatch cycle
pub const READ_BUDGET: usize = 16;

/// Main configuration structure that contains all configurable settings
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct ReactorConfig {
    /// Worker pool configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Socket tuning applied to every registered connection
    #[serde(default)]
    pub socket: SocketConfig,

    /// Scratch buffer sizing
    #[serde(default)]
    pub buffers: BufferConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ReactorConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)
            .map_err(|e| ReactorError::ConfigError(format!("Failed to open config file: {e}")))?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| ReactorError::ConfigError(format!("Failed to read config file: {e}")))?;

        Self::from_toml(&contents)
    }

    /// Load configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| ReactorError::ConfigError(format!("Failed to parse TOML: {e}")))
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Some(val) = env_parse::<usize>("FRAME_REACTOR_WORKER_COUNT")? {
            config.server.worker_count = val;
        }

        if let Some(val) = env_parse::<usize>("FRAME_REACTOR_READ_BUDGET")? {
            config.server.read_budget = val;
        }

        if let Some(val) = env_parse::<usize>("FRAME_REACTOR_SOCKET_BUFFER_SIZE")? {
            config.socket.send_buffer_size = val;
            config.socket.recv_buffer_size = val;
        }

        if let Some(val) = env_parse::<bool>("FRAME_REACTOR_NO_DELAY")? {
            config.socket.no_delay = val;
        }

        if let Some(val) = env_parse::<usize>("FRAME_REACTOR_READ_BUFFER_SIZE")? {
            config.buffers.read_buffer_size = val;
        }

        if let Some(val) = env_parse::<usize>("FRAME_REACTOR_MAX_PACKET_SIZE")? {
            config.buffers.max_packet_size = val;
        }

        Ok(config)
    }

    /// Apply overrides to the default configuration
    pub fn default_with_overrides<F>(mutator: F) -> Self
    where
        F: FnOnce(&mut Self),
    {
        let mut config = Self::default();
        mutator(&mut config);
        config
    }

    /// Generate example configuration file content
    pub fn example_config() -> String {
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|_| String::from("# Failed to generate example config"))
    }

    /// Save configuration to a file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ReactorError::ConfigError(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, content)
            .map_err(|e| ReactorError::ConfigError(format!("Failed to write config file: {e}")))?;

        Ok(())
    }

    /// Validate the configuration for common issues and misconfigurations
    ///
    /// Returns a list of validation errors. Empty list means configuration is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        errors.extend(self.server.validate());
        errors.extend(self.socket.validate());
        errors.extend(self.buffers.validate());
        errors.extend(self.logging.validate());
        errors
    }

    /// Validate and return Result - convenience method
    pub fn validate_strict(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ReactorError::ConfigError(format!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Result<Option<T>> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ReactorError::ConfigError(format!("Invalid value for {key}: '{raw}'"))),
        Err(_) => Ok(None),
    }
}

fn default_worker_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Worker pool configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Number of reactor threads, each with its own multiplexer
    pub worker_count: usize,

    /// Maximum readiness events returned by a single poll
    pub events_capacity: usize,

    /// Upper bound on a single poll; `None` blocks until readiness or wakeup
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "option_duration_serde"
    )]
    pub poll_timeout: Option<Duration>,

    /// Reads performed for one connection before the worker moves on to the
    /// next ready connection; the rest is picked up in the following cycle
    pub read_budget: usize,

    /// First delay applied after a failed dispatch cycle
    #[serde(with = "duration_serde")]
    pub backoff_initial: Duration,

    /// Cap for the doubling delay between consecutive failed cycles
    #[serde(with = "duration_serde")]
    pub backoff_max: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            worker_count: default_worker_count(),
            events_capacity: EVENTS_CAPACITY,
            poll_timeout: None,
            read_budget: READ_BUDGET,
            backoff_initial: Duration::from_millis(1),
            backoff_max: Duration::from_millis(100),
        }
    }
}

impl ServerConfig {
    /// Validate server configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.worker_count == 0 {
            errors.push("Worker count must be greater than 0".to_string());
        } else if self.worker_count > 1024 {
            errors.push(format!(
                "Worker count too large: {} (maximum: 1024)",
                self.worker_count
            ));
        }

        if self.events_capacity == 0 {
            errors.push("Events capacity must be greater than 0".to_string());
        }

        if self.read_budget == 0 {
            errors.push("Read budget must be greater than 0".to_string());
        }

        if let Some(timeout) = self.poll_timeout {
            if timeout.is_zero() {
                errors.push("Poll timeout cannot be zero (busy loop)".to_string());
            }
        }

        if self.backoff_initial > self.backoff_max {
            errors.push("Backoff initial delay cannot exceed backoff max delay".to_string());
        }

        if self.backoff_max.as_secs() > 60 {
            errors.push("Backoff max delay too long (maximum: 60s)".to_string());
        }

        errors
    }
}

/// Socket tuning applied at registration time
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SocketConfig {
    /// SO_SNDBUF size in bytes
    pub send_buffer_size: usize,

    /// SO_RCVBUF size in bytes
    pub recv_buffer_size: usize,

    /// TCP_NODELAY flag
    pub no_delay: bool,
}

impl Default for SocketConfig {
    fn default() -> Self {
        Self {
            send_buffer_size: SOCKET_BUFFER_SIZE,
            recv_buffer_size: SOCKET_BUFFER_SIZE,
            no_delay: NO_DELAY,
        }
    }
}

impl SocketConfig {
    /// Validate socket configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.send_buffer_size == 0 {
            errors.push("Send buffer size must be greater than 0".to_string());
        }

        if self.recv_buffer_size == 0 {
            errors.push("Receive buffer size must be greater than 0".to_string());
        }

        errors
    }
}

/// Scratch buffer sizing
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BufferConfig {
    /// Maximum bytes pulled from a socket by one read
    pub read_buffer_size: usize,

    /// Maximum frame body and inflated payload size
    pub max_packet_size: usize,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            read_buffer_size: SOCKET_BUFFER_SIZE,
            max_packet_size: MAX_PACKET_SIZE,
        }
    }
}

impl BufferConfig {
    /// Validate buffer configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.read_buffer_size == 0 {
            errors.push("Read buffer size must be greater than 0".to_string());
        } else if self.read_buffer_size > 64 * 1024 * 1024 {
            errors.push(format!(
                "Read buffer size too large: {} bytes (maximum: 64 MB)",
                self.read_buffer_size
            ));
        }

        if self.max_packet_size == 0 {
            errors.push("Max packet size cannot be 0".to_string());
        } else if self.max_packet_size > i32::MAX as usize {
            errors.push(format!(
                "Max packet size too large: {} bytes (must fit a VarInt)",
                self.max_packet_size
            ));
        }

        errors
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Application name for logs
    pub app_name: String,

    /// Log level
    #[serde(with = "log_level_serde")]
    pub log_level: Level,

    /// Whether to log to console
    pub log_to_console: bool,

    /// Whether to log to file
    pub log_to_file: bool,

    /// Path to log file (if log_to_file is true)
    pub log_file_path: Option<String>,

    /// Whether to use JSON formatting for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            app_name: String::from("frame-reactor"),
            log_level: Level::INFO,
            log_to_console: true,
            log_to_file: false,
            log_file_path: None,
            json_format: false,
        }
    }
}

impl LoggingConfig {
    /// Validate logging configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.app_name.is_empty() {
            errors.push("Application name cannot be empty".to_string());
        } else if self.app_name.len() > 64 {
            errors.push(format!(
                "Application name too long: {} characters (maximum: 64)",
                self.app_name.len()
            ));
        }

        if self.log_to_file {
            if let Some(ref path) = self.log_file_path {
                if let Some(parent) = Path::new(path).parent() {
                    if !parent.as_os_str().is_empty() && !parent.exists() {
                        errors.push(format!(
                            "Log file directory does not exist: {}",
                            parent.display()
                        ));
                    }
                }
            } else {
                errors.push("log_file_path must be specified when log_to_file is true".to_string());
            }
        }

        if !self.log_to_console && !self.log_to_file {
            errors
                .push("At least one logging output (console or file) must be enabled".to_string());
        }

        errors
    }
}

/// Helper module for Duration serialization/deserialization
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis = duration.as_millis() as u64;
        millis.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

/// Same as `duration_serde` for optional values
mod option_duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration
            .map(|d| d.as_millis() as u64)
            .serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = Option::<u64>::deserialize(deserializer)?;
        Ok(millis.map(Duration::from_millis))
    }
}

/// Helper module for tracing::Level serialization/deserialization
mod log_level_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::str::FromStr;
    use tracing::Level;

    pub fn serialize<S>(level: &Level, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let level_str = match *level {
            Level::TRACE => "trace",
            Level::DEBUG => "debug",
            Level::INFO => "info",
            Level::WARN => "warn",
            Level::ERROR => "error",
        };
        level_str.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Level, D::Error>
    where
        D: Deserializer<'de>,
    {
        let level_str = String::deserialize(deserializer)?;
        Level::from_str(&level_str)
            .map_err(|_| serde::de::Error::custom(format!("Invalid log level: {level_str}")))
    }
}
