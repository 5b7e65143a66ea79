//! # Configuration Management
//!
//! Centralized configuration for servers, clients, and the wire format.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()`
//! - TOML strings via `from_toml()`
//! - Environment overrides via `from_env()`
//! - Direct instantiation with defaults
//!
//! Validation collects human-readable problems instead of failing on the
//! first one; `validate_strict()` turns a non-empty list into an error.

use crate::core::packet::MAX_PAYLOAD_SIZE;
use crate::error::{Result, WireError};
use crate::utils::timeout;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::Level;

/// Default chunk size for reflowed streams (64 KiB).
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct WireConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub client: ClientConfig,

    #[serde(default)]
    pub wire: FramingConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl WireConfig {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| WireError::ConfigError(format!("failed to read config file: {e}")))?;
        Self::from_toml(&contents)
    }

    /// Load configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| WireError::ConfigError(format!("failed to parse TOML: {e}")))
    }

    /// Defaults overridden by environment variables.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("CHUNKWIRE_SERVER_ADDRESS") {
            config.server.address = addr;
        }
        if let Ok(addr) = std::env::var("CHUNKWIRE_CLIENT_ADDRESS") {
            config.client.address = addr;
        }
        if let Ok(ms) = std::env::var("CHUNKWIRE_CALL_TIMEOUT_MS") {
            if let Ok(val) = ms.parse::<u64>() {
                config.client.call_timeout = Duration::from_millis(val);
            }
        }
        if let Ok(size) = std::env::var("CHUNKWIRE_MAX_PAYLOAD") {
            if let Ok(val) = size.parse::<usize>() {
                config.wire.max_payload_size = val;
            }
        }
        if let Ok(level) = std::env::var("CHUNKWIRE_COMPRESS_LEVEL") {
            if let Ok(val) = level.parse::<i32>() {
                config.wire.compress_level = val;
            }
        }

        Ok(config)
    }

    /// Save configuration to a TOML file.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| WireError::ConfigError(format!("failed to serialize config: {e}")))?;
        std::fs::write(path, content)
            .map_err(|e| WireError::ConfigError(format!("failed to write config file: {e}")))?;
        Ok(())
    }

    /// Collect validation problems. Empty means valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        errors.extend(self.server.validate());
        errors.extend(self.client.validate());
        errors.extend(self.wire.validate());
        errors.extend(self.logging.validate());
        errors
    }

    pub fn validate_strict(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(WireError::ConfigError(format!(
                "configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }
}

/// Server-side settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address, e.g. "127.0.0.1:9000".
    pub address: String,

    /// Grace period for draining connections on shutdown.
    #[serde(with = "duration_serde")]
    pub shutdown_timeout: Duration,

    /// Maximum concurrent connections.
    pub max_connections: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            address: String::from("127.0.0.1:9000"),
            shutdown_timeout: timeout::SHUTDOWN_TIMEOUT,
            max_connections: 1000,
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.address.is_empty() {
            errors.push("server address cannot be empty".to_string());
        } else if self.address.parse::<std::net::SocketAddr>().is_err() {
            errors.push(format!(
                "invalid server address: '{}' (expected host:port)",
                self.address
            ));
        }

        if self.shutdown_timeout.as_secs() < 1 {
            errors.push("shutdown timeout too short (minimum: 1s)".to_string());
        } else if self.shutdown_timeout.as_secs() > 60 {
            errors.push("shutdown timeout too long (maximum: 60s)".to_string());
        }

        if self.max_connections == 0 {
            errors.push("max connections must be greater than 0".to_string());
        }

        errors
    }
}

/// Client-side settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Target server address.
    pub address: String,

    /// Deadline for the initial TCP connect.
    #[serde(with = "duration_serde")]
    pub connect_timeout: Duration,

    /// Deadline for one correlated call.
    #[serde(with = "duration_serde")]
    pub call_timeout: Duration,

    /// Interval between keepalive pings. Zero disables keepalive.
    #[serde(with = "duration_serde")]
    pub heartbeat_interval: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            address: String::from("127.0.0.1:9000"),
            connect_timeout: timeout::DEFAULT_TIMEOUT,
            call_timeout: Duration::from_secs(30),
            heartbeat_interval: timeout::KEEPALIVE_INTERVAL,
        }
    }
}

impl ClientConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.address.is_empty() {
            errors.push("client address cannot be empty".to_string());
        } else if self.address.parse::<std::net::SocketAddr>().is_err() {
            errors.push(format!(
                "invalid client address: '{}' (expected host:port)",
                self.address
            ));
        }

        if self.connect_timeout.as_millis() < 100 {
            errors.push("connect timeout too short (minimum: 100ms)".to_string());
        }
        if self.call_timeout.as_millis() < 10 {
            errors.push("call timeout too short (minimum: 10ms)".to_string());
        }

        errors
    }
}

/// Wire-format settings shared by both ends.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FramingConfig {
    /// Cap on a single packet payload.
    pub max_payload_size: usize,

    /// Chunk size for reflowed streams.
    pub chunk_size: usize,

    /// Serializer compression level (-1 adaptive, 0-1 none, 2-4 stronger).
    pub compress_level: i32,
}

impl Default for FramingConfig {
    fn default() -> Self {
        FramingConfig {
            max_payload_size: MAX_PAYLOAD_SIZE,
            chunk_size: DEFAULT_CHUNK_SIZE,
            compress_level: 0,
        }
    }
}

impl FramingConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.max_payload_size == 0 {
            errors.push("max payload size cannot be 0".to_string());
        } else if self.max_payload_size > 100 * 1024 * 1024 {
            errors.push(format!(
                "max payload size too large: {} bytes (maximum: 100 MiB)",
                self.max_payload_size
            ));
        }

        if self.chunk_size == 0 {
            errors.push("chunk size cannot be 0".to_string());
        } else if self.chunk_size > self.max_payload_size {
            errors.push("chunk size cannot exceed max payload size".to_string());
        }

        if !(-1..=4).contains(&self.compress_level) {
            errors.push(format!(
                "compression level out of range: {} (expected -1..=4)",
                self.compress_level
            ));
        }

        errors
    }
}

/// Logging settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub app_name: String,

    #[serde(with = "log_level_serde")]
    pub log_level: Level,

    /// Emit JSON-formatted log lines.
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            app_name: String::from("chunkwire"),
            log_level: Level::INFO,
            json_format: false,
        }
    }
}

impl LoggingConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.app_name.is_empty() {
            errors.push("application name cannot be empty".to_string());
        } else if self.app_name.len() > 64 {
            errors.push(format!(
                "application name too long: {} characters (maximum: 64)",
                self.app_name.len()
            ));
        }
        errors
    }
}

/// Durations serialize as integer milliseconds.
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

/// `tracing::Level` serializes as its lowercase name.
mod log_level_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::str::FromStr;
    use tracing::Level;

    pub fn serialize<S>(level: &Level, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        level.to_string().to_lowercase().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Level, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        Level::from_str(&text)
            .map_err(|_| serde::de::Error::custom(format!("invalid log level: {text}")))
    }
}
