//! Structured logging setup driven by [`LoggingConfig`](crate::config::LoggingConfig).

use crate::config::LoggingConfig;
use crate::error::{Result, WireError};
use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber.
///
/// The `CHUNKWIRE_LOG` environment variable overrides the configured level
/// with a full `EnvFilter` directive string. Calling this twice returns an
/// error from the second call; tests should ignore it.
pub fn init(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_env("CHUNKWIRE_LOG")
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.to_string()));

    let result = if config.json_format {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .try_init()
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .try_init()
    };

    result.map_err(|e| WireError::ConfigError(format!("failed to install subscriber: {e}")))
}
