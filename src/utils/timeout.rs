//! Async timeout helpers and the default durations used across the crate.

use crate::error::{Result, WireError};
use std::future::Future;
use std::time::Duration;

/// Default timeout for connection-level operations.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default interval between keepalive pings.
pub const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(15);

/// Default grace period for draining connections on shutdown.
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Run `fut` with a deadline, mapping expiry to [`WireError::Timeout`].
pub async fn with_timeout<F, T>(fut: F, duration: Duration) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(duration, fut).await {
        Ok(result) => result,
        Err(_) => Err(WireError::Timeout),
    }
}
