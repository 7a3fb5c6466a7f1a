//! Caller-level timeout for a whole turn.
//!
//! The engine itself never times out; a hung stream stays active until the
//! transport ends or the caller cancels. Wrap a turn in [`with_timeout`] to
//! bound it.

use std::future::Future;
use std::time::Duration;

use crate::error::ThinkstreamError;

/// Wrap a future with a timeout.
pub async fn with_timeout<T>(
    duration: Duration,
    future: impl Future<Output = Result<T, ThinkstreamError>>,
) -> Result<T, ThinkstreamError> {
    match tokio::time::timeout(duration, future).await {
        Ok(result) => result,
        Err(_) => Err(ThinkstreamError::Timeout(duration.as_millis() as u64)),
    }
}

/// Apply `duration` when present, otherwise await `future` as is.
pub async fn with_optional_timeout<T>(
    duration: Option<Duration>,
    future: impl Future<Output = Result<T, ThinkstreamError>>,
) -> Result<T, ThinkstreamError> {
    match duration {
        Some(duration) => with_timeout(duration, future).await,
        None => future.await,
    }
}
