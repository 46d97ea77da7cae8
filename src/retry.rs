//! Retry logic with exponential backoff
//!
//! Every network operation in the pipeline goes through [`with_retry`], usually
//! wrapped in [`with_timeout`]. Transient failures (transport errors, timeouts,
//! retryable I/O) back off exponentially with optional jitter and count against
//! [`RetryConfig::max_attempts`]. Rate limits wait exactly the mandated time and do
//! not consume an attempt. Cancellation interrupts both the operation and any wait.
//!
//! # Example
//!
//! ```no_run
//! use media_relay::config::RetryConfig;
//! use media_relay::retry::with_retry;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> media_relay::Result<()> {
//! let config = RetryConfig::default();
//! let cancel = CancellationToken::new();
//! let value = with_retry(&config, &cancel, || async {
//!     Ok::<_, media_relay::Error>(42)
//! })
//! .await?;
//! # Ok(())
//! # }
//! ```

use crate::config::RetryConfig;
use crate::error::{Error, Result};
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Trait for errors that can be classified as retryable or not
///
/// Transient failures (network timeouts, connection reset) should return `true`.
/// Permanent failures (authorization lost, media gone, local disk errors) should
/// return `false`.
pub trait IsRetryable {
    /// Returns true if the error is transient and the operation should be retried
    fn is_retryable(&self) -> bool;

    /// Mandated wait before the next attempt, for backpressure signals
    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

impl IsRetryable for Error {
    fn is_retryable(&self) -> bool {
        match self {
            Error::Transfer(_) | Error::Timeout(_) | Error::RateLimited(_) => true,
            Error::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::ConnectionRefused
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::NotConnected
                    | std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::Interrupted
            ),
            Error::Config { .. }
            | Error::Link(_)
            | Error::MediaUnavailable(_)
            | Error::FatalAuth(_)
            | Error::Cancelled
            | Error::Serialization(_)
            | Error::Other(_) => false,
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            Error::RateLimited(wait) => Some(*wait),
            _ => None,
        }
    }
}

/// Execute an async operation with exponential backoff retry logic
///
/// Returns the successful result, the first non-retryable error, the last error
/// once `max_attempts` retries are exhausted, or [`Error::Cancelled`] as soon as
/// `cancel` fires.
pub async fn with_retry<F, Fut, T>(
    config: &RetryConfig,
    cancel: &CancellationToken,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    let mut delay = config.initial_delay;

    loop {
        let error = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            outcome = operation() => match outcome {
                Ok(value) => {
                    if attempt > 0 {
                        tracing::info!(attempts = attempt + 1, "Operation succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) => e,
            },
        };

        if let Some(wait) = error.retry_after() {
            tracing::warn!(
                error = %error,
                wait_ms = wait.as_millis(),
                "Rate limited, waiting before retrying"
            );
            sleep_or_cancel(wait, cancel).await?;
            continue;
        }

        if error.is_cancelled() || !error.is_retryable() {
            if !error.is_cancelled() {
                tracing::error!(error = %error, "Operation failed with non-retryable error");
            }
            return Err(error);
        }

        if attempt >= config.max_attempts {
            tracing::error!(
                error = %error,
                attempts = attempt + 1,
                "Operation failed after all retry attempts exhausted"
            );
            return Err(error);
        }

        attempt += 1;
        let wait = if config.jitter { add_jitter(delay) } else { delay };
        tracing::warn!(
            error = %error,
            attempt,
            max_attempts = config.max_attempts,
            delay_ms = wait.as_millis(),
            "Operation failed, retrying"
        );
        sleep_or_cancel(wait, cancel).await?;
        delay = delay.mul_f64(config.backoff_multiplier).min(config.max_delay);
    }
}

/// Bound a single network operation by a deadline
///
/// An elapsed deadline becomes [`Error::Timeout`], which is retryable.
pub async fn with_timeout<Fut, T>(limit: Duration, operation: Fut) -> Result<T>
where
    Fut: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, operation).await {
        Ok(result) => result,
        Err(_) => Err(Error::Timeout(limit)),
    }
}

async fn sleep_or_cancel(wait: Duration, cancel: &CancellationToken) -> Result<()> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Error::Cancelled),
        _ = tokio::time::sleep(wait) => Ok(()),
    }
}

/// Stretch a delay by a random factor in `[1, 2]`
fn add_jitter(delay: Duration) -> Duration {
    delay.mul_f64(1.0 + rand::thread_rng().gen_range(0.0..=1.0))
}
