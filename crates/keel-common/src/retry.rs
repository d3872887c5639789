//! Retry utilities with exponential backoff and jitter.
//!
//! Used for short, bounded retries around calls that fail transiently
//! (API server probes, client construction). Callers decide which errors
//! are worth another attempt.
//!
//! # Example
//!
//! ```ignore
//! use keel_common::retry::{retry_with_backoff, RetryConfig};
//!
//! let version = retry_with_backoff(
//!     &RetryConfig::with_max_attempts(3),
//!     "apiserver_version",
//!     || async { client.apiserver_version().await },
//!     |_| true,
//! ).await?;
//! ```

use std::time::Duration;

use rand::Rng;
use tracing::{debug, warn};

/// Backoff settings for an operation that may fail transiently.
#[derive(Clone, Debug, PartialEq, serde::Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RetryConfig {
    /// Maximum number of attempts including the first one (0 = unbounded)
    pub max_attempts: u32,
    /// Delay before the second attempt
    #[serde(deserialize_with = "millis::deserialize")]
    pub initial_delay: Duration,
    /// Upper bound for any single delay
    #[serde(deserialize_with = "millis::deserialize")]
    pub max_delay: Duration,
    /// Multiplier applied to the delay after each failure
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Create a config with a maximum number of attempts
    pub fn with_max_attempts(attempts: u32) -> Self {
        Self {
            max_attempts: attempts,
            ..Default::default()
        }
    }

    /// Single attempt, no retries
    pub fn once() -> Self {
        Self::with_max_attempts(1)
    }

    fn exhausted(&self, attempt: u32) -> bool {
        self.max_attempts > 0 && attempt >= self.max_attempts
    }

    fn next_delay(&self, delay: Duration) -> Duration {
        Duration::from_secs_f64(
            (delay.as_secs_f64() * self.backoff_multiplier).min(self.max_delay.as_secs_f64()),
        )
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

/// Execute an async operation with exponential backoff and jitter.
///
/// `should_retry` is consulted after every failure; returning `false`
/// surfaces the error immediately. Otherwise the operation is retried
/// until it succeeds or `max_attempts` is exhausted, in which case the
/// last error is returned.
pub async fn retry_with_backoff<F, Fut, T, E, P>(
    config: &RetryConfig,
    operation_name: &str,
    mut operation: F,
    should_retry: P,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    P: Fn(&E) -> bool,
{
    let mut attempt = 0u32;
    let mut delay = config.initial_delay;

    loop {
        attempt += 1;

        let e = match operation().await {
            Ok(result) => return Ok(result),
            Err(e) => e,
        };

        if !should_retry(&e) {
            debug!(operation = %operation_name, attempt, error = %e, "Permanent failure, not retrying");
            return Err(e);
        }

        if config.exhausted(attempt) {
            warn!(
                operation = %operation_name,
                attempt,
                error = %e,
                "Operation failed after max retries"
            );
            return Err(e);
        }

        // 0.5x to 1.5x of the nominal delay
        let jitter = rand::thread_rng().gen_range(0.5..1.5);
        let jittered_delay = Duration::from_secs_f64(delay.as_secs_f64() * jitter);

        debug!(
            operation = %operation_name,
            attempt,
            error = %e,
            delay_ms = jittered_delay.as_millis() as u64,
            "Operation failed, retrying"
        );

        tokio::time::sleep(jittered_delay).await;
        delay = config.next_delay(delay);
    }
}
