//! Async utilities and patterns
//!
//! Retry with exponential backoff, per-call timeouts, and bounded concurrency.

use crate::error::{EphemeraError, EphemeraResult, ErrorContext};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::future::Future;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, error, warn};

/// Retry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first one
    pub max_attempts: usize,
    /// Initial delay between retries in milliseconds
    pub initial_delay_ms: u64,
    /// Maximum delay between retries in milliseconds
    pub max_delay_ms: u64,
    /// Backoff multiplier (exponential backoff)
    pub backoff_multiplier: f64,
    /// Whether to add jitter to delays
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 100,
            max_delay_ms: 2000,
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// Un-jittered delay to wait after the given failed attempt (1-based)
    pub fn base_delay_ms(&self, attempt: usize) -> u64 {
        let exponent = attempt.saturating_sub(1).min(32) as i32;
        let delay = (self.initial_delay_ms as f64) * self.backoff_multiplier.powi(exponent);
        if delay.is_finite() {
            (delay as u64).min(self.max_delay_ms)
        } else {
            self.max_delay_ms
        }
    }

    /// Delay to wait after the given failed attempt, with jitter applied if enabled
    pub fn delay_for_attempt(&self, attempt: usize) -> Duration {
        let base = self.base_delay_ms(attempt);
        let actual = if self.jitter {
            let jitter_factor = 0.1;
            let jitter = (fastrand::f64() - 0.5) * 2.0 * jitter_factor;
            ((base as f64) * (1.0 + jitter)) as u64
        } else {
            base
        };
        Duration::from_millis(actual.min(self.max_delay_ms))
    }
}

/// Successful outcome of a retried operation
#[derive(Debug)]
pub struct RetrySuccess<T> {
    pub value: T,
    /// Attempts used, including the successful one
    pub attempts: usize,
}

/// Failed outcome of a retried operation
#[derive(Debug)]
pub struct RetryFailure<E> {
    pub error: E,
    pub attempts: usize,
    /// True when the last error was retryable but the attempt budget ran out
    pub exhausted: bool,
}

/// Retry an async operation with exponential backoff, retrying only errors
/// accepted by `should_retry`
pub async fn retry_with_policy<F, Fut, T, E, P>(
    mut operation: F,
    config: &RetryConfig,
    operation_name: &str,
    should_retry: P,
) -> Result<RetrySuccess<T>, RetryFailure<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
    P: Fn(&E) -> bool,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;

        debug!(
            operation = operation_name,
            attempt = attempt,
            max_attempts = max_attempts,
            "Attempting operation"
        );

        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(
                        operation = operation_name,
                        attempt = attempt,
                        "Operation succeeded after retry"
                    );
                }
                return Ok(RetrySuccess {
                    value,
                    attempts: attempt,
                });
            }
            Err(err) if !should_retry(&err) => {
                return Err(RetryFailure {
                    error: err,
                    attempts: attempt,
                    exhausted: false,
                });
            }
            Err(err) => {
                if attempt >= max_attempts {
                    error!(
                        operation = operation_name,
                        attempt = attempt,
                        error = %err,
                        "Operation failed after all retry attempts"
                    );
                    return Err(RetryFailure {
                        error: err,
                        attempts: attempt,
                        exhausted: true,
                    });
                }

                let delay = config.delay_for_attempt(attempt);
                warn!(
                    operation = operation_name,
                    attempt = attempt,
                    error = %err,
                    delay_ms = delay.as_millis() as u64,
                    "Operation failed, retrying"
                );
                sleep(delay).await;
            }
        }
    }
}

/// Timeout wrapper for async operations
pub async fn with_timeout<F, T>(future: F, timeout_ms: u64, operation_name: &str) -> EphemeraResult<T>
where
    F: Future<Output = T>,
{
    match timeout(Duration::from_millis(timeout_ms), future).await {
        Ok(result) => Ok(result),
        Err(_) => Err(EphemeraError::Timeout {
            operation: operation_name.to_string(),
            duration_ms: timeout_ms,
            context: ErrorContext::new("async_utils")
                .with_operation("timeout")
                .with_metadata("timeout_ms", &timeout_ms.to_string())
                .with_suggestion("Increase the command timeout")
                .with_suggestion("Check connectivity to the backing store"),
        }),
    }
}

/// Concurrent processing with controlled parallelism
///
/// Each item runs on its own task; a panicking task surfaces as an
/// `Internal` error in its slot.
pub async fn process_concurrently<T, R, F, Fut>(
    items: Vec<T>,
    max_concurrent: usize,
    processor: F,
) -> Vec<EphemeraResult<R>>
where
    T: Send + 'static,
    R: Send + 'static,
    F: Fn(T) -> Fut + Send + Sync + Clone + 'static,
    Fut: Future<Output = R> + Send + 'static,
{
    use futures::stream::{self, StreamExt};

    stream::iter(items)
        .map(|item| {
            let processor = processor.clone();
            tokio::spawn(async move { processor(item).await })
        })
        .buffer_unordered(max_concurrent.max(1))
        .collect::<Vec<_>>()
        .await
        .into_iter()
        .map(|join_result| {
            join_result.map_err(|join_error| EphemeraError::Internal {
                message: format!("Task join error: {}", join_error),
                source: Some(Box::new(join_error)),
                context: ErrorContext::new("async_utils")
                    .with_operation("process_concurrently")
                    .with_suggestion("Check for panics in concurrent tasks"),
            })
        })
        .collect()
}
