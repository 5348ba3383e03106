//! Bounded retries for store and publish calls.
//!
//! Every attempt runs under a timeout so a stalled dependency cannot hang a
//! connection handler. Only transient failures are retried; once attempts are
//! exhausted the caller gets `AppError::Unavailable` and may retry itself.

use std::future::Future;
use std::time::Duration;

use rand::Rng;

use crate::config::ResilienceSettings;
use crate::infrastructure::metrics;
use crate::shared::error::AppError;

/// Retry policy with exponential backoff and jitter.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_backoff: Duration,
    max_backoff: Duration,
    call_timeout: Duration,
}

impl RetryPolicy {
    pub fn new(
        max_attempts: u32,
        base_backoff: Duration,
        max_backoff: Duration,
        call_timeout: Duration,
    ) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_backoff,
            max_backoff,
            call_timeout,
        }
    }

    pub fn from_settings(settings: &ResilienceSettings) -> Self {
        Self::new(
            settings.max_attempts,
            settings.base_backoff(),
            settings.max_backoff(),
            settings.call_timeout(),
        )
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay before attempt `attempt + 1`: `base * 2^(attempt-1)`, capped,
    /// then scaled by a random factor in [0.5, 1.0].
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let exp = self
            .base_backoff
            .saturating_mul(1u32 << attempt.saturating_sub(1).min(16));
        let capped = exp.min(self.max_backoff).as_millis() as u64;
        if capped == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::rng().random_range(capped / 2..=capped))
    }

    /// Run `call` until it succeeds, fails permanently, or attempts run out.
    pub async fn run<T, F, Fut>(&self, operation: &'static str, mut call: F) -> Result<T, AppError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, AppError>>,
    {
        let mut attempt = 1;
        loop {
            let outcome = match tokio::time::timeout(self.call_timeout, call()).await {
                Ok(result) => result,
                Err(_) => Err(AppError::Unavailable(format!(
                    "{} timed out after {}ms",
                    operation,
                    self.call_timeout.as_millis()
                ))),
            };

            match outcome {
                Err(e) if e.is_transient() && attempt < self.max_attempts => {
                    let delay = self.backoff_for(attempt);
                    tracing::warn!(
                        operation,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Transient failure, retrying"
                    );
                    metrics::record_retry(operation);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) if e.is_transient() => {
                    tracing::error!(operation, attempts = attempt, error = %e, "Retries exhausted");
                    return Err(match e {
                        AppError::Unavailable(msg) => AppError::Unavailable(msg),
                        other => AppError::Unavailable(format!("{}: {}", operation, other)),
                    });
                }
                other => return other,
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(
            3,
            Duration::from_millis(50),
            Duration::from_secs(1),
            Duration::from_secs(5),
        )
    }
}
