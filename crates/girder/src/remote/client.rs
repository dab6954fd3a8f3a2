//! Retry loop around a [`Transport`].

use super::{RemoteError, Request, Response, SendOptions, Transport};
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::Instrument;

/// Upper bound of the random jitter, as a fraction of the base delay.
pub const MAX_JITTER: f64 = 0.25;

/// Retry behavior for transient failures.
///
/// The delay before retry `n` (1-based) is `initial_delay * 2^(n-1)`,
/// increased by a random 0-25% jitter and capped at `max_delay`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Retries after the first attempt (total attempts = `max_retries + 1`)
    pub max_retries: u32,

    /// Base delay before the first retry
    pub initial_delay: Duration,

    /// Cap applied to every delay, jitter included
    pub max_delay: Duration,
}

impl RetryConfig {
    /// No retries: every failure is returned on the first attempt.
    pub const NONE: Self = Self {
        max_retries: 0,
        initial_delay: Duration::ZERO,
        max_delay: Duration::ZERO,
    };

    /// Delay before retry `attempt` without jitter or cap.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        self.initial_delay
            .saturating_mul(2_u32.saturating_pow(exponent))
    }

    /// Delay before retry `attempt` with the given jitter fraction.
    ///
    /// `jitter` is clamped to `[0, MAX_JITTER]`.
    pub fn delay_for_attempt(&self, attempt: u32, jitter: f64) -> Duration {
        let base = self.base_delay(attempt);
        let jitter = jitter.clamp(0.0, MAX_JITTER);
        base.saturating_add(base.mul_f64(jitter)).min(self.max_delay)
    }

    /// Longest total time one call can spend sleeping between attempts.
    pub fn max_total_delay(&self) -> Duration {
        (1..=self.max_retries).fold(Duration::ZERO, |acc, attempt| {
            acc.saturating_add(self.delay_for_attempt(attempt, MAX_JITTER))
        })
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
        }
    }
}

/// Remote API client with retry, backoff and dry-run support.
///
/// Retries are invisible to callers apart from [`Response::attempts`] /
/// [`RemoteError::attempts`].
#[derive(Debug, Clone)]
pub struct RemoteClient<T> {
    transport: T,
    retry: RetryConfig,
}

impl<T: Transport> RemoteClient<T> {
    /// Wrap `transport` with the default retry configuration.
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            retry: RetryConfig::default(),
        }
    }

    /// Replace the retry configuration.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        tracing::debug!(
            max_retries = retry.max_retries,
            max_total_delay = ?retry.max_total_delay(),
            "Retry policy configured"
        );
        self.retry = retry;
        self
    }

    /// Active retry configuration.
    pub fn retry_config(&self) -> &RetryConfig {
        &self.retry
    }

    /// The wrapped transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Perform one logical request.
    ///
    /// In dry-run mode no network action happens; the response data is the
    /// would-be request (`{"query": ..., "variables": ...}`) with zero
    /// attempts.
    ///
    /// # Errors
    ///
    /// Returns a [`RemoteError`] carrying every structured error of the last
    /// attempt, either immediately for a permanent failure or once retries
    /// are exhausted for a transient one.
    pub async fn send(
        &self,
        request: &Request,
        options: &SendOptions,
    ) -> Result<Response, RemoteError> {
        if options.dry_run {
            tracing::debug!(
                correlation_id = options.correlation_id.as_deref().unwrap_or("-"),
                "Dry run: skipping remote request"
            );
            return Ok(Response {
                data: json!({
                    "query": request.query,
                    "variables": request.variables,
                }),
                attempts: 0,
                dry_run: true,
            });
        }

        let span = tracing::debug_span!(
            "remote_send",
            correlation_id = options.correlation_id.as_deref().unwrap_or("-")
        );
        self.send_with_retry(request).instrument(span).await
    }

    async fn send_with_retry(&self, request: &Request) -> Result<Response, RemoteError> {
        let max_attempts = self.retry.max_retries.saturating_add(1);
        let mut attempt = 1;

        loop {
            match self.transport.execute(request).await {
                Ok(data) => {
                    if attempt > 1 {
                        tracing::debug!(attempts = attempt, "Remote request succeeded after retry");
                    }
                    return Ok(Response {
                        data,
                        attempts: attempt,
                        dry_run: false,
                    });
                }
                Err(error) => {
                    let retryable = error.is_retryable();

                    if retryable && attempt < max_attempts {
                        let jitter = rand::thread_rng().gen_range(0.0..=MAX_JITTER);
                        let delay = self.retry.delay_for_attempt(attempt, jitter);
                        tracing::warn!(
                            attempt,
                            max_attempts,
                            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                            error = %error,
                            "Transient remote failure, retrying"
                        );
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                        continue;
                    }

                    if retryable {
                        tracing::warn!(
                            attempt,
                            max_attempts,
                            error = %error,
                            "Remote request failed and exhausted retries"
                        );
                    } else {
                        tracing::debug!(
                            attempt,
                            error = %error,
                            "Remote request failed permanently"
                        );
                    }

                    return Err(RemoteError {
                        errors: error.into_api_errors(),
                        attempts: attempt,
                    });
                }
            }
        }
    }
}
