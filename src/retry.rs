//! Exponential backoff for transient store failures.

use crate::deadline::Deadline;
use crate::error::TokenError;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Retry policy configuration.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts
    pub max_retries: u32,
    /// Initial delay between retries
    pub initial_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Multiplier for exponential backoff
    pub multiplier: f64,
    /// Whether to add jitter to delays
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(50),
            max_delay: Duration::from_secs(2),
            multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// Set the retry count.
    #[must_use]
    pub const fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the first backoff.
    #[must_use]
    pub const fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Cap each backoff.
    #[must_use]
    pub const fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Disable jitter.
    #[must_use]
    pub const fn without_jitter(mut self) -> Self {
        self.jitter = false;
        self
    }
}

/// Retries operations that fail with a retryable [`TokenError`].
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    /// Policy from `config`.
    #[must_use]
    pub const fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Policy that never retries.
    #[must_use]
    pub fn none() -> Self {
        Self::new(RetryConfig::default().with_max_retries(0))
    }

    /// Delay before retry number `attempt` (zero-based).
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        #[allow(clippy::cast_precision_loss)]
        let base_ms = self.config.initial_delay.as_millis() as f64
            * self.config.multiplier.powi(exponent);
        #[allow(clippy::cast_precision_loss)]
        let capped_ms = base_ms.min(self.config.max_delay.as_millis() as f64);

        let delay_ms = if self.config.jitter {
            // Up to 25% extra
            capped_ms * (1.0 + rand::random::<f64>() * 0.25)
        } else {
            capped_ms
        };

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let delay_ms = delay_ms as u64;
        Duration::from_millis(delay_ms)
    }

    /// Whether `error` on attempt `attempt` is worth another try.
    #[must_use]
    pub fn should_retry(&self, error: &TokenError, attempt: u32) -> bool {
        attempt < self.config.max_retries && error.is_retryable()
    }

    /// Run `operation`, retrying retryable failures.
    ///
    /// # Errors
    ///
    /// Returns the last error once retries are exhausted or the error is
    /// not retryable.
    pub async fn execute<F, Fut, T>(&self, mut operation: F) -> Result<T, TokenError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, TokenError>>,
    {
        let mut attempt = 0;
        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(error) => {
                    if !self.should_retry(&error, attempt) {
                        return Err(error);
                    }
                    let delay = self.delay_for_attempt(attempt);
                    debug!(attempt, delay = ?delay, error = %error, "Retrying store call");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    /// Like [`execute`](Self::execute), but gives up as soon as the next
    /// backoff would overrun `deadline`.
    ///
    /// # Errors
    ///
    /// Returns the last error, or `Timeout` if the deadline passes.
    pub async fn execute_within<F, Fut, T>(
        &self,
        deadline: &Deadline,
        mut operation: F,
    ) -> Result<T, TokenError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, TokenError>>,
    {
        let mut attempt = 0;
        loop {
            match deadline.run(operation()).await {
                Ok(result) => return Ok(result),
                Err(error) => {
                    let delay = self.delay_for_attempt(attempt);
                    if !self.should_retry(&error, attempt) || delay >= deadline.remaining() {
                        return Err(error);
                    }
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    /// Configured retry count.
    #[must_use]
    pub const fn max_retries(&self) -> u32 {
        self.config.max_retries
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}
