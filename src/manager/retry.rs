//! Retry policy and logic.

use crate::core::FetchError;

use std::future::Future;
use std::time::Duration;

/// Which errors are worth another attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryOn {
    /// Retry when rate limited.
    pub rate_limited: bool,
    /// Retry on timeouts.
    pub timeouts: bool,
    /// Retry on connection failures.
    pub connection_failures: bool,
}

impl Default for RetryOn {
    fn default() -> Self {
        Self {
            rate_limited: true,
            timeouts: true,
            connection_failures: false,
        }
    }
}

impl RetryOn {
    /// Returns `true` if `error` belongs to the retryable set.
    pub fn matches(&self, error: &FetchError) -> bool {
        match error {
            FetchError::RateLimited { .. } => self.rate_limited,
            FetchError::Timeout { .. } => self.timeouts,
            FetchError::ConnectionFailed { .. } => self.connection_failures,
            _ => false,
        }
    }
}

/// Retry behavior for one kind of outbound call.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first.
    pub max_attempts: u32,

    /// Delay before the first retry.
    pub initial_delay: Duration,

    /// Maximum delay between retries.
    pub max_delay: Duration,

    /// Multiplier for exponential backoff.
    pub backoff_multiplier: f64,

    /// Whether to add jitter to delays.
    pub jitter: bool,

    /// Whether a server-supplied `Retry-After` replaces the backoff delay.
    pub honor_retry_after: bool,

    /// Which errors are retried.
    pub retry_on: RetryOn,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            jitter: false,
            honor_retry_after: true,
            retry_on: RetryOn::default(),
        }
    }
}

impl RetryPolicy {
    /// Creates a new retry policy with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Disables retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// The direct tier: `max_retries` retries after the first attempt,
    /// backing off 1 s, 2 s, 4 s and honoring `Retry-After`.
    pub fn direct(max_retries: u32) -> Self {
        Self {
            max_attempts: max_retries.saturating_add(1),
            ..Self::default()
        }
    }

    /// The render provider: one retry after a fixed 5 s.
    pub fn provider() -> Self {
        Self {
            max_attempts: 2,
            initial_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(5),
            backoff_multiplier: 1.0,
            jitter: false,
            honor_retry_after: false,
            retry_on: RetryOn::default(),
        }
    }

    /// Sets the maximum number of attempts.
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Sets the initial delay.
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Sets the maximum delay.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the backoff multiplier.
    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier.max(1.0);
        self
    }

    /// Enables or disables jitter.
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Sets the retryable error set.
    pub fn with_retry_on(mut self, retry_on: RetryOn) -> Self {
        self.retry_on = retry_on;
        self
    }

    /// Calculates the backoff before attempt `attempt` (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let base_delay = self.initial_delay.as_millis() as f64
            * self.backoff_multiplier.powi(attempt as i32 - 1);

        let capped_delay = base_delay.min(self.max_delay.as_millis() as f64);

        let final_delay = if self.jitter {
            let jitter_factor = 0.5 + (attempt as f64 * 0.618033988749895) % 0.5;
            capped_delay * jitter_factor
        } else {
            capped_delay
        };

        Duration::from_millis(final_delay as u64)
    }

    /// Calculates the wait before attempt `attempt`, after `error`.
    ///
    /// A `Retry-After` hint wins over the backoff schedule but is still
    /// capped by `max_delay`.
    pub fn delay_after(&self, attempt: u32, error: &FetchError) -> Duration {
        match error.retry_after() {
            Some(hint) if self.honor_retry_after => hint.min(self.max_delay),
            _ => self.delay_for_attempt(attempt),
        }
    }

    /// Returns whether another attempt should be made.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

/// Executes an async operation under `policy`.
///
/// Errors outside the policy's retryable set are returned immediately.
/// `target` names the call in logs.
pub async fn retry_async<F, Fut, T>(
    policy: &RetryPolicy,
    target: &str,
    mut operation: F,
) -> Result<T, FetchError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                attempt += 1;
                if !policy.should_retry(attempt) || !policy.retry_on.matches(&e) {
                    return Err(e);
                }

                let delay = policy.delay_after(attempt, &e);
                tracing::warn!(
                    target_url = %target,
                    attempt = attempt,
                    max_attempts = policy.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Retrying request"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}
