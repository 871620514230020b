// Bounded retry with exponential backoff for a single remote call

use crate::config::RetryPolicyConfig;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Retry policy
///
/// Pure value: no mutable state, reusable across calls.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicyConfig::default().into()
    }
}

impl From<&RetryPolicyConfig> for RetryPolicy {
    fn from(config: &RetryPolicyConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            initial_delay: Duration::from_millis(config.initial_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            multiplier: config.multiplier,
        }
    }
}

impl From<RetryPolicyConfig> for RetryPolicy {
    fn from(config: RetryPolicyConfig) -> Self {
        Self::from(&config)
    }
}

impl RetryPolicy {
    /// Delay slept after the `attempt`-th failed attempt (1-based)
    ///
    /// ```text
    /// delay = min(initial_delay * multiplier ^ (attempt - 1), max_delay)
    /// ```
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.max(1.0).powi(attempt.saturating_sub(1) as i32);
        let delay = self.initial_delay.as_secs_f64() * factor;
        if !delay.is_finite() || delay >= self.max_delay.as_secs_f64() {
            return self.max_delay;
        }
        Duration::from_secs_f64(delay)
    }
}

/// Runs a fallible async operation under a [`RetryPolicy`].
///
/// Non-retryable errors propagate on first sight, unchanged. The last
/// permitted attempt is unconditional: its error propagates whatever its kind.
/// The inter-attempt delay is a plain tokio sleep, so dropping the returned
/// future cancels a pending retry.
#[derive(Debug, Default, Clone, Copy)]
pub struct RetryExecutor;

impl RetryExecutor {
    pub async fn run<T, E, Op, Fut, P>(
        &self,
        policy: &RetryPolicy,
        is_retryable: P,
        mut op: Op,
    ) -> Result<T, E>
    where
        Op: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
        E: std::fmt::Display,
    {
        let max_attempts = policy.max_attempts.max(1);

        for attempt in 1..max_attempts {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if !is_retryable(&e) => {
                    debug!(attempt, error = %e, "Non-retryable failure, giving up");
                    return Err(e);
                }
                Err(e) => {
                    let delay = policy.delay_after(attempt);
                    warn!(
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Retryable failure, backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }

        op().await
    }
}
