//! Rate-limit aware execution of provider calls.
//!
//! Only "too many requests" is retried. Every other classified failure is
//! translated immediately so permanent problems (missing permission, unknown
//! resource) are never hidden behind a retry loop.

mod sleeper;

pub use sleeper::{RecordingSleeper, Sleeper, TokioSleeper};

use crate::config::RetryConfig;
use crate::error::{ProviderError, SpotifyError};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, warn};

/// Backoff parameters for throttled calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
        }
    }
}

impl RetryPolicy {
    /// Wait before the next attempt: the provider's hint when present,
    /// otherwise the current backoff, never more than `max_backoff`.
    fn wait_for(&self, hint: Option<Duration>, backoff: Duration) -> Duration {
        hint.unwrap_or(backoff).min(self.max_backoff)
    }

    fn next_backoff(&self, backoff: Duration) -> Duration {
        backoff.saturating_mul(2).min(self.max_backoff)
    }
}

/// Wraps single provider calls with throttling retries and error translation.
#[derive(Clone)]
pub struct ResilientExecutor {
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl ResilientExecutor {
    pub fn new(policy: RetryPolicy) -> Self {
        Self::with_sleeper(policy, Arc::new(TokioSleeper))
    }

    pub fn with_sleeper(policy: RetryPolicy, sleeper: Arc<dyn Sleeper>) -> Self {
        Self { policy, sleeper }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Runs `operation`, retrying only while it reports
    /// [`ProviderError::TooManyRequests`].
    ///
    /// # Returns
    /// * `Ok(T)` - first successful attempt
    /// * `Err(SpotifyError::RateLimited)` - still throttled after `max_retries` retries
    /// * `Err(..)` - any other failure, translated on the first occurrence
    pub async fn execute<T, F, Fut>(&self, mut operation: F) -> Result<T, SpotifyError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let mut backoff = self.policy.initial_backoff;
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            let retry_after = match operation().await {
                Ok(value) => return Ok(value),
                Err(ProviderError::TooManyRequests { retry_after }) => retry_after,
                Err(e) => {
                    error!(attempt, error = %e, "Provider call failed");
                    return Err(e.into());
                }
            };

            if attempt > self.policy.max_retries {
                error!(
                    attempts = attempt,
                    "Provider rate limit persisted, giving up"
                );
                return Err(SpotifyError::RateLimited { attempts: attempt });
            }

            let wait = self.policy.wait_for(retry_after, backoff);
            warn!(
                attempt,
                max_retries = self.policy.max_retries,
                wait_ms = wait.as_millis() as u64,
                provider_hint = retry_after.is_some(),
                "Rate limited by provider, backing off before retry"
            );
            self.sleeper.sleep(wait).await;
            backoff = self.policy.next_backoff(backoff);
        }
    }
}
