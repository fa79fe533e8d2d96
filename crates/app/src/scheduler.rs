use std::time::Duration;

use crate::error::Result;

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);

/// Bounded retries with exponential backoff for scheduled aggregation runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff_max: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_max: Duration::from_secs(600),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (1-based): 1s, 2s, 4s, ... capped.
    pub fn backoff(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(31);
        INITIAL_BACKOFF
            .checked_mul(1u32 << exponent)
            .unwrap_or(self.backoff_max)
            .min(self.backoff_max)
    }
}

/// Runs `op` until it succeeds or the policy runs out of retries. `op` gets
/// the 1-based attempt number; `sleep` is called between attempts.
pub fn run_with_retry<T, F, S>(policy: &RetryPolicy, mut sleep: S, mut op: F) -> Result<T>
where
    F: FnMut(u32) -> Result<T>,
    S: FnMut(Duration),
{
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match op(attempt) {
            Ok(value) => return Ok(value),
            Err(err) if attempt <= policy.max_retries => {
                let delay = policy.backoff(attempt);
                tracing::warn!(
                    attempt,
                    delay_secs = delay.as_secs(),
                    error = %err,
                    "aggregation attempt failed, retrying"
                );
                sleep(delay);
            }
            Err(err) => {
                tracing::error!(attempts = attempt, error = %err, "aggregation failed");
                return Err(err);
            }
        }
    }
}
