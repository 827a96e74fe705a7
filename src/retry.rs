use std::future::Future;
use std::time::Duration;

use tracing::{info, warn};

/// Errors that can tell a transient failure (worth retrying) from a hard one.
pub trait Retryable {
    fn is_transient(&self) -> bool;
}

#[derive(Clone, Debug)]
pub struct RetryPolicy {
    /// Total attempts, including the first call.
    pub max_attempts: u32,
    pub min_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            min_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// No waiting between attempts.
    #[cfg(test)]
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            min_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Delay before attempt `attempt + 1`, where `attempt` is the 1-based attempt that just failed.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exp = Duration::from_secs(1u64 << attempt.saturating_sub(1).min(20));
        exp.clamp(self.min_delay, self.max_delay.max(self.min_delay))
    }
}

/// Runs `op` until it succeeds, fails with a non-transient error, or the attempts run out.
pub async fn run<T, E, F, Fut>(policy: &RetryPolicy, label: &str, op: F) -> Result<T, E>
where
    E: Retryable + std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    run_if(policy, label, E::is_transient, op).await
}

/// Like [`run`], but only errors accepted by `retry_on` are retried. For calls that are not
/// safe to repeat once the server may have applied them.
pub async fn run_if<T, E, P, F, Fut>(
    policy: &RetryPolicy,
    label: &str,
    retry_on: P,
    mut op: F,
) -> Result<T, E>
where
    E: std::fmt::Display,
    P: Fn(&E) -> bool,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match op().await {
            Ok(value) => {
                if attempt > 1 {
                    info!(op = label, attempt, "call succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) if retry_on(&e) && attempt < max_attempts => {
                let delay = policy.delay_after(attempt);
                warn!(
                    op = label,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "transient failure, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
