//! Bounded exponential backoff for store connection attempts.

use crate::error::StoreError;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

/// Retry schedule for transient store failures.
///
/// The first retry waits `base_delay`; each later one multiplies the delay by
/// `factor`, capped at `max_delay`. After `max_retries` retries the last error
/// is returned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub factor: f64,
    pub max_retries: usize,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay_ms: 10,
            max_delay_ms: 2_000,
            factor: 2.0,
            max_retries: 29,
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no backoff.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    fn next_delay(&self, delay: Duration) -> Duration {
        let millis = (delay.as_millis() as f64 * self.factor.max(1.0)).round() as u64;
        Duration::from_millis(millis).min(self.max_delay())
    }

    #[cfg(test)]
    pub fn fast() -> Self {
        Self {
            base_delay_ms: 1,
            max_delay_ms: 4,
            factor: 2.0,
            max_retries: 3,
        }
    }
}

/// Runs `operation` until it succeeds, fails with a non-transient error, or
/// the policy runs out of retries.
pub async fn retry<F, Fut, T>(
    operation_name: &str,
    policy: &RetryPolicy,
    mut operation: F,
) -> Result<T, StoreError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StoreError>>,
{
    let mut delay = policy.base_delay().min(policy.max_delay());
    let mut retries = 0;

    loop {
        match operation().await {
            Ok(value) => {
                if retries > 0 {
                    info!(
                        "Operation '{}' succeeded after {} retries",
                        operation_name, retries
                    );
                }
                return Ok(value);
            }
            Err(err) if !err.is_transient() => return Err(err),
            Err(err) => {
                if retries >= policy.max_retries {
                    warn!(
                        "Operation '{}' giving up after {} retries: {}",
                        operation_name, retries, err
                    );
                    return Err(err);
                }
                retries += 1;

                warn!(
                    "Operation '{}' failed (retry {}/{}): {}. Retrying in {:?}",
                    operation_name, retries, policy.max_retries, err, delay
                );

                sleep(delay).await;
                delay = policy.next_delay(delay);
            }
        }
    }
}
