//! # Conflict Retry
//!
//! Retry-with-reload for optimistic-concurrency writes. The attempt closure
//! receives the 1-based attempt number; from the second attempt on it is
//! expected to re-read the record and recompute its change before writing.
//! Only conflicts are retried, with exponential backoff and jitter.

use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::ConflictBackoffConfig;
use crate::error::{ReconcilerError, ReconcilerResult};
use crate::models::ObjectKey;

#[derive(Debug, Clone, PartialEq)]
pub struct ConflictBackoff {
    pub initial_delay: Duration,
    pub factor: f64,
    pub jitter: f64,
    pub steps: u32,
    pub max_delay: Duration,
}

impl Default for ConflictBackoff {
    fn default() -> Self {
        Self::from(&ConflictBackoffConfig::default())
    }
}

impl From<&ConflictBackoffConfig> for ConflictBackoff {
    fn from(config: &ConflictBackoffConfig) -> Self {
        Self {
            initial_delay: Duration::from_millis(config.initial_delay_ms),
            factor: config.factor,
            jitter: config.jitter,
            steps: config.steps.max(1),
            max_delay: Duration::from_millis(config.max_delay_ms),
        }
    }
}

impl ConflictBackoff {
    /// Delay before attempt `attempt + 1`, without jitter
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let millis = self.initial_delay.as_millis() as f64 * self.factor.powi(exponent);
        let capped = millis.min(self.max_delay.as_millis() as f64);
        Duration::from_millis(capped as u64)
    }

    /// Delay with up to `jitter` of the base added at random, still capped
    pub fn delay(&self, attempt: u32) -> Duration {
        let base = self.base_delay(attempt);
        if self.jitter <= 0.0 {
            return base;
        }
        let extra = base.as_secs_f64() * rand::thread_rng().gen_range(0.0..=self.jitter);
        (base + Duration::from_secs_f64(extra)).min(self.max_delay)
    }
}

/// Run `attempt` until it succeeds, fails with a non-conflict error, or the
/// step budget is spent
pub async fn retry_on_conflict<T, F, Fut>(
    backoff: &ConflictBackoff,
    operation: &ObjectKey,
    mut attempt: F,
) -> ReconcilerResult<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = ReconcilerResult<T>>,
{
    let steps = backoff.steps.max(1);
    for n in 1..=steps {
        match attempt(n).await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_conflict() && n < steps => {
                let delay = backoff.delay(n);
                debug!(
                    operation = %operation,
                    attempt = n,
                    delay_ms = delay.as_millis() as u64,
                    "Write conflict, retrying with a fresh copy"
                );
                tokio::time::sleep(delay).await;
            }
            Err(err) if err.is_conflict() => break,
            Err(err) => return Err(err),
        }
    }

    warn!(operation = %operation, attempts = steps, "Write conflict retries exhausted");
    Err(ReconcilerError::ConflictRetriesExhausted {
        operation: operation.clone(),
        attempts: steps,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_backoff(steps: u32) -> ConflictBackoff {
        ConflictBackoff {
            initial_delay: Duration::from_millis(1),
            factor: 2.0,
            jitter: 0.0,
            steps,
            max_delay: Duration::from_millis(5),
        }
    }

    fn conflict(key: &ObjectKey) -> ReconcilerError {
        StoreError::Conflict {
            key: key.clone(),
            current: 2,
            attempted: 1,
        }
        .into()
    }

    #[test]
    fn test_default_delays_grow_and_cap() {
        let backoff = ConflictBackoff::default();
        assert_eq!(backoff.base_delay(1), Duration::from_millis(10));
        assert_eq!(backoff.base_delay(2), Duration::from_millis(50));
        assert_eq!(backoff.base_delay(3), Duration::from_millis(250));
        assert_eq!(backoff.base_delay(4), Duration::from_millis(1000));
        assert_eq!(backoff.base_delay(9), Duration::from_millis(1000));

        let jittered = backoff.delay(2);
        assert!(jittered >= Duration::from_millis(50));
        assert!(jittered <= Duration::from_millis(56));
    }

    #[tokio::test]
    async fn test_retries_conflicts_until_success() {
        let key = ObjectKey::new("kafka", "op");
        let calls = AtomicU32::new(0);

        let result = retry_on_conflict(&fast_backoff(5), &key, |n| {
            calls.fetch_add(1, Ordering::SeqCst);
            let key = key.clone();
            async move {
                if n < 3 {
                    Err(conflict(&key))
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_conflict_error_is_not_retried() {
        let key = ObjectKey::new("kafka", "op");
        let calls = AtomicU32::new(0);

        let result: ReconcilerResult<()> = retry_on_conflict(&fast_backoff(5), &key, |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(ReconcilerError::from(StoreError::backend(
                    "update_status",
                    "connection reset",
                )))
            }
        })
        .await;

        assert!(matches!(result, Err(ReconcilerError::Store(StoreError::Backend { .. }))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_exhaustion_is_reported() {
        let key = ObjectKey::new("kafka", "op");
        let result: ReconcilerResult<()> =
            retry_on_conflict(&fast_backoff(3), &key, |_| {
                let key = key.clone();
                async move { Err(conflict(&key)) }
            })
            .await;

        assert!(matches!(
            result,
            Err(ReconcilerError::ConflictRetriesExhausted { attempts: 3, .. })
        ));
    }
}
