//! Delay strategy and retry loop for transient stage failures, ported from
//! the agent runtime's generic retry helper and narrowed to `PipelineError`.

use dubline_core::PipelineError;
use std::future::Future;
use std::time::Duration;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RetryPolicy {
    Fixed { delay_ms: u64 },
    ExponentialBackoff { base_ms: u64, max_ms: u64 },
}

impl RetryPolicy {
    pub fn delay_for(&self, attempt: usize) -> Duration {
        let ms = match self {
            RetryPolicy::Fixed { delay_ms } => *delay_ms,
            RetryPolicy::ExponentialBackoff { base_ms, max_ms } => {
                let exp = 1u64
                    .checked_shl(attempt as u32)
                    .and_then(|s| base_ms.checked_mul(s))
                    .unwrap_or(*max_ms);
                exp.min(*max_ms)
            }
        };
        Duration::from_millis(ms)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::ExponentialBackoff { base_ms: 500, max_ms: 30_000 }
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RetryConfig {
    /// In-process immediate retries the dispatcher runs for one delivery
    /// before giving up and nacking — bounded by wall-clock time spent
    /// holding that delivery.
    pub max_attempts: usize,
    pub policy: RetryPolicy,
    /// Cap on `StageEnvelope::attempt` (§4.6/§7): once a retryable failure's
    /// envelope has already been redelivered this many times, the
    /// dispatcher stops requeuing and fails the task instead of retrying
    /// forever. Distinct from `max_attempts`, which bounds retries inside a
    /// single delivery rather than across redeliveries of the envelope.
    pub max_redeliveries: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self { max_attempts: 5, policy: RetryPolicy::default(), max_redeliveries: 5 }
    }
}

/// Retries `f` while its error reports `is_retryable()`, stopping
/// immediately on the first terminal or canceled error.
pub async fn retry_with_policy<F, Fut, T>(config: &RetryConfig, mut f: F) -> Result<T, PipelineError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, PipelineError>>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut last_err = None;

    for attempt in 0..max_attempts {
        if attempt > 0 {
            tokio::time::sleep(config.policy.delay_for(attempt - 1)).await;
        }
        match f().await {
            Ok(v) => return Ok(v),
            Err(e) => {
                if !e.is_retryable() {
                    return Err(e);
                }
                last_err = Some(e);
            }
        }
    }

    Err(last_err.unwrap_or_else(|| PipelineError::Internal("no attempts made".into())))
}

/// Whether a retryable failure on an envelope already redelivered
/// `attempt` times should be requeued again, or treated as exhausted.
pub fn should_redeliver(attempt: u32, max_redeliveries: u32) -> bool {
    attempt < max_redeliveries
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn fixed_policy_is_constant() {
        let p = RetryPolicy::Fixed { delay_ms: 250 };
        assert_eq!(p.delay_for(0), Duration::from_millis(250));
        assert_eq!(p.delay_for(9), Duration::from_millis(250));
    }

    #[test]
    fn exponential_policy_caps_out() {
        let p = RetryPolicy::ExponentialBackoff { base_ms: 100, max_ms: 800 };
        assert_eq!(p.delay_for(0), Duration::from_millis(100));
        assert_eq!(p.delay_for(1), Duration::from_millis(200));
        assert_eq!(p.delay_for(5), Duration::from_millis(800));
    }

    #[tokio::test]
    async fn stops_retrying_on_terminal_error() {
        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();
        let config = RetryConfig {
            max_attempts: 5,
            policy: RetryPolicy::Fixed { delay_ms: 0 },
            max_redeliveries: 5,
        };

        let result: Result<u32, PipelineError> = retry_with_policy(&config, || {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err(PipelineError::Validation("bad input".into()))
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn succeeds_after_transient_retry() {
        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();
        let config = RetryConfig {
            max_attempts: 3,
            policy: RetryPolicy::Fixed { delay_ms: 0 },
            max_redeliveries: 5,
        };

        let result = retry_with_policy(&config, || {
            let c = c.clone();
            async move {
                let n = c.fetch_add(1, Ordering::SeqCst);
                if n == 0 {
                    Err(PipelineError::Transient("busy".into()))
                } else {
                    Ok(7u32)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn redeliver_cap_is_exclusive_of_max() {
        assert!(should_redeliver(0, 5));
        assert!(should_redeliver(4, 5));
        assert!(!should_redeliver(5, 5));
        assert!(!should_redeliver(9, 5));
    }
}
