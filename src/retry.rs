//! Bounded retry for transient adapter failures.
//!
//! At most one extra attempt, and only when the provider configuration opts
//! in. Hard provider errors and all local failures surface immediately.

use std::future::Future;
use std::time::Duration;

use rand::Rng;

use crate::error::PromptError;

#[derive(Debug, Clone, Copy)]
pub(crate) struct RetryPolicy {
    /// Extra attempts after the first call. Never more than one.
    max_retries: u32,
    base_delay: Duration,
}

impl RetryPolicy {
    pub(crate) fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
        }
    }

    pub(crate) fn single() -> Self {
        Self {
            max_retries: 1,
            base_delay: Duration::from_millis(500),
        }
    }
}

/// Run `op`, retrying once on a transient error when the policy allows it.
pub(crate) async fn run_with_retry<F, Fut, T>(
    policy: RetryPolicy,
    mut op: F,
) -> Result<T, PromptError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, PromptError>>,
{
    let mut attempt: u32 = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(error) if error.is_transient() && attempt < policy.max_retries => {
                attempt += 1;
                let jitter_ms = rand::thread_rng()
                    .gen_range(0..=policy.base_delay.as_millis().max(1) as u64);
                let delay = policy.base_delay + Duration::from_millis(jitter_ms);
                tracing::debug!(attempt, ?delay, %error, "retrying transient adapter failure");
                tokio::time::sleep(delay).await;
            }
            Err(error) => return Err(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn rate_limited() -> PromptError {
        PromptError::RateLimit {
            provider: "openai".into(),
            message: "429".into(),
        }
    }

    #[tokio::test]
    async fn transient_failure_is_retried_once_when_enabled() {
        let attempts = AtomicU32::new(0);
        let result = run_with_retry(RetryPolicy::single(), || {
            let n = attempts.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if n == 1 {
                    Err(rate_limited())
                } else {
                    Ok("ok")
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), "ok");
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn retry_is_bounded_to_a_single_extra_attempt() {
        let attempts = AtomicU32::new(0);
        let result: Result<(), _> = run_with_retry(RetryPolicy::single(), || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(rate_limited()) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn hard_errors_are_never_retried() {
        let attempts = AtomicU32::new(0);
        let result: Result<(), _> = run_with_retry(RetryPolicy::single(), || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async {
                Err(PromptError::Provider {
                    provider: "openai".into(),
                    status: Some(500),
                    message: "boom".into(),
                })
            }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn disabled_policy_never_retries_transients() {
        let attempts = AtomicU32::new(0);
        let result: Result<(), _> = run_with_retry(RetryPolicy::none(), || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(rate_limited()) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
