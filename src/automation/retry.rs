//! Bounded retry with exponential backoff
//!
//! Every failed attempt produces a retry notification; exhausting the bound
//! produces one failure notification and hands the last error back.

use std::future::Future;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::config::RetryConfig;
use crate::error::Result;
use crate::feature::ExecutionContext;
use crate::notify::{FailureDetails, Notifier};

/// Attempt bound and backoff shape
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub multiplier: f64,
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries.max(1),
            base_delay: Duration::from_millis(config.retry_delay_ms),
            multiplier: config.backoff_multiplier,
        }
    }

    /// Delay after failed `attempt` (1-based): `base * multiplier^(attempt-1)`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1) as i32;
        self.base_delay.mul_f64(self.multiplier.powi(exp))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

pub struct RetryExecutor {
    policy: RetryPolicy,
    notifier: Notifier,
}

impl RetryExecutor {
    pub fn new(policy: RetryPolicy, notifier: Notifier) -> Self {
        Self { policy, notifier }
    }

    /// Run `operation` under the process-wide policy
    pub async fn execute_with_retry<T, F, Fut>(
        &self,
        operation: F,
        label: &str,
        ctx: &ExecutionContext,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.execute_with_policy(self.policy, operation, label, ctx)
            .await
    }

    /// Run `operation` under a custom policy
    pub async fn execute_with_policy<T, F, Fut>(
        &self,
        policy: RetryPolicy,
        mut operation: F,
        label: &str,
        ctx: &ExecutionContext,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let max = policy.max_retries.max(1);
        let mut attempt = 1;

        loop {
            info!("Attempting {} (attempt {}/{})", label, attempt, max);

            let err = match operation().await {
                Ok(value) => {
                    if attempt > 1 {
                        info!("{} succeeded on attempt {}", label, attempt);
                    } else {
                        info!("{} completed successfully", label);
                    }
                    return Ok(value);
                }
                Err(e) => e,
            };

            warn!(
                attempt,
                "{} failed on attempt {}/{}: {}", label, attempt, max, err
            );
            self.notifier
                .send_retry(label, attempt, max, &err.to_string())
                .await;

            if attempt >= max {
                error!("{} failed after {} attempts: {}", label, max, err);
                self.notifier
                    .send_failure(
                        label,
                        &err.to_string(),
                        &FailureDetails {
                            wallet: ctx.wallet_address.clone(),
                            attempt: Some(max),
                            max_retries: Some(max),
                        },
                    )
                    .await;
                return Err(err);
            }

            let delay = policy.delay_for(attempt);
            info!("Waiting {}ms before retry", delay.as_millis());
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::notify::MemorySink;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn executor() -> (RetryExecutor, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::new());
        let notifier = Notifier::new(sink.clone(), "0G");
        (RetryExecutor::new(RetryPolicy::default(), notifier), sink)
    }

    fn ctx() -> ExecutionContext {
        ExecutionContext::new(1, "Test")
    }

    #[test]
    fn test_delay_schedule() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1), Duration::from_millis(5000));
        assert_eq!(policy.delay_for(2), Duration::from_millis(10000));
        assert_eq!(policy.delay_for(3), Duration::from_millis(20000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_on_third_attempt() {
        let (executor, sink) = executor();
        let attempts = AtomicU32::new(0);

        let start = tokio::time::Instant::now();
        let result = executor
            .execute_with_retry(
                || async {
                    let n = attempts.fetch_add(1, Ordering::SeqCst) + 1;
                    if n < 3 {
                        Err(Error::ExternalCall(format!("attempt {} failed", n)))
                    } else {
                        Ok(n)
                    }
                },
                "Flaky",
                &ctx(),
            )
            .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
        assert_eq!(sink.count_containing("RETRY ATTEMPT"), 2);
        assert_eq!(sink.count_containing("FAILURE"), 0);
        // 5s + 10s of backoff
        assert!(start.elapsed() >= Duration::from_secs(15));
    }

    #[tokio::test(start_paused = true)]
    async fn test_always_failing_exhausts_bound() {
        let (executor, sink) = executor();
        let attempts = AtomicU32::new(0);

        let result: Result<()> = executor
            .execute_with_retry(
                || async {
                    let n = attempts.fetch_add(1, Ordering::SeqCst) + 1;
                    Err(Error::ExternalCall(format!("boom {}", n)))
                },
                "Broken",
                &ctx(),
            )
            .await;

        let err = result.unwrap_err();
        assert_eq!(err.to_string(), "External call failed: boom 3");
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
        assert_eq!(sink.count_containing("RETRY ATTEMPT"), 3);
        assert_eq!(sink.count_containing("FAILURE"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_policy() {
        let (executor, sink) = executor();
        let attempts = AtomicU32::new(0);
        let policy = RetryPolicy {
            max_retries: 1,
            base_delay: Duration::from_millis(1),
            multiplier: 1.0,
        };

        let result: Result<()> = executor
            .execute_with_policy(
                policy,
                || async {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    Err(Error::ExternalCall("nope".into()))
                },
                "Once",
                &ctx(),
            )
            .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        assert_eq!(sink.count_containing("FAILURE"), 1);
    }
}
