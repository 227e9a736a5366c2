//! Bounded retry with jittered exponential backoff.
//!
//! Every backend and store call made by the workflow goes through
//! [`RetryPolicy::run`]. Each attempt is bounded by the call timeout; a
//! retryable failure waits `base * 2^(attempt-1)`, capped at the maximum
//! and randomised into the upper half of that window, before trying again.

use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, timeout};

use super::errors::StageError;
use crate::config::WorkflowConfig;
use crate::domain::turn::Stage;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_backoff: Duration,
    max_backoff: Duration,
    call_timeout: Duration,
    jitter: bool,
}

impl RetryPolicy {
    pub fn new(
        max_attempts: u32,
        base_backoff: Duration,
        max_backoff: Duration,
        call_timeout: Duration,
    ) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_backoff,
            max_backoff: max_backoff.max(base_backoff),
            call_timeout,
            jitter: true,
        }
    }

    pub fn from_config(config: &WorkflowConfig) -> Self {
        Self::new(
            config.max_attempts,
            config.base_backoff(),
            config.max_backoff(),
            config.stage_timeout(),
        )
    }

    /// Deterministic delays.
    pub fn without_jitter(mut self) -> Self {
        self.jitter = false;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn call_timeout(&self) -> Duration {
        self.call_timeout
    }

    /// Delay before attempt `attempt + 1`, where `attempt` is 1-based.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        let ceiling = self
            .base_backoff
            .saturating_mul(1u32 << exp)
            .min(self.max_backoff);
        if !self.jitter || ceiling.is_zero() {
            return ceiling;
        }
        let floor = ceiling / 2;
        rand::thread_rng().gen_range(floor..=ceiling)
    }

    /// Runs `op` until it succeeds, fails with a non-retryable error, or the
    /// attempt budget is spent. Returns the last error in the latter cases.
    pub async fn run<T, F, Fut>(&self, stage: Stage, mut op: F) -> Result<T, StageError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, StageError>>,
    {
        let mut attempt = 1;
        loop {
            let result = match timeout(self.call_timeout, op(attempt)).await {
                Ok(result) => result,
                Err(_) => Err(StageError::Timeout(self.call_timeout)),
            };

            let err = match result {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if !err.is_retryable() || attempt >= self.max_attempts {
                tracing::warn!(
                    stage = %stage,
                    attempt,
                    retryable = err.is_retryable(),
                    error = %err,
                    "stage call failed"
                );
                return Err(err);
            }

            let mut delay = self.backoff(attempt);
            if let Some(wait) = err.retry_after() {
                delay = delay.max(wait).min(self.max_backoff);
            }
            tracing::debug!(
                stage = %stage,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "retrying stage call"
            );
            sleep(delay).await;
            attempt += 1;
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&WorkflowConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::assessment::ExtractionError;
    use crate::ports::{AIError, StoreError};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn fast(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(
            max_attempts,
            Duration::from_millis(1),
            Duration::from_millis(4),
            Duration::from_secs(5),
        )
    }

    #[test]
    fn backoff_doubles_and_caps_without_jitter() {
        let policy = RetryPolicy::new(
            5,
            Duration::from_millis(100),
            Duration::from_millis(300),
            Duration::from_secs(1),
        )
        .without_jitter();
        assert_eq!(policy.backoff(1), Duration::from_millis(100));
        assert_eq!(policy.backoff(2), Duration::from_millis(200));
        assert_eq!(policy.backoff(3), Duration::from_millis(300));
        assert_eq!(policy.backoff(30), Duration::from_millis(300));
    }

    #[test]
    fn jittered_backoff_stays_in_upper_half() {
        let policy = RetryPolicy::new(
            3,
            Duration::from_millis(100),
            Duration::from_secs(10),
            Duration::from_secs(1),
        );
        for _ in 0..50 {
            let d = policy.backoff(2);
            assert!(d >= Duration::from_millis(100) && d <= Duration::from_millis(200));
        }
    }

    #[test]
    fn zero_attempts_still_runs_once() {
        assert_eq!(fast(0).max_attempts(), 1);
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let result = fast(3)
            .run(Stage::Assessment, move |_| {
                let counter = counter.clone();
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(StageError::Backend(AIError::unavailable("503")))
                    } else {
                        Ok("done")
                    }
                }
            })
            .await;
        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let result: Result<(), _> = fast(2)
            .run(Stage::NeedsEvaluation, move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err(StageError::Malformed(ExtractionError::Parse("eof".into()))) }
            })
            .await;
        assert!(result.unwrap_err().is_malformed());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn non_retryable_errors_stop_immediately() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let result: Result<(), _> = fast(5)
            .run(Stage::MemoryUpdate, move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err(StageError::Store(StoreError::conflict("plan v2 exists"))) }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn slow_calls_time_out_and_count_as_attempts() {
        let policy = RetryPolicy::new(
            2,
            Duration::from_millis(1),
            Duration::from_millis(1),
            Duration::from_millis(20),
        );
        let result: Result<(), _> = policy
            .run(Stage::PlanSynthesis, |_| async {
                sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await;
        assert!(matches!(result, Err(StageError::Timeout(_))));
    }
}
