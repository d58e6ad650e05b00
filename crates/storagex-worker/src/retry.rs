//! Retry utilities with exponential backoff.
//!
//! Used to retry transient transcode failures inside one delivery, and to
//! keep repeated queue errors from flooding the log.

use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Backoff policy: `max_retries` extra attempts, the delay doubling from
/// `base_delay` up to `max_delay`.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Name used in retry log lines
    pub operation_name: String,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(60),
            operation_name: "operation".to_string(),
        }
    }
}

impl RetryConfig {
    pub fn new(operation_name: impl Into<String>) -> Self {
        Self {
            operation_name: operation_name.into(),
            ..Default::default()
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    /// Delay before retry number `attempt` (1-based): `base * 2^(attempt-1)`.
    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        let delay = self.base_delay.saturating_mul(2u32.pow(exp));
        delay.min(self.max_delay)
    }
}

#[derive(Debug)]
pub enum RetryResult<T, E> {
    Success(T),
    /// Last error, after `attempts` tries in total.
    Failed { error: E, attempts: u32 },
}

impl<T, E> RetryResult<T, E> {
    pub fn is_success(&self) -> bool {
        matches!(self, RetryResult::Success(_))
    }

    pub fn into_result(self) -> Result<T, E> {
        match self {
            RetryResult::Success(v) => Ok(v),
            RetryResult::Failed { error, .. } => Err(error),
        }
    }
}

/// Execute an async operation, retrying errors accepted by `should_retry`.
///
/// ```ignore
/// let config = RetryConfig::new("transcode").with_max_retries(2);
/// let result = retry_async(&config, WorkerError::is_retryable, || async {
///     transcoder.transcode(&job, &request).await
/// }).await;
/// ```
pub async fn retry_async<F, Fut, T, E, P>(
    config: &RetryConfig,
    should_retry: P,
    operation: F,
) -> RetryResult<T, E>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    P: Fn(&E) -> bool,
{
    let mut attempt = 0u32;

    loop {
        match operation().await {
            Ok(value) => return RetryResult::Success(value),
            Err(e) if attempt < config.max_retries && should_retry(&e) => {
                attempt += 1;
                let delay = config.delay_for_attempt(attempt);
                warn!(
                    operation = %config.operation_name,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "Transient failure, retrying: {}", e
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                return RetryResult::Failed {
                    error: e,
                    attempts: attempt + 1,
                }
            }
        }
    }
}

/// Tracks consecutive failures of a polling loop.
///
/// A failure is worth logging when its message differs from the previous
/// one, or while the run is still shorter than `max_repeats`. The first
/// success after a suppressed run logs the recovery.
#[derive(Debug, Default)]
pub struct FailureTracker {
    consecutive: u32,
    max_repeats: u32,
    last_error: Option<String>,
}

impl FailureTracker {
    pub fn new(max_repeats: u32) -> Self {
        Self {
            max_repeats,
            ..Self::default()
        }
    }

    pub fn record_success(&mut self) {
        if self.consecutive > self.max_repeats {
            info!("Recovered after {} consecutive failures", self.consecutive);
        }
        self.consecutive = 0;
        self.last_error = None;
    }

    /// Returns whether this failure should be logged.
    pub fn record_failure(&mut self, error: &impl std::fmt::Display) -> bool {
        self.consecutive += 1;
        let message = error.to_string();
        let repeated = self.last_error.as_deref() == Some(message.as_str());
        self.last_error = Some(message);

        if !repeated || self.consecutive <= self.max_repeats {
            return true;
        }
        if self.consecutive == self.max_repeats + 1 {
            debug!("Suppressing repeats of the same failure");
        }
        false
    }

    pub fn failure_count(&self) -> u32 {
        self.consecutive
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_delay_doubles_from_base() {
        let config = RetryConfig::new("test").with_base_delay(Duration::from_millis(100));

        assert_eq!(config.delay_for_attempt(1), Duration::from_millis(100));
        assert_eq!(config.delay_for_attempt(2), Duration::from_millis(200));
        assert_eq!(config.delay_for_attempt(3), Duration::from_millis(400));
    }

    #[test]
    fn test_delay_is_capped() {
        let config = RetryConfig::new("test").with_base_delay(Duration::from_secs(10));
        assert_eq!(config.delay_for_attempt(30), Duration::from_secs(60));
    }

    #[test]
    fn test_failure_tracker_suppresses_repeats_only() {
        let mut tracker = FailureTracker::new(2);

        assert!(tracker.record_failure(&"connection refused"));
        assert!(tracker.record_failure(&"connection refused"));
        assert!(!tracker.record_failure(&"connection refused"));
        // A different error is always worth a line.
        assert!(tracker.record_failure(&"NOGROUP"));
        assert!(!tracker.record_failure(&"NOGROUP"));
        assert_eq!(tracker.failure_count(), 5);

        tracker.record_success();
        assert_eq!(tracker.failure_count(), 0);
        assert!(tracker.record_failure(&"NOGROUP"));
    }

    #[tokio::test]
    async fn test_eventual_success() {
        let config = RetryConfig::new("test")
            .with_max_retries(3)
            .with_base_delay(Duration::from_millis(1));
        let calls = AtomicU32::new(0);

        let result = retry_async(&config, |_: &&str| true, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err("transient")
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result.into_result(), Ok(42));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_error_is_not_retried() {
        let config = RetryConfig::new("test")
            .with_max_retries(5)
            .with_base_delay(Duration::from_millis(1));
        let calls = AtomicU32::new(0);

        let result = retry_async(&config, |e: &&str| *e != "permanent", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>("permanent") }
        })
        .await;

        match result {
            RetryResult::Failed { attempts, .. } => assert_eq!(attempts, 1),
            RetryResult::Success(_) => panic!("expected failure"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_zero_retries_runs_once() {
        let config = RetryConfig::new("test").with_max_retries(0);
        let calls = AtomicU32::new(0);

        let result = retry_async(&config, |_: &&str| true, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>("transient") }
        })
        .await;

        assert!(!result.is_success());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
