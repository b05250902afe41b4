//! Paced retry wrapper for paginated API requests.
//!
//! The v2 API rate-limits aggressive clients, so list pages are requested
//! through a [`RequestPacer`]: every request after the first waits a fixed
//! interval, and failures are retried with exponential backoff.
//!
//! With the defaults (200 ms interval, 3 retries) a request that fails twice
//! and then succeeds waits `200` (backoff) + `200` (interval) + `400`
//! (backoff) + `200` (interval) milliseconds in total.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, instrument, warn};

use crate::error::YuqueError;

/// Fixed delay before every request after the first.
pub const REQUEST_INTERVAL: Duration = Duration::from_millis(200);

/// Default maximum number of retries after the initial attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Retry limits and timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
    interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            interval: REQUEST_INTERVAL,
        }
    }
}

impl RetryPolicy {
    /// Creates a policy with a custom retry count and base interval.
    #[must_use]
    pub fn new(max_retries: u32, interval: Duration) -> Self {
        Self {
            max_retries,
            interval,
        }
    }

    /// Returns the maximum number of retries.
    #[must_use]
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Returns the base interval.
    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Backoff after the failure of retry number `retry` (0 for the initial attempt).
    ///
    /// `interval * 2^retry`.
    #[must_use]
    pub fn backoff_delay(&self, retry: u32) -> Duration {
        self.interval.saturating_mul(2u32.saturating_pow(retry))
    }
}

/// Spaces out requests and retries failures; owned by one client instance.
#[derive(Debug, Default)]
pub struct RequestPacer {
    policy: RetryPolicy,
    request_count: u64,
    retries: u64,
}

impl RequestPacer {
    /// Creates a pacer with the given policy.
    #[must_use]
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            request_count: 0,
            retries: 0,
        }
    }

    /// Number of requests issued, retries included.
    #[must_use]
    pub fn request_count(&self) -> u64 {
        self.request_count
    }

    /// Number of retries performed.
    #[must_use]
    pub fn retries(&self) -> u64 {
        self.retries
    }

    /// Runs `op`, retrying recoverable failures.
    ///
    /// # Errors
    ///
    /// Returns the last error once retries are exhausted, or the first fatal
    /// error immediately.
    #[instrument(level = "debug", skip(self, op), fields(max_retries = self.policy.max_retries))]
    pub async fn run<T, F, Fut>(&mut self, mut op: F) -> Result<T, YuqueError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, YuqueError>>,
    {
        let mut retry = 0u32;
        loop {
            if retry > 0 || self.request_count > 0 {
                tokio::time::sleep(self.policy.interval).await;
            }
            self.request_count += 1;

            match op().await {
                Ok(value) => return Ok(value),
                Err(error) if error.is_fatal() => return Err(error),
                Err(error) if retry < self.policy.max_retries => {
                    let delay = self.policy.backoff_delay(retry);
                    warn!(
                        error = %error,
                        retry = retry + 1,
                        max_retries = self.policy.max_retries,
                        delay_ms = delay.as_millis(),
                        "request failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    retry += 1;
                    self.retries += 1;
                }
                Err(error) => {
                    debug!(retries = retry, "retries exhausted");
                    return Err(error);
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::cell::Cell;

    use tokio::time::Instant;

    use super::*;

    fn transient() -> YuqueError {
        YuqueError::http_status("https://www.yuque.com/api/v2/repos/me/notes/docs", 502)
    }

    // ==================== RetryPolicy Tests ====================

    #[test]
    fn test_policy_defaults() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries(), 3);
        assert_eq!(policy.interval(), Duration::from_millis(200));
    }

    #[test]
    fn test_backoff_doubles() {
        let policy = RetryPolicy::new(3, Duration::from_millis(100));
        assert_eq!(policy.backoff_delay(0), Duration::from_millis(100));
        assert_eq!(policy.backoff_delay(1), Duration::from_millis(200));
        assert_eq!(policy.backoff_delay(2), Duration::from_millis(400));
    }

    // ==================== RequestPacer Tests ====================

    #[tokio::test(start_paused = true)]
    async fn test_first_request_is_not_delayed() {
        let mut pacer = RequestPacer::default();
        let start = Instant::now();
        let value = pacer.run(|| async { Ok::<_, YuqueError>(1) }).await.unwrap();
        assert_eq!(value, 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(pacer.request_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_later_requests_wait_interval() {
        let mut pacer = RequestPacer::default();
        pacer.run(|| async { Ok::<_, YuqueError>(()) }).await.unwrap();
        let start = Instant::now();
        pacer.run(|| async { Ok::<_, YuqueError>(()) }).await.unwrap();
        assert_eq!(start.elapsed(), REQUEST_INTERVAL);
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_on_third_attempt_with_two_backoffs() {
        let base = Duration::from_millis(200);
        let mut pacer = RequestPacer::new(RetryPolicy::new(3, base));
        let calls = Cell::new(0u32);
        let start = Instant::now();

        let value = pacer
            .run(|| {
                calls.set(calls.get() + 1);
                let attempt = calls.get();
                async move {
                    if attempt < 3 {
                        Err(transient())
                    } else {
                        Ok("page")
                    }
                }
            })
            .await
            .unwrap();

        assert_eq!(value, "page");
        assert_eq!(calls.get(), 3);
        assert_eq!(pacer.retries(), 2);
        // backoffs base*1 + base*2, plus the interval before each of the two retries
        assert_eq!(start.elapsed(), base * 1 + base * 2 + base * 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retries_return_last_error() {
        let mut pacer = RequestPacer::default();
        let calls = Cell::new(0u32);
        let result: Result<(), _> = pacer
            .run(|| {
                calls.set(calls.get() + 1);
                async { Err(transient()) }
            })
            .await;
        assert!(matches!(result, Err(YuqueError::HttpStatus { status: 502, .. })));
        assert_eq!(calls.get(), 4);
        assert_eq!(pacer.retries(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_errors_are_not_retried() {
        let mut pacer = RequestPacer::default();
        let calls = Cell::new(0u32);
        let result: Result<(), _> = pacer
            .run(|| {
                calls.set(calls.get() + 1);
                async { Err(YuqueError::NotLoggedIn) }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.get(), 1);
    }
}
