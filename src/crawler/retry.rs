//! Retry policy around a single page fetch
//!
//! Failures are classified in priority order:
//!
//! | Failure | Decision |
//! |---------|----------|
//! | Rate limited | Stop the crawl gracefully |
//! | Transient network fault | Wait, then retry the same cursors |
//! | Anything else | Abort the crawl |

use crate::crawler::FetchError;
use std::time::Duration;

/// What the crawl loop should do after a failed fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// End the crawl as a partial success
    Stop,

    /// Sleep for the given delay and retry the same request
    RetryAfter(Duration),

    /// Propagate the failure and abort the crawl
    Abort,
}

/// Fixed-delay retry for transient faults
///
/// Transient faults are retried for as long as the crawl's time budget
/// allows; the budget check in the crawl loop bounds the number of attempts.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    delay: Duration,
}

impl RetryPolicy {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    /// Decides how to handle a failed fetch
    ///
    /// # Arguments
    ///
    /// * `error` - The failure returned by the page fetcher
    /// * `attempt` - 1-based attempt number for the current page
    pub fn decide(&self, error: &FetchError, attempt: u32) -> RetryDecision {
        match error {
            FetchError::RateLimited => {
                tracing::info!("Rate limit exceeded - stopping operation");
                RetryDecision::Stop
            }
            FetchError::Transient(detail) => {
                tracing::warn!(
                    "Connection error on attempt {}: {}; retrying in {}ms",
                    attempt,
                    detail,
                    self.delay.as_millis()
                );
                RetryDecision::RetryAfter(self.delay)
            }
            FetchError::Other(detail) => {
                tracing::error!("Search API failure: {}", detail);
                RetryDecision::Abort
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(Duration::from_millis(1000))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_stops() {
        let policy = RetryPolicy::default();
        assert_eq!(
            policy.decide(&FetchError::RateLimited, 1),
            RetryDecision::Stop
        );
    }

    #[test]
    fn test_transient_retries_with_fixed_delay() {
        let policy = RetryPolicy::default();
        let fault = FetchError::Transient("connection reset".to_string());

        for attempt in 1..5 {
            assert_eq!(
                policy.decide(&fault, attempt),
                RetryDecision::RetryAfter(Duration::from_millis(1000))
            );
        }
    }

    #[test]
    fn test_other_failure_aborts() {
        let policy = RetryPolicy::new(Duration::from_millis(5));
        assert_eq!(
            policy.decide(&FetchError::Other("HTTP 401".to_string()), 1),
            RetryDecision::Abort
        );
    }
}
