//! Bounded exponential-backoff retry of the live call.

use crate::core::error::ApiError;
use crate::core::response::RawResponse;

use std::future::Future;
use std::time::{Duration, Instant};

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts, the first call included.
    pub max_attempts: u32,

    /// Delay before the first re-attempt.
    pub base_delay: Duration,

    /// Maximum delay between attempts.
    pub max_delay: Duration,

    /// Multiplier for exponential backoff.
    pub backoff_multiplier: f64,

    /// Whether to add jitter to delays.
    ///
    /// Off by default so the backoff series stays deterministic; turning
    /// it on desynchronizes concurrent retries at the cost of exact
    /// delay reproducibility.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            jitter: false,
        }
    }
}

impl RetryConfig {
    /// Creates a new retry configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Disables retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Sets the maximum number of attempts.
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Sets the base delay.
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Sets the maximum delay.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the backoff multiplier.
    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier.max(1.0);
        self
    }

    /// Enables or disables jitter.
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Calculates the delay before re-attempt number `attempt` (1-indexed
    /// count of failures so far).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let base_delay = self.base_delay.as_millis() as f64
            * self.backoff_multiplier.powi(attempt as i32 - 1);

        let capped_delay = base_delay.min(self.max_delay.as_millis() as f64);

        let final_delay = if self.jitter {
            // Deterministic jitter keyed off the attempt number.
            let jitter_factor = 0.5 + (attempt as f64 * 0.618033988749895) % 0.5;
            capped_delay * jitter_factor
        } else {
            capped_delay
        };

        Duration::from_millis(final_delay as u64)
    }

    /// Returns whether another attempt should be made after `attempt`
    /// failures.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

/// Runs one logical call with bounded exponential-backoff retries.
///
/// Non-2xx statuses are folded into the error taxonomy before the retry
/// decision: 5xx and transport failures are retried, everything else
/// returns immediately. The optional `deadline` caps total elapsed time;
/// when the next backoff would cross it, the most recent error surfaces
/// unchanged in kind. The backoff suspends only the calling task.
pub async fn execute<F, Fut>(
    config: &RetryConfig,
    endpoint: &str,
    deadline: Option<Instant>,
    mut call: F,
) -> Result<RawResponse, ApiError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<RawResponse, ApiError>>,
{
    if let Some(deadline) = deadline {
        if Instant::now() >= deadline {
            return Err(ApiError::DeadlineExceeded {
                endpoint: endpoint.to_string(),
            });
        }
    }

    let mut attempt = 0;
    loop {
        let error = match call().await {
            Ok(response) if response.is_success() => return Ok(response),
            Ok(response) => ApiError::from_status(endpoint, response.status),
            Err(e) => e,
        };

        attempt += 1;
        if !error.is_retryable() || !config.should_retry(attempt) {
            return Err(error);
        }

        let delay = config.delay_for_attempt(attempt);
        if let Some(deadline) = deadline {
            if Instant::now() + delay >= deadline {
                tracing::debug!(endpoint, attempt, "deadline reached, abandoning retries");
                return Err(error);
            }
        }

        tracing::debug!(
            endpoint,
            attempt,
            max_attempts = config.max_attempts,
            delay_ms = delay.as_millis() as u64,
            error = %error,
            "retrying request"
        );
        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_default_config() {
        let config = RetryConfig::default();
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.base_delay, Duration::from_secs(1));
        assert!(!config.jitter);
    }

    #[test]
    fn test_delay_series() {
        let config = RetryConfig::new()
            .with_base_delay(Duration::from_millis(100))
            .with_backoff_multiplier(2.0);

        assert_eq!(config.delay_for_attempt(0), Duration::ZERO);
        assert_eq!(config.delay_for_attempt(1), Duration::from_millis(100));
        assert_eq!(config.delay_for_attempt(2), Duration::from_millis(200));
        assert_eq!(config.delay_for_attempt(3), Duration::from_millis(400));
    }

    #[test]
    fn test_delay_capped() {
        let config = RetryConfig::new()
            .with_base_delay(Duration::from_secs(1))
            .with_max_delay(Duration::from_secs(5))
            .with_backoff_multiplier(10.0);

        assert_eq!(config.delay_for_attempt(2), Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_attempts_bounded() {
        let config = RetryConfig::new()
            .with_max_attempts(3)
            .with_base_delay(Duration::from_millis(1));
        let calls = Arc::new(AtomicU32::new(0));

        let counter = Arc::clone(&calls);
        let result = execute(&config, "GET /budgets", None, move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(RawResponse::new(503, json!({})))
            }
        })
        .await;

        assert!(matches!(result, Err(ApiError::Server { status: 503, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_elapsed_time_matches_backoff_series() {
        // Three attempts at 20 ms base and 2.0 multiplier sleep 20 + 40 ms
        // between attempts; total elapsed time tracks that sum.
        let config = RetryConfig::new()
            .with_max_attempts(3)
            .with_base_delay(Duration::from_millis(20))
            .with_backoff_multiplier(2.0);

        let started = Instant::now();
        let result = execute(&config, "GET /budgets", None, || async {
            Ok(RawResponse::new(500, json!({})))
        })
        .await;
        let elapsed = started.elapsed();

        assert!(matches!(result, Err(ApiError::Server { status: 500, .. })));
        assert!(elapsed >= Duration::from_millis(60), "elapsed {elapsed:?}");
        assert!(elapsed < Duration::from_millis(200), "elapsed {elapsed:?}");
    }

    #[tokio::test]
    async fn test_client_errors_do_not_retry() {
        let config = RetryConfig::new()
            .with_max_attempts(3)
            .with_base_delay(Duration::from_millis(1));
        let calls = Arc::new(AtomicU32::new(0));

        let counter = Arc::clone(&calls);
        let result = execute(&config, "POST /expenses", None, move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(RawResponse::new(422, json!({"error": "bad amount"})))
            }
        })
        .await;

        assert!(matches!(result, Err(ApiError::Validation { status: 422, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_recovery_mid_series() {
        let config = RetryConfig::new()
            .with_max_attempts(3)
            .with_base_delay(Duration::from_millis(1));
        let calls = Arc::new(AtomicU32::new(0));

        let counter = Arc::clone(&calls);
        let result = execute(&config, "GET /budgets", None, move || {
            let counter = Arc::clone(&counter);
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(ApiError::network("GET /budgets", "connection reset"))
                } else {
                    Ok(RawResponse::ok(json!({"ok": true})))
                }
            }
        })
        .await;

        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_deadline_stops_retries() {
        let config = RetryConfig::new()
            .with_max_attempts(5)
            .with_base_delay(Duration::from_millis(50));
        let calls = Arc::new(AtomicU32::new(0));
        let deadline = Instant::now() + Duration::from_millis(20);

        let counter = Arc::clone(&calls);
        let result = execute(&config, "GET /budgets", Some(deadline), move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(RawResponse::new(500, json!({})))
            }
        })
        .await;

        // The first backoff would cross the deadline; the server error
        // surfaces unchanged after a single attempt.
        assert!(matches!(result, Err(ApiError::Server { status: 500, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_expired_deadline_short_circuits() {
        let config = RetryConfig::default();
        let deadline = Instant::now() - Duration::from_millis(1);

        let result = execute(&config, "GET /budgets", Some(deadline), || async {
            Ok(RawResponse::ok(json!({})))
        })
        .await;

        assert!(matches!(result, Err(ApiError::DeadlineExceeded { .. })));
    }
}
