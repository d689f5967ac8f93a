//! Sliding-window request admission.
//!
//! The throttle is a load-shedding safety valve, not a hard rate limit:
//! requests beyond the per-endpoint limit are not rejected but marked
//! [`Admission::Throttled`], and the dispatcher answers them from cache or
//! the window's last observed payload. This keeps a re-rendering UI that
//! polls the same endpoint from producing visible churn.

use crate::core::request::EndpointKey;

use serde_json::Value;
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

/// Outcome of a throttle admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The request is within the window limit and may go out.
    Allow,
    /// The window is full; resolve the request locally.
    Throttled,
}

/// Configuration for [`ThrottleGuard`].
#[derive(Debug, Clone)]
pub struct ThrottleConfig {
    /// Length of the counting window.
    pub window: Duration,

    /// Maximum requests admitted per window.
    pub max_requests: u32,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(1),
            max_requests: 10,
        }
    }
}

impl ThrottleConfig {
    /// Creates a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the window length.
    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    /// Sets the per-window request limit.
    pub fn with_max_requests(mut self, max: u32) -> Self {
        self.max_requests = max.max(1);
        self
    }
}

#[derive(Debug)]
struct ThrottleWindow {
    window_start: Instant,
    count: u32,
    last_payload: Option<Value>,
}

impl ThrottleWindow {
    fn new() -> Self {
        Self {
            window_start: Instant::now(),
            count: 0,
            last_payload: None,
        }
    }
}

/// Per-endpoint sliding-window request counter.
#[derive(Debug)]
pub struct ThrottleGuard {
    windows: RwLock<HashMap<EndpointKey, ThrottleWindow>>,
    config: ThrottleConfig,
}

impl ThrottleGuard {
    /// Creates a guard with the given configuration.
    pub fn new(config: ThrottleConfig) -> Self {
        Self {
            windows: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Creates a guard with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(ThrottleConfig::default())
    }

    /// Counts one request against `key`'s window and decides admission.
    pub fn admit(&self, key: &EndpointKey) -> Admission {
        let mut windows = self
            .windows
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let window = windows
            .entry(key.clone())
            .or_insert_with(ThrottleWindow::new);

        let now = Instant::now();
        if now.duration_since(window.window_start) >= self.config.window {
            window.window_start = now;
            window.count = 1;
            return Admission::Allow;
        }

        window.count += 1;
        if window.count > self.config.max_requests {
            Admission::Throttled
        } else {
            Admission::Allow
        }
    }

    /// Stores the most recent successful payload observed for `key`.
    pub fn record_payload(&self, key: &EndpointKey, payload: Value) {
        let mut windows = self
            .windows
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        windows
            .entry(key.clone())
            .or_insert_with(ThrottleWindow::new)
            .last_payload = Some(payload);
    }

    /// Returns the last observed successful payload for `key`, if any.
    ///
    /// This is the stale-but-specific source consulted for throttled
    /// requests when the TTL cache has nothing.
    pub fn last_payload(&self, key: &EndpointKey) -> Option<Value> {
        let windows = self
            .windows
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        windows.get(key).and_then(|w| w.last_payload.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::request::Method;
    use serde_json::json;

    fn key() -> EndpointKey {
        EndpointKey::new(Method::Get, "/expenses")
    }

    #[test]
    fn test_admits_up_to_limit() {
        let guard = ThrottleGuard::new(ThrottleConfig::new().with_max_requests(10));
        let key = key();

        for _ in 0..10 {
            assert_eq!(guard.admit(&key), Admission::Allow);
        }
        for _ in 0..5 {
            assert_eq!(guard.admit(&key), Admission::Throttled);
        }
    }

    #[tokio::test]
    async fn test_window_resets() {
        let guard = ThrottleGuard::new(
            ThrottleConfig::new()
                .with_window(Duration::from_millis(20))
                .with_max_requests(2),
        );
        let key = key();

        assert_eq!(guard.admit(&key), Admission::Allow);
        assert_eq!(guard.admit(&key), Admission::Allow);
        assert_eq!(guard.admit(&key), Admission::Throttled);

        tokio::time::sleep(Duration::from_millis(30)).await;

        // Fresh window: count restarts at 1.
        assert_eq!(guard.admit(&key), Admission::Allow);
        assert_eq!(guard.admit(&key), Admission::Allow);
    }

    #[test]
    fn test_keys_counted_independently() {
        let guard = ThrottleGuard::new(ThrottleConfig::new().with_max_requests(1));
        let expenses = EndpointKey::new(Method::Get, "/expenses");
        let budgets = EndpointKey::new(Method::Get, "/budgets");

        assert_eq!(guard.admit(&expenses), Admission::Allow);
        assert_eq!(guard.admit(&expenses), Admission::Throttled);
        assert_eq!(guard.admit(&budgets), Admission::Allow);
    }

    #[test]
    fn test_last_payload() {
        let guard = ThrottleGuard::with_defaults();
        let key = key();

        assert!(guard.last_payload(&key).is_none());
        guard.record_payload(&key, json!({"items": [1, 2]}));
        assert_eq!(guard.last_payload(&key), Some(json!({"items": [1, 2]})));

        guard.record_payload(&key, json!({"items": [3]}));
        assert_eq!(guard.last_payload(&key), Some(json!({"items": [3]})));
    }
}
