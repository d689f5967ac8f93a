//! Per-endpoint circuit breaker registry.
//!
//! One breaker exists per [`EndpointKey`], created lazily on first use and
//! never removed while the process runs. The registry is owned by a
//! dispatcher instance; there are no process-wide singletons, so separate
//! dispatchers track failures independently.

use crate::circuit_breaker::config::CircuitBreakerConfig;
use crate::circuit_breaker::state::{BreakerMetrics, BreakerState};
use crate::core::request::EndpointKey;

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Instant;

/// Admission decision for one request against an endpoint's breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerGate {
    /// Circuit is closed; the request may proceed normally.
    Allow,
    /// Cooldown elapsed; this request is the single half-open probe.
    Probe,
    /// Circuit is open (or a probe is in flight); serve locally instead.
    Blocked,
}

/// Point-in-time view of one endpoint's breaker.
#[derive(Debug, Clone)]
pub struct CircuitSnapshot {
    /// The state machine position.
    pub state: BreakerState,
    /// When the last health-relevant failure was recorded.
    pub last_failure: Option<Instant>,
    /// When the last success was recorded.
    pub last_success: Option<Instant>,
}

#[derive(Debug)]
struct EndpointCircuit {
    state: BreakerState,
    last_failure: Option<Instant>,
    last_success: Option<Instant>,
    metrics: BreakerMetrics,
}

impl EndpointCircuit {
    fn new() -> Self {
        Self {
            state: BreakerState::closed(),
            last_failure: None,
            last_success: None,
            metrics: BreakerMetrics::new(),
        }
    }
}

/// Failure-tracking state machines keyed by endpoint.
#[derive(Debug)]
pub struct CircuitBreakerRegistry {
    circuits: RwLock<HashMap<EndpointKey, EndpointCircuit>>,
    config: CircuitBreakerConfig,
}

impl CircuitBreakerRegistry {
    /// Creates a registry with the given configuration.
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            circuits: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Creates a registry with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }

    fn with_circuit<R>(&self, key: &EndpointKey, f: impl FnOnce(&mut EndpointCircuit) -> R) -> R {
        let mut circuits = self
            .circuits
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let circuit = circuits
            .entry(key.clone())
            .or_insert_with(EndpointCircuit::new);
        f(circuit)
    }

    /// Checks whether a request to `key` may go out.
    ///
    /// This is the single admission point: it atomically performs the
    /// open-to-half-open transition, so under concurrent dispatches exactly
    /// one caller receives [`BreakerGate::Probe`] per cooldown.
    pub fn check(&self, key: &EndpointKey) -> BreakerGate {
        self.with_circuit(key, |circuit| {
            let now = Instant::now();
            match circuit.state {
                BreakerState::Closed { .. } => BreakerGate::Allow,
                BreakerState::Open { until, .. } => {
                    if now >= until {
                        circuit.state = BreakerState::HalfOpen { probe_started: now };
                        BreakerGate::Probe
                    } else {
                        BreakerGate::Blocked
                    }
                }
                // Only one probe at a time; everyone else waits it out.
                BreakerState::HalfOpen { .. } => BreakerGate::Blocked,
            }
        })
    }

    /// Records a successful request.
    ///
    /// A half-open probe success closes the circuit; a success while
    /// closed resets the failure count (confidence is sliding, not
    /// cumulative).
    pub fn record_success(&self, key: &EndpointKey) {
        self.with_circuit(key, |circuit| {
            circuit.metrics.record_success();
            circuit.last_success = Some(Instant::now());

            match circuit.state {
                BreakerState::Closed { .. } => {
                    circuit.state = BreakerState::closed();
                }
                BreakerState::HalfOpen { .. } => {
                    circuit.state = BreakerState::closed();
                    circuit.metrics.record_closed();
                    tracing::info!(endpoint = %key, "circuit closed after successful probe");
                }
                // A success cannot arrive while open; no request went out.
                BreakerState::Open { .. } => {}
            }
        });
    }

    /// Records a health-relevant failure.
    ///
    /// Callers are expected to record exactly one failure per logical
    /// dispatch, after its internal retries are exhausted.
    pub fn record_failure(&self, key: &EndpointKey) {
        let cooldown = self.config.cooldown;
        let threshold = self.config.failure_threshold;

        self.with_circuit(key, |circuit| {
            circuit.metrics.record_failure();
            let now = Instant::now();
            circuit.last_failure = Some(now);

            match circuit.state {
                BreakerState::Closed { failure_count } => {
                    let failure_count = failure_count + 1;
                    if failure_count >= threshold {
                        circuit.state = BreakerState::Open {
                            opened_at: now,
                            until: now + cooldown,
                        };
                        circuit.metrics.record_opened();
                        tracing::warn!(
                            endpoint = %key,
                            failures = failure_count,
                            cooldown_ms = cooldown.as_millis() as u64,
                            "circuit opened"
                        );
                    } else {
                        circuit.state = BreakerState::Closed { failure_count };
                    }
                }
                BreakerState::HalfOpen { .. } => {
                    // Failed probe; reopen with a fresh cooldown.
                    circuit.state = BreakerState::Open {
                        opened_at: now,
                        until: now + cooldown,
                    };
                    circuit.metrics.record_opened();
                    tracing::warn!(endpoint = %key, "probe failed, circuit reopened");
                }
                BreakerState::Open { opened_at, .. } => {
                    circuit.state = BreakerState::Open {
                        opened_at,
                        until: now + cooldown,
                    };
                }
            }
        });
    }

    /// Records a request short-circuited because the circuit was open.
    pub fn record_rejected(&self, key: &EndpointKey) {
        self.with_circuit(key, |circuit| circuit.metrics.record_rejected());
    }

    /// Reverts a half-open probe that never went out.
    ///
    /// Used when the probe request was shed before reaching the network;
    /// the circuit returns to open with an already-elapsed cooldown so the
    /// next request probes immediately.
    pub fn abort_probe(&self, key: &EndpointKey) {
        self.with_circuit(key, |circuit| {
            if let BreakerState::HalfOpen { probe_started } = circuit.state {
                circuit.state = BreakerState::Open {
                    opened_at: probe_started,
                    until: Instant::now(),
                };
            }
        });
    }

    /// Returns `true` if the circuit is open and its cooldown has elapsed.
    pub fn should_attempt_reset(&self, key: &EndpointKey) -> bool {
        let circuits = self
            .circuits
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        match circuits.get(key).map(|c| &c.state) {
            Some(BreakerState::Open { until, .. }) => Instant::now() >= *until,
            _ => false,
        }
    }

    /// Returns the name of the breaker state for `key`.
    ///
    /// Endpoints never seen before report `closed`.
    pub fn state_name(&self, key: &EndpointKey) -> &'static str {
        let circuits = self
            .circuits
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        circuits
            .get(key)
            .map(|c| c.state.name())
            .unwrap_or("closed")
    }

    /// Returns a point-in-time view of the breaker for `key`.
    pub fn snapshot(&self, key: &EndpointKey) -> CircuitSnapshot {
        let circuits = self
            .circuits
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        match circuits.get(key) {
            Some(circuit) => CircuitSnapshot {
                state: circuit.state.clone(),
                last_failure: circuit.last_failure,
                last_success: circuit.last_success,
            },
            None => CircuitSnapshot {
                state: BreakerState::closed(),
                last_failure: None,
                last_success: None,
            },
        }
    }

    /// Returns a copy of the metrics for `key`.
    pub fn metrics(&self, key: &EndpointKey) -> BreakerMetrics {
        let circuits = self
            .circuits
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        circuits
            .get(key)
            .map(|c| c.metrics.clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::request::Method;
    use std::time::Duration;

    fn key() -> EndpointKey {
        EndpointKey::new(Method::Get, "/budgets")
    }

    fn registry(cooldown: Duration) -> CircuitBreakerRegistry {
        CircuitBreakerRegistry::new(
            CircuitBreakerConfig::new()
                .with_failure_threshold(5)
                .with_cooldown(cooldown),
        )
    }

    #[test]
    fn test_trips_at_threshold() {
        let registry = registry(Duration::from_secs(30));
        let key = key();

        for _ in 0..4 {
            registry.record_failure(&key);
        }
        assert_eq!(registry.state_name(&key), "closed");
        assert_eq!(registry.snapshot(&key).state.failure_count(), Some(4));

        registry.record_failure(&key);
        assert_eq!(registry.state_name(&key), "open");
        assert_eq!(registry.metrics(&key).times_opened, 1);
        assert_eq!(registry.check(&key), BreakerGate::Blocked);
    }

    #[test]
    fn test_success_resets_failure_count() {
        let registry = registry(Duration::from_secs(30));
        let key = key();

        for _ in 0..4 {
            registry.record_failure(&key);
        }
        registry.record_success(&key);
        assert_eq!(registry.snapshot(&key).state.failure_count(), Some(0));
        assert!(registry.snapshot(&key).last_success.is_some());

        // The slate is clean; four more failures still don't trip it.
        for _ in 0..4 {
            registry.record_failure(&key);
        }
        assert_eq!(registry.state_name(&key), "closed");
    }

    #[tokio::test]
    async fn test_single_probe_after_cooldown() {
        let registry = registry(Duration::from_millis(20));
        let key = key();

        for _ in 0..5 {
            registry.record_failure(&key);
        }
        assert_eq!(registry.check(&key), BreakerGate::Blocked);
        assert!(!registry.should_attempt_reset(&key));

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(registry.should_attempt_reset(&key));

        // Exactly one probe is admitted; the next caller is blocked.
        assert_eq!(registry.check(&key), BreakerGate::Probe);
        assert_eq!(registry.check(&key), BreakerGate::Blocked);
        assert_eq!(registry.state_name(&key), "half_open");
    }

    #[tokio::test]
    async fn test_probe_success_closes() {
        let registry = registry(Duration::from_millis(10));
        let key = key();

        for _ in 0..5 {
            registry.record_failure(&key);
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(registry.check(&key), BreakerGate::Probe);

        registry.record_success(&key);
        assert_eq!(registry.state_name(&key), "closed");
        assert_eq!(registry.metrics(&key).times_closed, 1);
        assert_eq!(registry.check(&key), BreakerGate::Allow);
    }

    #[tokio::test]
    async fn test_probe_failure_reopens() {
        let registry = registry(Duration::from_millis(10));
        let key = key();

        for _ in 0..5 {
            registry.record_failure(&key);
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(registry.check(&key), BreakerGate::Probe);

        registry.record_failure(&key);
        assert_eq!(registry.state_name(&key), "open");
        assert_eq!(registry.metrics(&key).times_opened, 2);
        assert_eq!(registry.check(&key), BreakerGate::Blocked);
    }

    #[tokio::test]
    async fn test_abort_probe_allows_immediate_retry() {
        let registry = registry(Duration::from_millis(10));
        let key = key();

        for _ in 0..5 {
            registry.record_failure(&key);
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(registry.check(&key), BreakerGate::Probe);

        registry.abort_probe(&key);
        assert_eq!(registry.state_name(&key), "open");
        assert_eq!(registry.check(&key), BreakerGate::Probe);
    }

    #[test]
    fn test_keys_are_independent() {
        let registry = registry(Duration::from_secs(30));
        let budgets = EndpointKey::new(Method::Get, "/budgets");
        let expenses = EndpointKey::new(Method::Get, "/expenses");

        for _ in 0..5 {
            registry.record_failure(&budgets);
        }
        assert_eq!(registry.state_name(&budgets), "open");
        assert_eq!(registry.state_name(&expenses), "closed");
        assert_eq!(registry.check(&expenses), BreakerGate::Allow);
    }
}
