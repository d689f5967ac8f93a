//! Per-endpoint circuit breakers for backend resilience.
//!
//! The circuit breaker pattern stops sending live requests to an endpoint
//! after repeated failures and periodically probes it to detect recovery.
//!
//! ## States
//!
//! - **Closed**: Normal operation; requests pass through, failures count.
//! - **Open**: Endpoint is failing; requests are served locally instead.
//! - **Half-Open**: Cooldown elapsed; a single probe tests recovery.
//!
//! ## Usage
//!
//! ```rust
//! use faultgate::circuit_breaker::{CircuitBreakerConfig, CircuitBreakerRegistry};
//! use faultgate::core::{EndpointKey, Method};
//! use std::time::Duration;
//!
//! let registry = CircuitBreakerRegistry::new(
//!     CircuitBreakerConfig::new()
//!         .with_failure_threshold(5)
//!         .with_cooldown(Duration::from_secs(30)),
//! );
//!
//! let key = EndpointKey::new(Method::Get, "/expenses");
//! registry.record_failure(&key);
//! assert_eq!(registry.state_name(&key), "closed");
//! ```

mod config;
mod registry;
mod state;

pub use config::CircuitBreakerConfig;
pub use registry::{BreakerGate, CircuitBreakerRegistry, CircuitSnapshot};
pub use state::{BreakerMetrics, BreakerState};
