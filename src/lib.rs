//! # faultgate
//!
//! A client-side resilient request dispatcher. Every outgoing call runs
//! through a per-endpoint circuit breaker, a sliding-window throttle, a
//! TTL response cache, bounded exponential-backoff retries, and a static
//! fallback resolver, so that application code sees degraded data instead
//! of raw failures whenever degraded data exists.
//!
//! ## Architecture
//!
//! - **Core types** ([`core`]): request descriptors, source-tagged
//!   responses, the failure taxonomy, and the `Transport` /
//!   `TokenProvider` seams.
//! - **Circuit breaker** ([`circuit_breaker`]): per-endpoint state
//!   machines with single-probe half-open recovery.
//! - **Throttle** ([`throttle`]): per-endpoint sliding-window admission
//!   that sheds load into local data instead of rejecting it.
//! - **Cache** ([`cache`]): TTL store of the last successful payload per
//!   read endpoint.
//! - **Fallback** ([`fallback`]): prefix-matched static placeholders for
//!   reads with nothing better to serve.
//! - **Dispatcher** ([`dispatcher`]): the orchestrator tying the layers
//!   together, plus the retry executor.
//! - **Transports** ([`transport`]): a scriptable mock and an optional
//!   `reqwest`-backed HTTP client (feature `http`).
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use faultgate::prelude::*;
//!
//! let dispatcher = Dispatcher::builder()
//!     .transport(HttpTransport::new("https://api.example.com")?)
//!     .fallback_rule(FallbackRule::empty_list("/expenses"))
//!     .build()?;
//!
//! let response = dispatcher.dispatch(RequestDescriptor::get("/expenses")).await?;
//! println!("degraded: {}", response.is_degraded());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod cache;
pub mod circuit_breaker;
pub mod core;
pub mod dispatcher;
pub mod fallback;
pub mod throttle;
pub mod transport;

pub use crate::core::{
    ApiError, ApiResponse, DispatchError, DispatchResult, EndpointKey, ErrorKind, Method,
    RawResponse, RequestDescriptor, ResponseSource, TokenProvider, Transport,
};
pub use crate::dispatcher::{Dispatcher, DispatcherBuilder, DispatcherConfig, RetryConfig};
pub use crate::fallback::{FallbackResolver, FallbackRule};

/// Commonly used types, importable in one line.
pub mod prelude {
    pub use crate::cache::CacheConfig;
    pub use crate::circuit_breaker::CircuitBreakerConfig;
    pub use crate::core::{
        ApiError, ApiResponse, DispatchError, DispatchResult, EndpointKey, ErrorKind, Method,
        RawResponse, RequestDescriptor, ResponseSource, TokenProvider, Transport,
    };
    pub use crate::dispatcher::{Dispatcher, DispatcherBuilder, DispatcherConfig, RetryConfig};
    pub use crate::fallback::{FallbackResolver, FallbackRule};
    pub use crate::throttle::ThrottleConfig;
    #[cfg(feature = "http")]
    pub use crate::transport::HttpTransport;
    pub use crate::transport::{MockOutcome, MockTransport};
}
