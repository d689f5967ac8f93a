//! Transport implementations.
//!
//! Anything implementing [`crate::core::Transport`] can sit under the
//! dispatcher. [`MockTransport`] ships for tests; [`HttpTransport`] is
//! available behind the `http` feature.

#[cfg(feature = "http")]
mod http;
mod mock;

#[cfg(feature = "http")]
pub use http::HttpTransport;
pub use mock::{MockOutcome, MockTransport};
