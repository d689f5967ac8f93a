//! Request orchestration: pre-flight gating, retries, and substitution.
//!
//! The [`Dispatcher`] threads one request through the breaker registry,
//! the throttle, the TTL cache, the retry executor, and the fallback
//! resolver, in that order. Its contract is that a read degrades through
//! progressively staler data before it ever surfaces an error, while a
//! write always reports its true outcome.

#[allow(clippy::module_inception)]
mod dispatcher;
mod retry;

pub use dispatcher::{Dispatcher, DispatcherBuilder, DispatcherConfig};
pub use retry::{execute as execute_with_retry, RetryConfig};
