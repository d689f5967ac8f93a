//! Trait seams for the transport and authentication collaborators.
//!
//! The dispatcher owns resilience policy, nothing else. Everything that
//! actually touches the network or a credential store sits behind one of
//! these traits.

use crate::core::error::ApiError;
use crate::core::request::RequestDescriptor;
use crate::core::response::RawResponse;

use async_trait::async_trait;
use std::fmt::Debug;

/// The outgoing HTTP seam.
///
/// Implementations perform exactly one attempt of one request; retries,
/// breakers, and throttling all live above this trait. Connection
/// management, pooling, and TLS are the implementation's business.
///
/// # Implementation Notes
///
/// - Non-2xx statuses are *not* errors at this level; return them as a
///   [`RawResponse`] so the dispatcher can classify them.
/// - Return `Err` only when no usable response was received (DNS failure,
///   refused connection, timeout), as [`ApiError::Network`].
/// - Implementations must be `Send + Sync` and must never panic.
#[async_trait]
pub trait Transport: Send + Sync + Debug {
    /// Sends a single request and returns the raw response.
    async fn send(&self, request: &RequestDescriptor) -> Result<RawResponse, ApiError>;
}

/// Supplies and reacts to authentication state.
///
/// The dispatcher attaches the provider's current `Authorization` value
/// before each live call and notifies the provider when a request fails
/// with an authentication error. Token refresh and storage stay entirely
/// on the provider's side.
pub trait TokenProvider: Send + Sync + Debug {
    /// Returns the current `Authorization` header value, if a session exists.
    fn authorization(&self) -> Option<String>;

    /// Called once per dispatch that fails with an authentication error.
    ///
    /// Typical reaction is to drop the stored session and surface a login
    /// prompt; the dispatcher still propagates the error afterwards.
    fn invalidate(&self);
}

/// A shared transport handle.
pub type ArcTransport = std::sync::Arc<dyn Transport>;

/// A shared token provider handle.
pub type ArcTokenProvider = std::sync::Arc<dyn TokenProvider>;
