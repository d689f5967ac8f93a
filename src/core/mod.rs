//! Core types and traits for the dispatch pipeline.
//!
//! This module provides the fundamental building blocks used throughout
//! the library:
//!
//! - [`request`] - Request descriptors and endpoint identity
//! - [`response`] - Raw and source-tagged response structures
//! - [`error`] - The failure taxonomy and normalized dispatch error
//! - [`traits`] - The `Transport` and `TokenProvider` seams

pub mod error;
pub mod request;
pub mod response;
pub mod traits;

// Re-export commonly used types at the core level
pub use error::{ApiError, DispatchError, DispatchResult, ErrorKind};
pub use request::{EndpointKey, Method, RequestDescriptor};
pub use response::{ApiResponse, RawResponse, ResponseSource};
pub use traits::{ArcTokenProvider, ArcTransport, TokenProvider, Transport};
