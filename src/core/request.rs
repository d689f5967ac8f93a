//! Outgoing request descriptors and endpoint identity.
//!
//! This module provides `RequestDescriptor`, the single input accepted by
//! the dispatcher, and `EndpointKey`, the identity under which all
//! per-endpoint state (breaker, throttle window, cache entry) is tracked.

use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

/// HTTP method of an outgoing request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// Read a resource.
    Get,
    /// Create a resource.
    Post,
    /// Replace a resource.
    Put,
    /// Remove a resource.
    Delete,
    /// Partially update a resource.
    Patch,
}

impl Method {
    /// Returns the method as its wire-format name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Patch => "PATCH",
        }
    }

    /// Returns `true` for verbs that change server state.
    ///
    /// Mutating requests are never answered from cache or fallback data;
    /// the caller must always learn whether the write actually happened.
    pub fn is_mutating(&self) -> bool {
        !matches!(self, Self::Get)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of an endpoint: method plus path template.
///
/// Keys are stable for the life of the process; every registry in the
/// dispatcher is keyed by this value, created lazily on first use and
/// never removed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EndpointKey {
    /// The HTTP method.
    pub method: Method,
    /// The path template, e.g. `/expenses`.
    pub path: String,
}

impl EndpointKey {
    /// Creates a new endpoint key.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
        }
    }
}

impl fmt::Display for EndpointKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.path)
    }
}

/// A single outgoing request as supplied by application code.
///
/// # Examples
///
/// ```rust
/// use faultgate::core::RequestDescriptor;
/// use serde_json::json;
///
/// let read = RequestDescriptor::get("/expenses");
/// let write = RequestDescriptor::post("/expenses", json!({"amount": 12.50}))
///     .with_header("X-Request-Source", "ui");
/// ```
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    /// The HTTP method.
    pub method: Method,
    /// Request path relative to the API base.
    pub path: String,
    /// Optional JSON body for mutating requests.
    pub body: Option<Value>,
    /// Headers to attach to the outgoing request.
    pub headers: HashMap<String, String>,
}

impl RequestDescriptor {
    /// Creates a request with no body or headers.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
            headers: HashMap::new(),
        }
    }

    /// Creates a GET request.
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    /// Creates a POST request with a JSON body.
    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::Post, path).with_body(body)
    }

    /// Creates a PUT request with a JSON body.
    pub fn put(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::Put, path).with_body(body)
    }

    /// Creates a PATCH request with a JSON body.
    pub fn patch(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::Patch, path).with_body(body)
    }

    /// Creates a DELETE request.
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::Delete, path)
    }

    /// Sets the request body.
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Adds a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Returns the endpoint key this request is tracked under.
    pub fn endpoint_key(&self) -> EndpointKey {
        EndpointKey::new(self.method, self.path.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_mutating_methods() {
        assert!(!Method::Get.is_mutating());
        assert!(Method::Post.is_mutating());
        assert!(Method::Put.is_mutating());
        assert!(Method::Delete.is_mutating());
        assert!(Method::Patch.is_mutating());
    }

    #[test]
    fn test_endpoint_key_display() {
        let key = EndpointKey::new(Method::Get, "/budgets");
        assert_eq!(key.to_string(), "GET /budgets");
    }

    #[test]
    fn test_descriptor_builders() {
        let request = RequestDescriptor::post("/expenses", json!({"amount": 10}))
            .with_header("X-Trace", "abc");

        assert_eq!(request.method, Method::Post);
        assert_eq!(request.path, "/expenses");
        assert!(request.body.is_some());
        assert_eq!(request.headers.get("X-Trace").map(String::as_str), Some("abc"));
    }

    #[test]
    fn test_same_path_different_method_is_different_key() {
        let read = RequestDescriptor::get("/expenses").endpoint_key();
        let write = RequestDescriptor::post("/expenses", json!({})).endpoint_key();
        assert_ne!(read, write);
    }
}
