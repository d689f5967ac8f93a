//! Response structures.
//!
//! Two layers exist here: `RawResponse`, the status-and-body pair a
//! transport hands back, and `ApiResponse`, the source-tagged value the
//! dispatcher returns to application code. The tag is what lets a UI
//! render stale or placeholder data with a visible degraded indicator
//! instead of an error screen.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

/// A raw HTTP response as produced by a transport.
///
/// Non-2xx statuses are represented here, not as errors; classification
/// into the error taxonomy happens in the retry executor.
#[derive(Debug, Clone)]
pub struct RawResponse {
    /// HTTP status code.
    pub status: u16,
    /// Decoded JSON body (`Value::Null` when the body was empty).
    pub body: Value,
}

impl RawResponse {
    /// Creates a raw response.
    pub fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    /// Creates a 200 response.
    pub fn ok(body: Value) -> Self {
        Self::new(200, body)
    }

    /// Returns `true` for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Returns `true` for 4xx statuses.
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status)
    }

    /// Returns `true` for 5xx statuses.
    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.status)
    }
}

/// Where the payload of an [`ApiResponse`] came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseSource {
    /// Fresh payload from a live call.
    Live,
    /// Served from the TTL cache; `age` is the time since it was stored.
    Cache {
        /// How old the cached payload is.
        age: Duration,
    },
    /// The throttle window's most recent successful payload.
    LastKnown,
    /// Static placeholder from the fallback resolver.
    Fallback,
}

impl ResponseSource {
    /// Returns `true` for live payloads.
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Live)
    }

    /// Returns `true` for payloads served from stale local data.
    pub fn from_cache(&self) -> bool {
        matches!(self, Self::Cache { .. } | Self::LastKnown)
    }

    /// Returns `true` for fallback placeholders.
    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback)
    }

    /// Returns the name of the source.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Live => "live",
            Self::Cache { .. } => "cache",
            Self::LastKnown => "last_known",
            Self::Fallback => "fallback",
        }
    }
}

/// The response handed back to application code.
///
/// The serialized form carries `fromCache` and `fallback` flags so the
/// data-fetching layer above can flag degraded freshness to the user.
#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse {
    /// The response payload.
    pub data: Value,
    /// HTTP-equivalent status code.
    pub status: u16,
    /// Where the payload came from.
    #[serde(skip)]
    pub source: ResponseSource,
    /// Whether the payload is stale local data (TTL cache or last-known).
    #[serde(rename = "fromCache")]
    pub from_cache: bool,
    /// Whether the payload is a static placeholder.
    pub fallback: bool,
    /// Breaker state name for the endpoint at response time.
    #[serde(rename = "circuitState")]
    pub circuit_state: String,
    /// When this response was produced.
    pub timestamp: DateTime<Utc>,
}

impl ApiResponse {
    fn tagged(data: Value, status: u16, source: ResponseSource, circuit_state: &str) -> Self {
        let from_cache = source.from_cache();
        let fallback = source.is_fallback();
        Self {
            data,
            status,
            source,
            from_cache,
            fallback,
            circuit_state: circuit_state.to_string(),
            timestamp: Utc::now(),
        }
    }

    /// Creates an unmarked response from a live call.
    pub fn live(data: Value, status: u16, circuit_state: &str) -> Self {
        Self::tagged(data, status, ResponseSource::Live, circuit_state)
    }

    /// Creates a response served from the TTL cache.
    pub fn cached(data: Value, age: Duration, circuit_state: &str) -> Self {
        Self::tagged(data, 200, ResponseSource::Cache { age }, circuit_state)
    }

    /// Creates a response served from the last observed payload.
    pub fn last_known(data: Value, circuit_state: &str) -> Self {
        Self::tagged(data, 200, ResponseSource::LastKnown, circuit_state)
    }

    /// Creates a response built from fallback data.
    pub fn from_fallback(data: Value, status: u16, circuit_state: &str) -> Self {
        Self::tagged(data, status, ResponseSource::Fallback, circuit_state)
    }

    /// Returns `true` if the payload did not come from a live call.
    pub fn is_degraded(&self) -> bool {
        !self.source.is_live()
    }

    /// Returns the age of the payload, for cache-served responses.
    pub fn age(&self) -> Option<Duration> {
        match self.source {
            ResponseSource::Cache { age } => Some(age),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_raw_response_classes() {
        assert!(RawResponse::ok(json!({})).is_success());
        assert!(RawResponse::new(404, Value::Null).is_client_error());
        assert!(RawResponse::new(503, Value::Null).is_server_error());
        assert!(!RawResponse::new(503, Value::Null).is_success());
    }

    #[test]
    fn test_source_tags() {
        let live = ApiResponse::live(json!({"a": 1}), 200, "closed");
        assert!(!live.is_degraded());
        assert!(!live.from_cache);
        assert!(!live.fallback);

        let cached = ApiResponse::cached(json!({"a": 1}), Duration::from_secs(9), "open");
        assert!(cached.is_degraded());
        assert!(cached.from_cache);
        assert!(!cached.fallback);
        assert_eq!(cached.age(), Some(Duration::from_secs(9)));

        let fallback = ApiResponse::from_fallback(json!({"success": false}), 503, "open");
        assert!(fallback.is_degraded());
        assert!(!fallback.from_cache);
        assert!(fallback.fallback);
    }

    #[test]
    fn test_serialized_flags() {
        let cached = ApiResponse::cached(json!([1, 2]), Duration::from_secs(1), "open");
        let rendered = serde_json::to_value(&cached).unwrap();
        assert_eq!(rendered["fromCache"], json!(true));
        assert_eq!(rendered["fallback"], json!(false));
        assert_eq!(rendered["circuitState"], json!("open"));
    }
}
