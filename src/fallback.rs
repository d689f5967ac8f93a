//! Static substitute payloads for unrecoverable reads.
//!
//! The resolver is the last line of defense before surfacing a hard
//! error: it is consulted only after the TTL cache (and, for throttled
//! requests, the last-known payload) came up empty. Rules are matched in
//! order against the request path; the first prefix match wins. Every
//! resolved payload is tagged `"fallback": true` so a caller can always
//! tell it apart from a genuine server response.

use serde_json::{json, Map, Value};

/// A prefix-matched substitution rule.
#[derive(Debug, Clone)]
pub struct FallbackRule {
    prefix: String,
    payload: Value,
}

impl FallbackRule {
    /// Creates a rule serving `payload` for paths starting with `prefix`.
    pub fn new(prefix: impl Into<String>, payload: Value) -> Self {
        Self {
            prefix: prefix.into(),
            payload,
        }
    }

    /// Creates the most common placeholder: an empty paginated collection.
    pub fn empty_list(prefix: impl Into<String>) -> Self {
        Self::new(
            prefix,
            json!({
                "success": true,
                "data": [],
                "pagination": { "page": 1, "limit": 0, "total": 0 }
            }),
        )
    }

    /// Returns `true` if this rule applies to `path`.
    pub fn matches(&self, path: &str) -> bool {
        path.starts_with(&self.prefix)
    }
}

/// Ordered set of fallback rules; read-only after construction.
#[derive(Debug, Default)]
pub struct FallbackResolver {
    rules: Vec<FallbackRule>,
}

impl FallbackResolver {
    /// Creates a resolver with no rules.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a rule; earlier rules take precedence.
    pub fn with_rule(mut self, rule: FallbackRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Resolves a substitute payload and HTTP-equivalent status for `path`.
    ///
    /// A matched rule answers with its canned payload and status 200; no
    /// match yields a generic service-unavailable payload with status 503.
    /// Either way the payload carries `"fallback": true`.
    pub fn resolve(&self, path: &str) -> (Value, u16) {
        for rule in &self.rules {
            if rule.matches(path) {
                return (tag_fallback(rule.payload.clone()), 200);
            }
        }

        (
            json!({
                "success": false,
                "fallback": true,
                "message": "service temporarily unavailable"
            }),
            503,
        )
    }
}

fn tag_fallback(payload: Value) -> Value {
    match payload {
        Value::Object(mut map) => {
            map.insert("fallback".to_string(), Value::Bool(true));
            Value::Object(map)
        }
        // Non-object payloads get wrapped so the tag has somewhere to live.
        other => {
            let mut map = Map::new();
            map.insert("data".to_string(), other);
            map.insert("fallback".to_string(), Value::Bool(true));
            Value::Object(map)
        }
    }
}
