//! Scriptable in-memory transport for tests.

use crate::core::{ApiError, RawResponse, RequestDescriptor, Transport};

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::Duration;

/// What a scripted call should produce.
#[derive(Debug, Clone)]
pub enum MockOutcome {
    /// Hand back a response with this status and body.
    Respond(RawResponse),
    /// Fail as if no response arrived.
    NetworkError(String),
}

impl MockOutcome {
    /// A 200 response with the given body.
    pub fn ok(body: Value) -> Self {
        Self::Respond(RawResponse::ok(body))
    }

    /// A response with an arbitrary status.
    pub fn status(status: u16, body: Value) -> Self {
        Self::Respond(RawResponse::new(status, body))
    }

    /// A transport-level failure.
    pub fn network(message: impl Into<String>) -> Self {
        Self::NetworkError(message.into())
    }
}

/// In-memory [`Transport`] with per-path scripts and call accounting.
///
/// Outcomes queued for a path are consumed in order; once a path's queue
/// is empty (or was never scripted) the default outcome answers. The
/// default default is a 200 with a `Null` body.
#[derive(Debug)]
pub struct MockTransport {
    scripts: RwLock<HashMap<String, VecDeque<MockOutcome>>>,
    default_outcome: MockOutcome,
    latency: Option<Duration>,
    call_count: AtomicU64,
    calls_by_path: RwLock<HashMap<String, u64>>,
    last_request: RwLock<Option<RequestDescriptor>>,
}

impl MockTransport {
    /// Creates a transport that answers 200/`Null` to everything.
    pub fn new() -> Self {
        Self {
            scripts: RwLock::new(HashMap::new()),
            default_outcome: MockOutcome::ok(Value::Null),
            latency: None,
            call_count: AtomicU64::new(0),
            calls_by_path: RwLock::new(HashMap::new()),
            last_request: RwLock::new(None),
        }
    }

    /// Sets the outcome used when no script matches.
    pub fn with_default(mut self, outcome: MockOutcome) -> Self {
        self.default_outcome = outcome;
        self
    }

    /// Queues outcomes for a path, consumed one per call.
    pub fn with_script(self, path: impl Into<String>, outcomes: Vec<MockOutcome>) -> Self {
        {
            let mut scripts = self.scripts.write().unwrap();
            scripts.insert(path.into(), outcomes.into());
        }
        self
    }

    /// Adds an artificial delay before each answer.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Appends one outcome to a path's queue after construction.
    pub fn enqueue(&self, path: impl Into<String>, outcome: MockOutcome) {
        let mut scripts = self.scripts.write().unwrap();
        scripts.entry(path.into()).or_default().push_back(outcome);
    }

    /// Total calls observed across all paths.
    pub fn call_count(&self) -> u64 {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Calls observed for one path.
    pub fn calls_to(&self, path: &str) -> u64 {
        self.calls_by_path
            .read()
            .unwrap()
            .get(path)
            .copied()
            .unwrap_or(0)
    }

    /// The most recent request received, headers included.
    pub fn last_request(&self) -> Option<RequestDescriptor> {
        self.last_request.read().unwrap().clone()
    }

    fn next_outcome(&self, path: &str) -> MockOutcome {
        let mut scripts = self.scripts.write().unwrap();
        scripts
            .get_mut(path)
            .and_then(|queue| queue.pop_front())
            .unwrap_or_else(|| self.default_outcome.clone())
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: &RequestDescriptor) -> Result<RawResponse, ApiError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        {
            let mut by_path = self.calls_by_path.write().unwrap();
            *by_path.entry(request.path.clone()).or_insert(0) += 1;
        }
        *self.last_request.write().unwrap() = Some(request.clone());

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        match self.next_outcome(&request.path) {
            MockOutcome::Respond(response) => Ok(response),
            MockOutcome::NetworkError(message) => {
                Err(ApiError::network(request.endpoint_key().to_string(), message))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_scripts_consumed_in_order() {
        let transport = MockTransport::new().with_script(
            "/expenses",
            vec![
                MockOutcome::status(500, json!({})),
                MockOutcome::ok(json!({"items": []})),
            ],
        );
        let request = RequestDescriptor::get("/expenses");

        assert_eq!(transport.send(&request).await.unwrap().status, 500);
        assert_eq!(transport.send(&request).await.unwrap().status, 200);
        // Queue exhausted: the default outcome answers.
        assert_eq!(transport.send(&request).await.unwrap().body, Value::Null);
        assert_eq!(transport.call_count(), 3);
        assert_eq!(transport.calls_to("/expenses"), 3);
    }

    #[tokio::test]
    async fn test_network_outcome_errors() {
        let transport = MockTransport::new().with_default(MockOutcome::network("refused"));
        let request = RequestDescriptor::get("/budgets");

        let error = transport.send(&request).await.unwrap_err();
        assert!(matches!(error, ApiError::Network { .. }));
    }

    #[tokio::test]
    async fn test_last_request_captured() {
        let transport = MockTransport::new();
        let request = RequestDescriptor::post("/expenses", json!({"amount": 3}))
            .with_header("X-Test", "1");

        transport.send(&request).await.unwrap();

        let seen = transport.last_request().unwrap();
        assert_eq!(seen.path, "/expenses");
        assert_eq!(seen.headers.get("X-Test").map(String::as_str), Some("1"));
    }

    #[tokio::test]
    async fn test_enqueue_after_construction() {
        let transport = MockTransport::new();
        transport.enqueue("/settings", MockOutcome::status(503, json!({})));

        let request = RequestDescriptor::get("/settings");
        assert_eq!(transport.send(&request).await.unwrap().status, 503);
        assert_eq!(transport.send(&request).await.unwrap().status, 200);
    }
}
