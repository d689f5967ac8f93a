//! HTTP transport backed by `reqwest`.

use crate::core::{ApiError, Method, RawResponse, RequestDescriptor, Transport};

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

/// [`Transport`] that sends requests over HTTP.
///
/// Paths from the request descriptor are appended to a fixed base URL.
/// The client carries its own connect and request timeouts; those are
/// per-attempt limits and independent of any dispatch deadline.
#[derive(Debug)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    /// Creates a transport for the given base URL with default timeouts.
    ///
    /// Fails with [`ApiError::Configuration`] when the underlying client
    /// cannot be constructed (TLS backend or resolver initialization).
    pub fn new(base_url: impl Into<String>) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ApiError::configuration(format!("http client: {e}")))?;

        Ok(Self::with_client(client, base_url))
    }

    /// Creates a transport with a caller-configured client.
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self { client, base_url }
    }

    fn url_for(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

fn to_reqwest_method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Delete => reqwest::Method::DELETE,
        Method::Patch => reqwest::Method::PATCH,
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &RequestDescriptor) -> Result<RawResponse, ApiError> {
        let endpoint = request.endpoint_key().to_string();

        let mut builder = self
            .client
            .request(to_reqwest_method(request.method), self.url_for(&request.path));

        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| ApiError::network(&endpoint, e.to_string()))?;

        let status = response.status().as_u16();
        // An unparseable or empty body is not a transport failure; the
        // status code alone still classifies the outcome.
        let body = response.json::<Value>().await.unwrap_or(Value::Null);

        Ok(RawResponse::new(status, body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_builds_client() {
        assert!(HttpTransport::new("https://api.example.com").is_ok());
    }

    #[test]
    fn test_base_url_normalized() {
        let transport = HttpTransport::new("https://api.example.com///").unwrap();
        assert_eq!(
            transport.url_for("/expenses"),
            "https://api.example.com/expenses"
        );
    }

    #[test]
    fn test_method_mapping() {
        assert_eq!(to_reqwest_method(Method::Get), reqwest::Method::GET);
        assert_eq!(to_reqwest_method(Method::Patch), reqwest::Method::PATCH);
    }
}
