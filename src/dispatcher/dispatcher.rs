//! The request dispatcher implementation.

use crate::cache::{CacheConfig, ResponseCache};
use crate::circuit_breaker::{BreakerGate, CircuitBreakerConfig, CircuitBreakerRegistry};
use crate::core::{
    ApiError, ApiResponse, ArcTokenProvider, ArcTransport, DispatchError, EndpointKey, ErrorKind,
    RequestDescriptor, TokenProvider, Transport,
};
use crate::dispatcher::retry::{self, RetryConfig};
use crate::fallback::{FallbackResolver, FallbackRule};
use crate::throttle::{Admission, ThrottleConfig, ThrottleGuard};

use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Configuration for the dispatcher.
#[derive(Debug, Clone, Default)]
pub struct DispatcherConfig {
    /// Circuit breaker thresholds.
    pub breaker: CircuitBreakerConfig,

    /// Sliding-window throttle limits.
    pub throttle: ThrottleConfig,

    /// Response cache TTL.
    pub cache: CacheConfig,

    /// Retry and backoff parameters.
    pub retry: RetryConfig,
}

impl DispatcherConfig {
    /// Creates a new configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the breaker configuration.
    pub fn with_breaker(mut self, breaker: CircuitBreakerConfig) -> Self {
        self.breaker = breaker;
        self
    }

    /// Sets the throttle configuration.
    pub fn with_throttle(mut self, throttle: ThrottleConfig) -> Self {
        self.throttle = throttle;
        self
    }

    /// Sets the cache configuration.
    pub fn with_cache(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }

    /// Sets the retry configuration.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}

/// Builder for creating a [`Dispatcher`].
pub struct DispatcherBuilder {
    transport: Option<ArcTransport>,
    token_provider: Option<ArcTokenProvider>,
    fallback: FallbackResolver,
    config: DispatcherConfig,
}

impl DispatcherBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self {
            transport: None,
            token_provider: None,
            fallback: FallbackResolver::new(),
            config: DispatcherConfig::default(),
        }
    }

    /// Sets the transport.
    pub fn transport<T: Transport + 'static>(mut self, transport: T) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Sets a transport already wrapped in an `Arc`.
    pub fn arc_transport(mut self, transport: ArcTransport) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Sets the token provider.
    pub fn token_provider<P: TokenProvider + 'static>(mut self, provider: P) -> Self {
        self.token_provider = Some(Arc::new(provider));
        self
    }

    /// Sets a token provider already wrapped in an `Arc`.
    pub fn arc_token_provider(mut self, provider: ArcTokenProvider) -> Self {
        self.token_provider = Some(provider);
        self
    }

    /// Adds a fallback rule; earlier rules take precedence.
    pub fn fallback_rule(mut self, rule: FallbackRule) -> Self {
        self.fallback = self.fallback.with_rule(rule);
        self
    }

    /// Sets the configuration.
    pub fn with_config(mut self, config: DispatcherConfig) -> Self {
        self.config = config;
        self
    }

    /// Builds the dispatcher.
    pub fn build(self) -> Result<Dispatcher, ApiError> {
        let transport = self
            .transport
            .ok_or_else(|| ApiError::configuration("a transport is required"))?;

        Ok(Dispatcher {
            transport,
            token_provider: self.token_provider,
            breakers: CircuitBreakerRegistry::new(self.config.breaker.clone()),
            throttle: ThrottleGuard::new(self.config.throttle.clone()),
            cache: ResponseCache::new(self.config.cache.clone()),
            fallback: self.fallback,
            retry: self.config.retry,
        })
    }
}

impl Default for DispatcherBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Why a request is being resolved locally instead of sent out.
#[derive(Debug, Clone, Copy)]
enum ShedReason {
    CircuitOpen,
    Throttled,
}

/// Pre-flight outcome for one request, decided before any network I/O.
#[derive(Debug)]
enum Decision {
    /// The request may go out; `probe` marks a half-open trial.
    Proceed { probe: bool },
    /// Answer from the TTL cache.
    ServeCached { payload: Value, age: Duration },
    /// Answer from the throttle window's last observed payload.
    ServeLastKnown { payload: Value },
    /// Answer from the fallback resolver.
    ServeFallback { payload: Value, status: u16 },
    /// Fail without touching the network (mutating requests only).
    Reject(ApiError),
}

/// Orchestrates breaker, throttle, cache, retry, and fallback around a
/// single outgoing call.
///
/// All per-endpoint state is owned by the instance; two dispatchers share
/// nothing, which keeps tests and multi-backend clients independent.
///
/// # Example
///
/// ```rust,ignore
/// use faultgate::dispatcher::Dispatcher;
/// use faultgate::core::RequestDescriptor;
/// use faultgate::fallback::FallbackRule;
/// use faultgate::transport::HttpTransport;
///
/// let dispatcher = Dispatcher::builder()
///     .transport(HttpTransport::new("https://api.example.com")?)
///     .fallback_rule(FallbackRule::empty_list("/expenses"))
///     .build()?;
///
/// let response = dispatcher.dispatch(RequestDescriptor::get("/expenses")).await?;
/// if response.is_degraded() {
///     // render with a stale-data indicator
/// }
/// ```
pub struct Dispatcher {
    transport: ArcTransport,
    token_provider: Option<ArcTokenProvider>,
    breakers: CircuitBreakerRegistry,
    throttle: ThrottleGuard,
    cache: ResponseCache,
    fallback: FallbackResolver,
    retry: RetryConfig,
}

impl Dispatcher {
    /// Creates a new builder.
    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::new()
    }

    /// Dispatches a request with no deadline.
    pub async fn dispatch(&self, request: RequestDescriptor) -> Result<ApiResponse, DispatchError> {
        self.dispatch_with_deadline(request, None).await
    }

    /// Dispatches a request, capping total elapsed time at `deadline`.
    ///
    /// The deadline is cooperative: it is checked between retry attempts,
    /// never by interrupting an in-flight call.
    pub async fn dispatch_with_deadline(
        &self,
        mut request: RequestDescriptor,
        deadline: Option<Instant>,
    ) -> Result<ApiResponse, DispatchError> {
        let key = request.endpoint_key();
        let request_id = uuid::Uuid::new_v4();
        tracing::debug!(endpoint = %key, %request_id, "dispatching request");

        match self.preflight(&key) {
            Decision::Proceed { probe } => {
                if probe {
                    tracing::info!(endpoint = %key, %request_id, "probing endpoint after cooldown");
                }
            }
            Decision::ServeCached { payload, age } => {
                tracing::debug!(
                    endpoint = %key,
                    %request_id,
                    age_ms = age.as_millis() as u64,
                    "serving cached payload"
                );
                return Ok(ApiResponse::cached(payload, age, self.breakers.state_name(&key)));
            }
            Decision::ServeLastKnown { payload } => {
                tracing::debug!(endpoint = %key, %request_id, "serving last observed payload");
                return Ok(ApiResponse::last_known(payload, self.breakers.state_name(&key)));
            }
            Decision::ServeFallback { payload, status } => {
                tracing::warn!(endpoint = %key, %request_id, "serving fallback payload");
                return Ok(ApiResponse::from_fallback(
                    payload,
                    status,
                    self.breakers.state_name(&key),
                ));
            }
            Decision::Reject(error) => {
                tracing::warn!(endpoint = %key, %request_id, error = %error, "request rejected");
                return Err(self.normalize(error, &key, false));
            }
        }

        if let Some(provider) = &self.token_provider {
            if let Some(value) = provider.authorization() {
                request.headers.insert("Authorization".to_string(), value);
            }
        }

        let endpoint = key.to_string();
        let outcome = retry::execute(&self.retry, &endpoint, deadline, || {
            let transport = Arc::clone(&self.transport);
            let request = request.clone();
            async move { transport.send(&request).await }
        })
        .await;

        match outcome {
            Ok(response) => {
                self.breakers.record_success(&key);
                if !key.method.is_mutating() {
                    self.cache.put(&key, response.body.clone());
                    self.throttle.record_payload(&key, response.body.clone());
                }
                tracing::debug!(
                    endpoint = %key,
                    %request_id,
                    status = response.status,
                    "request succeeded"
                );
                Ok(ApiResponse::live(
                    response.body,
                    response.status,
                    self.breakers.state_name(&key),
                ))
            }
            Err(error) => self.recover(&key, request_id, error),
        }
    }

    /// Pre-flight gate: breaker first, then throttle; any short circuit is
    /// resolved to a local answer (or a rejection for mutating verbs).
    fn preflight(&self, key: &EndpointKey) -> Decision {
        let probe = match self.breakers.check(key) {
            BreakerGate::Allow => false,
            BreakerGate::Probe => true,
            BreakerGate::Blocked => {
                self.breakers.record_rejected(key);
                return self.shed(key, ShedReason::CircuitOpen);
            }
        };

        match self.throttle.admit(key) {
            Admission::Allow => Decision::Proceed { probe },
            Admission::Throttled => {
                if probe {
                    // The probe never went out; let the next request take it.
                    self.breakers.abort_probe(key);
                }
                tracing::warn!(endpoint = %key, "request throttled");
                self.shed(key, ShedReason::Throttled)
            }
        }
    }

    /// Resolves a shed request: cache, then (for throttled reads) the last
    /// observed payload, then fallback. Mutating requests are rejected
    /// outright; fabricating a success for a write would corrupt what the
    /// caller believes happened.
    fn shed(&self, key: &EndpointKey, reason: ShedReason) -> Decision {
        if key.method.is_mutating() {
            let error = match reason {
                ShedReason::CircuitOpen => ApiError::CircuitOpen {
                    endpoint: key.to_string(),
                    recovery_hint: Some("circuit may recover after cooldown".to_string()),
                },
                ShedReason::Throttled => ApiError::Throttled {
                    endpoint: key.to_string(),
                },
            };
            return Decision::Reject(error);
        }

        if let Some((payload, age)) = self.cache.get(key) {
            return Decision::ServeCached { payload, age };
        }

        if matches!(reason, ShedReason::Throttled) {
            if let Some(payload) = self.throttle.last_payload(key) {
                return Decision::ServeLastKnown { payload };
            }
        }

        let (payload, status) = self.fallback.resolve(&key.path);
        Decision::ServeFallback { payload, status }
    }

    /// Post-failure bookkeeping and, for reads, substitution.
    ///
    /// Exactly one breaker failure is recorded per logical dispatch,
    /// regardless of how many attempts the retry executor made.
    fn recover(
        &self,
        key: &EndpointKey,
        request_id: uuid::Uuid,
        error: ApiError,
    ) -> Result<ApiResponse, DispatchError> {
        if error.counts_toward_breaker() {
            self.breakers.record_failure(key);
        }

        if error.kind() == ErrorKind::Authentication {
            if let Some(provider) = &self.token_provider {
                tracing::warn!(
                    endpoint = %key,
                    %request_id,
                    "authentication failure, invalidating session"
                );
                provider.invalidate();
            }
        }

        // Health failures on reads are masked whenever a substitute exists;
        // everything else (and every write) surfaces the real error.
        if !key.method.is_mutating() && error.counts_toward_breaker() {
            if let Some((payload, age)) = self.cache.get(key) {
                tracing::warn!(
                    endpoint = %key,
                    %request_id,
                    error = %error,
                    age_ms = age.as_millis() as u64,
                    "request failed, serving cached payload"
                );
                return Ok(ApiResponse::cached(payload, age, self.breakers.state_name(key)));
            }

            let (payload, status) = self.fallback.resolve(&key.path);
            tracing::warn!(
                endpoint = %key,
                %request_id,
                error = %error,
                "request failed, serving fallback payload"
            );
            return Ok(ApiResponse::from_fallback(
                payload,
                status,
                self.breakers.state_name(key),
            ));
        }

        tracing::warn!(endpoint = %key, %request_id, error = %error, "request failed");
        Err(self.normalize(error, key, false))
    }

    fn normalize(&self, source: ApiError, key: &EndpointKey, fallback_attempted: bool) -> DispatchError {
        DispatchError {
            endpoint: key.to_string(),
            circuit_state: self.breakers.state_name(key).to_string(),
            fallback_attempted,
            source,
        }
    }

    /// Returns the breaker registry, for observability.
    pub fn breakers(&self) -> &CircuitBreakerRegistry {
        &self.breakers
    }

    /// Returns the response cache.
    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("transport", &self.transport)
            .field("retry", &self.retry)
            .finish()
    }
}
