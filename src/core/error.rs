//! Error types for the dispatch pipeline.
//!
//! Failures are classified into a small taxonomy that drives retry and
//! breaker policy: transport and server errors are service-health signals,
//! client errors are caller mistakes. The library never panics; all errors
//! are returned as `Result` values.

use std::fmt;
use thiserror::Error;

/// Broad classification of a request failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// No response was received (DNS, connect, timeout).
    Network,
    /// The server answered with a 5xx status.
    Server,
    /// The server rejected the request with a 4xx status other than 401/403.
    Validation,
    /// The session is missing or expired (401).
    Authentication,
    /// The caller lacks permission (403).
    Authorization,
    /// Anything that fits no other bucket.
    Unknown,
}

impl ErrorKind {
    /// Returns the canonical name of this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Network => "NETWORK",
            Self::Server => "SERVER",
            Self::Validation => "VALIDATION",
            Self::Authentication => "AUTHENTICATION",
            Self::Authorization => "AUTHORIZATION",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The main error type for request failures.
///
/// Variants carry the endpoint they relate to so that log lines and
/// normalized errors stay attributable without extra context.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// No usable response was received from the transport.
    #[error("no response from '{endpoint}': {message}")]
    Network {
        /// Endpoint the request was addressed to.
        endpoint: String,
        /// Transport-level description of the failure.
        message: String,
    },

    /// The server answered with a 5xx status.
    #[error("server error {status} from '{endpoint}'")]
    Server {
        /// Endpoint that failed.
        endpoint: String,
        /// The 5xx status code.
        status: u16,
    },

    /// The server rejected the request with a client-error status.
    #[error("request to '{endpoint}' rejected with status {status}")]
    Validation {
        /// Endpoint that rejected the request.
        endpoint: String,
        /// The 4xx status code.
        status: u16,
    },

    /// The session is missing or expired (401).
    #[error("authentication required for '{endpoint}'")]
    Authentication {
        /// Endpoint that demanded authentication.
        endpoint: String,
    },

    /// The caller lacks permission (403).
    #[error("access to '{endpoint}' denied")]
    Authorization {
        /// Endpoint that denied access.
        endpoint: String,
    },

    /// The circuit breaker is open for this endpoint.
    #[error("circuit open for '{endpoint}'")]
    CircuitOpen {
        /// Endpoint with the open circuit.
        endpoint: String,
        /// When the circuit might allow a probe, if known.
        recovery_hint: Option<String>,
    },

    /// The request was shed by the sliding-window throttle.
    #[error("request to '{endpoint}' throttled")]
    Throttled {
        /// Endpoint whose window is full.
        endpoint: String,
    },

    /// The caller-supplied deadline elapsed before a response arrived.
    #[error("deadline exceeded while calling '{endpoint}'")]
    DeadlineExceeded {
        /// Endpoint being called when the deadline passed.
        endpoint: String,
    },

    /// Dispatcher construction or configuration error.
    #[error("configuration error: {message}")]
    Configuration {
        /// Description of the configuration problem.
        message: String,
    },

    /// An unclassifiable failure.
    #[error("unexpected error from '{endpoint}': {message}")]
    Unknown {
        /// Endpoint involved, if any.
        endpoint: String,
        /// Description of what happened.
        message: String,
    },
}

impl ApiError {
    /// Returns the taxonomy bucket for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Network { .. } => ErrorKind::Network,
            Self::Server { .. } => ErrorKind::Server,
            Self::Validation { .. } => ErrorKind::Validation,
            Self::Authentication { .. } => ErrorKind::Authentication,
            Self::Authorization { .. } => ErrorKind::Authorization,
            Self::CircuitOpen { .. }
            | Self::Throttled { .. }
            | Self::DeadlineExceeded { .. }
            | Self::Configuration { .. }
            | Self::Unknown { .. } => ErrorKind::Unknown,
        }
    }

    /// Returns the HTTP status associated with this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Server { status, .. } | Self::Validation { status, .. } => Some(*status),
            Self::Authentication { .. } => Some(401),
            Self::Authorization { .. } => Some(403),
            _ => None,
        }
    }

    /// Returns the endpoint this error is attributed to, if any.
    pub fn endpoint(&self) -> Option<&str> {
        match self {
            Self::Network { endpoint, .. }
            | Self::Server { endpoint, .. }
            | Self::Validation { endpoint, .. }
            | Self::Authentication { endpoint }
            | Self::Authorization { endpoint }
            | Self::CircuitOpen { endpoint, .. }
            | Self::Throttled { endpoint }
            | Self::DeadlineExceeded { endpoint }
            | Self::Unknown { endpoint, .. } => Some(endpoint),
            Self::Configuration { .. } => None,
        }
    }

    /// Returns `true` if another attempt could plausibly succeed.
    ///
    /// Only transport failures and 5xx responses are retried; a client
    /// error will fail the same way every time.
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Network | ErrorKind::Server)
    }

    /// Returns `true` if this error signals service ill-health.
    ///
    /// Only these errors advance the circuit breaker; 4xx responses are
    /// caller mistakes or permission issues, not health signals.
    pub fn counts_toward_breaker(&self) -> bool {
        matches!(self.kind(), ErrorKind::Network | ErrorKind::Server)
    }

    /// Creates a `Network` error.
    pub fn network(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Network {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }

    /// Creates a `Configuration` error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Creates an `Unknown` error.
    pub fn unknown(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Unknown {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }

    /// Classifies a non-2xx HTTP status into the error taxonomy.
    pub fn from_status(endpoint: impl Into<String>, status: u16) -> Self {
        let endpoint = endpoint.into();
        match status {
            401 => Self::Authentication { endpoint },
            403 => Self::Authorization { endpoint },
            400..=499 => Self::Validation { endpoint, status },
            500..=599 => Self::Server { endpoint, status },
            _ => Self::Unknown {
                endpoint,
                message: format!("unexpected status {status}"),
            },
        }
    }
}

/// The normalized error surfaced by the dispatcher.
///
/// Carries everything upstream error handling needs to decide how to
/// present the failure: the classified cause, the endpoint, the breaker
/// state at the time, and whether substitute data was looked for.
#[derive(Debug, Clone, Error)]
#[error("{source} (breaker {circuit_state}, fallback attempted: {fallback_attempted})")]
pub struct DispatchError {
    /// The classified underlying failure.
    #[source]
    pub source: ApiError,
    /// Endpoint the dispatch was addressed to.
    pub endpoint: String,
    /// Breaker state name at the time the error surfaced.
    pub circuit_state: String,
    /// Whether cache/fallback substitution was attempted before erroring.
    ///
    /// Currently always `false`: reads with a substitute available are
    /// answered with that substitute instead of an error, and writes are
    /// never substituted. The field is reserved for configurations where
    /// fallback resolution itself can come up empty.
    pub fallback_attempted: bool,
}

impl DispatchError {
    /// Returns the taxonomy bucket of the underlying failure.
    pub fn kind(&self) -> ErrorKind {
        self.source.kind()
    }

    /// Returns the HTTP status of the underlying failure, if any.
    pub fn status(&self) -> Option<u16> {
        self.source.status()
    }
}

/// A specialized `Result` type for dispatch operations.
pub type DispatchResult<T> = Result<T, DispatchError>;
