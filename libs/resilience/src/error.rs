//! Centralized error types for outbound integration calls.
//!
//! All errors are classified as either retryable or non-retryable, which
//! drives the retry policy and keeps classification out of the call sites.

use std::time::Duration;

use thiserror::Error;

/// Common error type for outbound integration calls.
#[derive(Error, Debug)]
pub enum IntegrationError {
    /// Circuit breaker rejected the call before any attempt was made.
    ///
    /// This is a local fast-fail, never retried: feeding it back into the
    /// retry loop would busy-loop against an open breaker.
    #[error("circuit breaker open for {service}")]
    BreakerOpen {
        /// The service name that has an open circuit
        service: String,
        /// Time remaining until the breaker allows a probe
        retry_after: Duration,
    },

    /// The call exceeded its cancellation boundary.
    #[error("call timed out after {duration:?}")]
    Timeout {
        /// The boundary that was exceeded
        duration: Duration,
    },

    /// Connection-level failure (refused, reset, DNS).
    #[error("network error: {0}")]
    Network(String),

    /// Upstream returned a 5xx response.
    #[error("upstream server error: HTTP {status}")]
    Server {
        /// The HTTP status code
        status: u16,
    },

    /// Upstream returned a 4xx response other than 429.
    #[error("upstream client error: HTTP {status}")]
    Client {
        /// The HTTP status code
        status: u16,
    },

    /// Upstream returned HTTP 429.
    ///
    /// Distinct from our own rate limiter's admission denial, which is
    /// returned to the original caller and never retried automatically.
    #[error("upstream rate limited")]
    UpstreamRateLimited {
        /// Upstream-provided Retry-After, when present
        retry_after: Option<Duration>,
    },

    /// Serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid input or malformed response body
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Internal error
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl IntegrationError {
    /// Check if this error is retryable.
    ///
    /// Retryable errors are transient failures that may succeed on retry:
    /// network errors, timeouts, 5xx responses, and upstream 429s. Everything
    /// else propagates on first occurrence.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. }
                | Self::Network(_)
                | Self::Server { .. }
                | Self::UpstreamRateLimited { .. }
        )
    }

    /// Get the suggested retry-after duration if applicable.
    #[must_use]
    pub const fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::BreakerOpen { retry_after, .. } => Some(*retry_after),
            Self::UpstreamRateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }

    /// Classify an HTTP status code, returning `None` for success statuses.
    #[must_use]
    pub fn from_status(status: u16) -> Option<Self> {
        match status {
            429 => Some(Self::UpstreamRateLimited { retry_after: None }),
            500..=599 => Some(Self::Server { status }),
            400..=499 => Some(Self::Client { status }),
            _ => None,
        }
    }

    /// Create a network error with the given message.
    #[must_use]
    pub fn network(msg: impl Into<String>) -> Self {
        Self::Network(msg.into())
    }

    /// Create an invalid input error with the given message.
    #[must_use]
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }
}

impl From<reqwest::Error> for IntegrationError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout {
                duration: Duration::from_secs(30),
            }
        } else if err.is_connect() {
            Self::Network(format!("connection failed: {err}"))
        } else if err.is_decode() {
            Self::InvalidInput(format!("malformed response body: {err}"))
        } else {
            Self::Network(err.to_string())
        }
    }
}
