//! Service error handling with stable codes and sanitized responses.
//!
//! Outbound integration failures surface to feature code as a generic
//! "integration unavailable" condition; the detailed classification stays
//! in logs. The rate limiter's own denial carries the full admission
//! decision so the response can emit quota headers.

use std::time::Duration;

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};
use uuid::Uuid;

use talent_resilience::{IntegrationError, RateLimitDecision};

use crate::gate::quota_headers;

/// Non-exhaustive service error enum.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum GatewayError {
    /// The request gate denied admission
    #[error("rate limit exceeded")]
    RateLimited {
        /// The full admission decision, for quota headers
        decision: RateLimitDecision,
    },

    /// An outbound integration call failed
    #[error(transparent)]
    Integration(#[from] IntegrationError),

    /// The request was malformed at the gateway boundary
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Internal error (details sanitized in responses)
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Error codes for API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Admission denied by the request gate
    RateLimited,
    /// Outbound integration unavailable
    IntegrationUnavailable,
    /// Malformed request
    InvalidRequest,
    /// Unclassified internal failure
    Internal,
}

impl ErrorCode {
    /// Get the string representation of the error code.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::RateLimited => "RATE_LIMITED",
            Self::IntegrationUnavailable => "INTEGRATION_UNAVAILABLE",
            Self::InvalidRequest => "INVALID_REQUEST",
            Self::Internal => "INTERNAL_ERROR",
        }
    }

    /// HTTP status for this code.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::IntegrationUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::InvalidRequest => StatusCode::BAD_REQUEST,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl GatewayError {
    /// Get the error code for this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::RateLimited { .. } => ErrorCode::RateLimited,
            Self::Integration(_) => ErrorCode::IntegrationUnavailable,
            Self::InvalidRequest(_) => ErrorCode::InvalidRequest,
            Self::Internal(_) => ErrorCode::Internal,
        }
    }
}

/// Structured error body with correlation id.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Stable error code for programmatic handling
    pub code: &'static str,
    /// Human-readable message (sanitized)
    pub message: String,
    /// Correlation id for tracing
    pub correlation_id: Uuid,
    /// Seconds to wait before retrying, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_secs: Option<u64>,
}

fn retry_after_secs(duration: Duration) -> u64 {
    // Round up so "wait 0s" is never emitted for a live window.
    duration.as_secs().max(1)
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let correlation_id = Uuid::new_v4();
        let code = self.code();

        match self {
            Self::RateLimited { decision } => {
                let retry_secs = decision.retry_after.map(retry_after_secs).unwrap_or(1);
                let body = ErrorBody {
                    code: code.as_str(),
                    message: "Rate limit exceeded".to_string(),
                    correlation_id,
                    retry_after_secs: Some(retry_secs),
                };
                let mut response = (code.status(), Json(body)).into_response();
                quota_headers(response.headers_mut(), &decision);
                response
                    .headers_mut()
                    .insert(header::RETRY_AFTER, HeaderValue::from(retry_secs));
                response
            }
            Self::Integration(err) => {
                warn!(
                    error = %err,
                    %correlation_id,
                    retryable = err.is_retryable(),
                    "outbound integration failed"
                );
                let retry_secs = err.retry_after().map(retry_after_secs);
                let body = ErrorBody {
                    code: code.as_str(),
                    message: "Integration temporarily unavailable".to_string(),
                    correlation_id,
                    retry_after_secs: retry_secs,
                };
                let mut response = (code.status(), Json(body)).into_response();
                if let Some(secs) = retry_secs {
                    response
                        .headers_mut()
                        .insert(header::RETRY_AFTER, HeaderValue::from(secs));
                }
                response
            }
            Self::InvalidRequest(reason) => {
                let body = ErrorBody {
                    code: code.as_str(),
                    message: reason,
                    correlation_id,
                    retry_after_secs: None,
                };
                (code.status(), Json(body)).into_response()
            }
            Self::Internal(err) => {
                error!(error = %err, %correlation_id, "internal error");
                let body = ErrorBody {
                    code: code.as_str(),
                    message: "Internal error".to_string(),
                    correlation_id,
                    retry_after_secs: None,
                };
                (code.status(), Json(body)).into_response()
            }
        }
    }
}
