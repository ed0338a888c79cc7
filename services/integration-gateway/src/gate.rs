//! Inbound request gate: admission control before business logic.
//!
//! The gate resolves the caller's identity, maps the route to a limiter
//! class, and consults the rate limiter. Every response carries quota
//! headers; denials short-circuit with a structured 429 before the handler
//! runs.

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::header::HeaderMap;
use axum::http::{HeaderValue, Method};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use talent_resilience::{CallerIdentity, LimiterClass, RateLimitDecision};

use crate::error::GatewayError;
use crate::state::AppState;

/// Map a route to its admission class.
///
/// Auth, AI, bulk, and webhook surfaces have dedicated ceilings; other
/// mutating requests fall into the creation class, and everything else is
/// general traffic.
#[must_use]
pub fn class_for_request(method: &Method, path: &str) -> LimiterClass {
    if path.starts_with("/auth") {
        LimiterClass::Auth
    } else if path.starts_with("/ai") {
        LimiterClass::Ai
    } else if path.starts_with("/bulk") || path.contains("/import") || path.contains("/export") {
        LimiterClass::Bulk
    } else if path.starts_with("/webhooks") {
        LimiterClass::Webhook
    } else if matches!(*method, Method::POST | Method::PUT | Method::PATCH) {
        LimiterClass::Create
    } else {
        LimiterClass::Default
    }
}

/// Build the caller identity from request headers and the peer address.
///
/// `x-org-id`/`x-user-id` are populated by the session layer upstream of
/// this service; the network-address fallback uses the forwarded-for chain
/// before the direct peer.
fn identity_from_request(headers: &HeaderMap, peer: Option<SocketAddr>) -> CallerIdentity {
    CallerIdentity {
        org_id: header_string(headers, "x-org-id"),
        user_id: header_string(headers, "x-user-id"),
        forwarded_for: header_string(headers, "x-forwarded-for"),
        peer_addr: peer.map(|addr| addr.ip().to_string()),
    }
}

fn header_string(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(ToString::to_string)
}

/// Write the standard quota headers onto a response.
pub fn quota_headers(headers: &mut HeaderMap, decision: &RateLimitDecision) {
    headers.insert("x-ratelimit-limit", HeaderValue::from(decision.limit));
    headers.insert(
        "x-ratelimit-remaining",
        HeaderValue::from(decision.remaining),
    );
    headers.insert(
        "x-ratelimit-reset",
        HeaderValue::from(decision.reset_at.timestamp()),
    );
}

/// Admission middleware applied to business routes.
pub async fn admission_middleware(
    State(state): State<AppState>,
    peer: Option<ConnectInfo<SocketAddr>>,
    request: Request,
    next: Next,
) -> Response {
    let identity = identity_from_request(request.headers(), peer.map(|info| info.0));
    let class = class_for_request(request.method(), request.uri().path());
    let caller = identity.resolve();

    let decision = state.limiter.admit(class, &caller).await;
    state.metrics.record_admission(class.as_str(), decision.allowed);

    if !decision.allowed {
        tracing::warn!(
            class = class.as_str(),
            caller = %caller,
            "request denied by rate limiter"
        );
        return GatewayError::RateLimited { decision }.into_response();
    }

    let mut response = next.run(request).await;
    quota_headers(response.headers_mut(), &decision);
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_classification() {
        assert_eq!(
            class_for_request(&Method::POST, "/auth/oauth/callback"),
            LimiterClass::Auth
        );
        assert_eq!(
            class_for_request(&Method::POST, "/ai/review-summary"),
            LimiterClass::Ai
        );
        assert_eq!(
            class_for_request(&Method::POST, "/bulk/candidates"),
            LimiterClass::Bulk
        );
        assert_eq!(
            class_for_request(&Method::POST, "/goals/import"),
            LimiterClass::Bulk
        );
        assert_eq!(
            class_for_request(&Method::POST, "/webhooks/billing"),
            LimiterClass::Webhook
        );
        assert_eq!(
            class_for_request(&Method::POST, "/goals"),
            LimiterClass::Create
        );
        assert_eq!(
            class_for_request(&Method::PUT, "/goals/7"),
            LimiterClass::Create
        );
        assert_eq!(
            class_for_request(&Method::GET, "/goals"),
            LimiterClass::Default
        );
    }

    #[test]
    fn test_identity_from_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("x-org-id", HeaderValue::from_static("acme"));
        headers.insert("x-user-id", HeaderValue::from_static("42"));

        let identity = identity_from_request(&headers, None);
        assert_eq!(identity.resolve(), "org:acme");
    }

    #[test]
    fn test_identity_falls_back_to_peer() {
        let headers = HeaderMap::new();
        let peer: SocketAddr = "10.1.2.3:55000".parse().unwrap();

        let identity = identity_from_request(&headers, Some(peer));
        assert_eq!(identity.resolve(), "ip:10.1.2.3");
    }

    #[test]
    fn test_quota_headers_written() {
        let decision = RateLimitDecision {
            allowed: true,
            limit: 100,
            remaining: 99,
            reset_at: chrono::Utc::now() + chrono::Duration::seconds(60),
            retry_after: None,
        };
        let mut headers = HeaderMap::new();
        quota_headers(&mut headers, &decision);

        assert_eq!(headers.get("x-ratelimit-limit").unwrap(), "100");
        assert_eq!(headers.get("x-ratelimit-remaining").unwrap(), "99");
        assert!(headers.contains_key("x-ratelimit-reset"));
    }
}
