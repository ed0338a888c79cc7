//! Route handlers for the gateway's business and service endpoints.
//!
//! Business handlers are deliberately thin: validate the request shape,
//! call the integration client, map the result. All resilience behavior is
//! inherited from the executor.

use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::GatewayError;
use crate::integrations::{BillingEvent, CompletionResponse, TokenResponse, UserProfile};
use crate::state::AppState;

/// OAuth callback exchange request.
#[derive(Debug, Deserialize)]
pub struct OAuthCallbackRequest {
    /// Authorization code from the provider redirect
    pub code: String,
    /// Redirect URI used in the authorization request
    pub redirect_uri: String,
}

/// Exchange an authorization code for tokens.
pub async fn oauth_callback(
    State(state): State<AppState>,
    Json(request): Json<OAuthCallbackRequest>,
) -> Result<Json<TokenResponse>, GatewayError> {
    let tokens = state
        .integrations
        .oauth
        .exchange_code(&request.code, &request.redirect_uri)
        .await?;
    Ok(Json(tokens))
}

/// Fetch the profile behind a bearer token.
pub async fn oauth_userinfo(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<UserProfile>, GatewayError> {
    let token = bearer_token(&headers)?;
    let profile = state.integrations.oauth.fetch_userinfo(token).await?;
    Ok(Json(profile))
}

fn bearer_token(headers: &HeaderMap) -> Result<&str, GatewayError> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .filter(|token| !token.is_empty())
        .ok_or_else(|| GatewayError::InvalidRequest("missing bearer token".to_string()))
}

/// AI review summary request.
#[derive(Debug, Deserialize)]
pub struct ReviewSummaryRequest {
    /// Raw review text to summarize
    pub review_text: String,
}

/// Summarize a performance review through the AI provider.
pub async fn ai_review_summary(
    State(state): State<AppState>,
    Json(request): Json<ReviewSummaryRequest>,
) -> Result<Json<CompletionResponse>, GatewayError> {
    if request.review_text.trim().is_empty() {
        return Err(GatewayError::InvalidRequest(
            "review_text must not be empty".to_string(),
        ));
    }
    let completion = state
        .integrations
        .ai
        .complete("talent-review-v1", &request.review_text, 512)
        .await?;
    Ok(Json(completion))
}

/// Delivery receipt for a forwarded billing event.
#[derive(Debug, Serialize)]
pub struct DeliveryReceipt {
    /// Id under which the event was delivered
    pub delivery_id: String,
}

/// Forward a billing event to the billing provider.
pub async fn billing_webhook(
    State(state): State<AppState>,
    Json(event): Json<BillingEvent>,
) -> Result<Json<DeliveryReceipt>, GatewayError> {
    let delivery_id = state.integrations.billing.deliver(&event).await?;
    Ok(Json(DeliveryReceipt { delivery_id }))
}

/// Liveness probe.
pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// Prometheus text exposition.
pub async fn metrics(State(state): State<AppState>) -> Response {
    match state.metrics.export() {
        Ok(body) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(err) => {
            tracing::error!(error = %err, "metrics encoding failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
