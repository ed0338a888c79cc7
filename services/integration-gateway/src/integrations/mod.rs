//! Per-provider integration clients.
//!
//! Clients are thin façades: they assemble a request (method, URL, headers,
//! body) and delegate to the resilient executor. They carry no retry or
//! breaker logic of their own, so every provider gets uniform behavior and
//! a single point of tuning.

pub mod ai;
pub mod billing;
pub mod oauth;

use std::sync::Arc;
use std::time::Duration;

use talent_resilience::{build_http_client, HttpConfig, IntegrationError, ResilientExecutor};

use crate::config::Config;

pub use ai::{AiClient, CompletionRequest, CompletionResponse};
pub use billing::{BillingEvent, BillingWebhookClient};
pub use oauth::{OAuthClient, TokenResponse, UserProfile};

/// All provider clients, built once at startup.
pub struct Integrations {
    /// OAuth provider client
    pub oauth: OAuthClient,
    /// Billing webhook delivery client
    pub billing: BillingWebhookClient,
    /// AI model call client
    pub ai: AiClient,
}

impl Integrations {
    /// Build every provider client from service configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the shared HTTP client cannot be constructed.
    pub fn new(config: &Config, executor: Arc<ResilientExecutor>) -> Result<Self, reqwest::Error> {
        let http = build_http_client(
            &HttpConfig::default().with_user_agent("talent-integration-gateway/0.1"),
        )?;

        Ok(Self {
            oauth: OAuthClient::new(
                http.clone(),
                Arc::clone(&executor),
                config.oauth_token_url.clone(),
                config.oauth_userinfo_url.clone(),
                config.oauth_client_id.clone(),
                config.oauth_client_secret.clone(),
            ),
            billing: BillingWebhookClient::new(
                http.clone(),
                Arc::clone(&executor),
                config.billing_webhook_url.clone(),
            ),
            ai: AiClient::new(
                http,
                executor,
                config.ai_service_url.clone(),
                Duration::from_secs(config.ai_call_timeout_secs),
            ),
        })
    }
}

/// Classify a response status and decode the JSON body on success.
///
/// The one place HTTP statuses map into the error taxonomy; 429 picks up
/// the upstream's Retry-After when present.
pub(crate) async fn read_json<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, IntegrationError> {
    check_status(&response)?;
    Ok(response.json::<T>().await?)
}

/// Classify a response status, discarding the body.
pub(crate) fn check_status(response: &reqwest::Response) -> Result<(), IntegrationError> {
    let status = response.status().as_u16();
    match IntegrationError::from_status(status) {
        Some(IntegrationError::UpstreamRateLimited { .. }) => {
            Err(IntegrationError::UpstreamRateLimited {
                retry_after: parse_retry_after(response.headers()),
            })
        }
        Some(err) => Err(err),
        None => Ok(()),
    }
}

fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<u64>().ok())
        .map(Duration::from_secs)
}
