//! OAuth provider client: token exchange, refresh, and userinfo.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::instrument;
use url::Url;

use talent_resilience::{BackoffConfig, IntegrationError, ResilientExecutor, RetryPolicy};

use super::read_json;

/// Token endpoint response.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TokenResponse {
    /// The issued access token
    pub access_token: String,
    /// Token type, normally `Bearer`
    pub token_type: String,
    /// Lifetime in seconds, when the provider reports one
    pub expires_in: Option<u64>,
    /// Refresh token, when issued
    pub refresh_token: Option<String>,
    /// Granted scopes
    pub scope: Option<String>,
}

/// Userinfo endpoint response.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UserProfile {
    /// Subject identifier
    pub sub: String,
    /// Email address, when released
    pub email: Option<String>,
    /// Display name, when released
    pub name: Option<String>,
}

/// Client for the platform's OAuth provider.
pub struct OAuthClient {
    http: Client,
    executor: Arc<ResilientExecutor>,
    retry: RetryPolicy,
    token_url: Url,
    userinfo_url: Url,
    client_id: String,
    client_secret: String,
}

impl OAuthClient {
    const SERVICE: &'static str = "oauth";

    /// Create a new OAuth client.
    #[must_use]
    pub fn new(
        http: Client,
        executor: Arc<ResilientExecutor>,
        token_url: Url,
        userinfo_url: Url,
        client_id: String,
        client_secret: String,
    ) -> Self {
        Self {
            http,
            executor,
            retry: RetryPolicy::new(BackoffConfig::network()),
            token_url,
            userinfo_url,
            client_id,
            client_secret,
        }
    }

    fn basic_auth_header(&self) -> String {
        let credentials = format!("{}:{}", self.client_id, self.client_secret);
        format!("Basic {}", BASE64.encode(credentials))
    }

    /// Exchange an authorization code for tokens.
    ///
    /// # Errors
    ///
    /// Returns the classified integration failure; 4xx provider rejections
    /// (an expired or replayed code) propagate on the first attempt.
    #[instrument(skip(self, code))]
    pub async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<TokenResponse, IntegrationError> {
        self.executor
            .execute_with(Self::SERVICE, &self.retry, || {
                let request = self
                    .http
                    .post(self.token_url.clone())
                    .header(reqwest::header::AUTHORIZATION, self.basic_auth_header())
                    .form(&[
                        ("grant_type", "authorization_code"),
                        ("code", code),
                        ("redirect_uri", redirect_uri),
                    ]);
                async move { read_json(request.send().await?).await }
            })
            .await
    }

    /// Refresh an access token.
    ///
    /// # Errors
    ///
    /// Returns the classified integration failure.
    #[instrument(skip(self, refresh_token))]
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse, IntegrationError> {
        self.executor
            .execute_with(Self::SERVICE, &self.retry, || {
                let request = self
                    .http
                    .post(self.token_url.clone())
                    .header(reqwest::header::AUTHORIZATION, self.basic_auth_header())
                    .form(&[
                        ("grant_type", "refresh_token"),
                        ("refresh_token", refresh_token),
                    ]);
                async move { read_json(request.send().await?).await }
            })
            .await
    }

    /// Fetch the user profile for an access token.
    ///
    /// # Errors
    ///
    /// Returns the classified integration failure.
    #[instrument(skip(self, access_token))]
    pub async fn fetch_userinfo(&self, access_token: &str) -> Result<UserProfile, IntegrationError> {
        self.executor
            .execute_with(Self::SERVICE, &self.retry, || {
                let request = self
                    .http
                    .get(self.userinfo_url.clone())
                    .bearer_auth(access_token);
                async move { read_json(request.send().await?).await }
            })
            .await
    }
}
