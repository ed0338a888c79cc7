//! AI model call client.
//!
//! Model calls are slow and expensive to repeat, so this client runs on a
//! wider per-call boundary and the quick backoff preset.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::instrument;
use url::Url;

use talent_resilience::{BackoffConfig, IntegrationError, ResilientExecutor, RetryPolicy};

use super::read_json;

/// Completion request sent to the AI provider.
#[derive(Debug, Clone, Serialize)]
pub struct CompletionRequest {
    /// Model identifier
    pub model: String,
    /// Prompt text
    pub prompt: String,
    /// Output budget
    pub max_tokens: u32,
}

/// Completion response from the AI provider.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CompletionResponse {
    /// Generated text
    pub text: String,
    /// Model that served the request, when reported
    pub model: Option<String>,
}

/// Client for the platform's AI provider.
pub struct AiClient {
    http: Client,
    executor: ResilientExecutor,
    retry: RetryPolicy,
    base_url: Url,
}

impl AiClient {
    const SERVICE: &'static str = "ai";

    /// Create a new AI client with its own per-call boundary.
    #[must_use]
    pub fn new(
        http: Client,
        executor: Arc<ResilientExecutor>,
        base_url: Url,
        call_timeout: Duration,
    ) -> Self {
        Self {
            http,
            executor: executor.as_ref().clone().with_call_timeout(call_timeout),
            retry: RetryPolicy::new(BackoffConfig::quick()),
            base_url,
        }
    }

    /// Run one completion.
    ///
    /// # Errors
    ///
    /// Returns the classified integration failure.
    #[instrument(skip(self, prompt), fields(model = %model))]
    pub async fn complete(
        &self,
        model: &str,
        prompt: &str,
        max_tokens: u32,
    ) -> Result<CompletionResponse, IntegrationError> {
        let url = self
            .base_url
            .join("/v1/completions")
            .map_err(|e| IntegrationError::invalid_input(format!("bad AI endpoint: {e}")))?;

        let body = CompletionRequest {
            model: model.to_string(),
            prompt: prompt.to_string(),
            max_tokens,
        };

        self.executor
            .execute_with(Self::SERVICE, &self.retry, || {
                let request = self.http.post(url.clone()).json(&body);
                async move { read_json(request.send().await?).await }
            })
            .await
    }
}
