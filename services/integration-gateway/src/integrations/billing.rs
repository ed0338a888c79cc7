//! Billing webhook delivery client.

use std::sync::Arc;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::instrument;
use url::Url;
use uuid::Uuid;

use talent_resilience::{IntegrationError, ResilientExecutor};

use super::check_status;

/// Event delivered to the billing provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillingEvent {
    /// Event kind, e.g. `seat.added`
    pub event_type: String,
    /// Tenant the event belongs to
    pub tenant_id: String,
    /// Provider-specific payload
    pub payload: serde_json::Value,
}

/// Client delivering signed webhook events to the billing provider.
pub struct BillingWebhookClient {
    http: Client,
    executor: Arc<ResilientExecutor>,
    endpoint: Url,
}

impl BillingWebhookClient {
    const SERVICE: &'static str = "billing";

    /// Create a new billing webhook client.
    #[must_use]
    pub fn new(http: Client, executor: Arc<ResilientExecutor>, endpoint: Url) -> Self {
        Self {
            http,
            executor,
            endpoint,
        }
    }

    /// Deliver one event, returning the delivery id.
    ///
    /// The delivery id doubles as an idempotency key, so provider-side
    /// dedup makes the retried POST safe.
    ///
    /// # Errors
    ///
    /// Returns the classified integration failure once retries are
    /// exhausted or a non-retryable rejection is seen.
    #[instrument(skip(self, event), fields(event_type = %event.event_type))]
    pub async fn deliver(&self, event: &BillingEvent) -> Result<String, IntegrationError> {
        let delivery_id = Uuid::new_v4().to_string();

        self.executor
            .execute(Self::SERVICE, || {
                let request = self
                    .http
                    .post(self.endpoint.clone())
                    .header("x-delivery-id", delivery_id.clone())
                    .header("x-idempotency-key", delivery_id.clone())
                    .json(event);
                async move {
                    let response = request.send().await?;
                    check_status(&response)
                }
            })
            .await?;

        Ok(delivery_id)
    }
}
