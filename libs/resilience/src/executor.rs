//! Resilient call execution: circuit breaker around retry loop around a
//! single network call with its own cancellation boundary.
//!
//! Composition order matters. The breaker is consulted once per top-level
//! `execute`, never per retry attempt, and the composed retry-loop outcome
//! is what gets recorded — so a breaker-open rejection can never feed back
//! into the retry loop.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::backoff::RetryPolicy;
use crate::error::IntegrationError;
use crate::registry::BreakerRegistry;

/// Default per-call cancellation boundary.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Executes operations against external services with uniform resilience
/// behavior: breaker gate, backoff-driven retries, per-call timeout.
#[derive(Clone)]
pub struct ResilientExecutor {
    registry: Arc<BreakerRegistry>,
    retry: RetryPolicy,
    call_timeout: Duration,
}

impl ResilientExecutor {
    /// Create an executor over the given breaker registry with the default
    /// retry policy and call timeout.
    #[must_use]
    pub fn new(registry: Arc<BreakerRegistry>) -> Self {
        Self {
            registry,
            retry: RetryPolicy::with_defaults(),
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    /// Replace the default retry policy.
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Replace the per-call cancellation boundary.
    #[must_use]
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// The breaker registry this executor records into.
    #[must_use]
    pub fn registry(&self) -> &Arc<BreakerRegistry> {
        &self.registry
    }

    /// Execute an operation against the named service with the executor's
    /// default retry policy.
    ///
    /// # Errors
    ///
    /// Returns [`IntegrationError::BreakerOpen`] without invoking the
    /// operation when the service's circuit is open; otherwise propagates
    /// the retry loop's final outcome.
    pub async fn execute<F, Fut, T>(
        &self,
        service: &str,
        operation: F,
    ) -> Result<T, IntegrationError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, IntegrationError>>,
    {
        self.execute_with(service, &self.retry, operation).await
    }

    /// Execute an operation against the named service with an explicit
    /// retry policy, overriding the executor default.
    ///
    /// Each raw attempt is bounded by the executor's call timeout; an
    /// attempt exceeding it is aborted and classified as a retryable
    /// timeout. Retries of one call are strictly sequential.
    ///
    /// # Errors
    ///
    /// See [`ResilientExecutor::execute`].
    pub async fn execute_with<F, Fut, T>(
        &self,
        service: &str,
        policy: &RetryPolicy,
        mut operation: F,
    ) -> Result<T, IntegrationError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, IntegrationError>>,
    {
        let breaker = self.registry.get_or_create(service).await;

        if !breaker.allow_request().await {
            return Err(IntegrationError::BreakerOpen {
                service: service.to_string(),
                retry_after: breaker.retry_after().await,
            });
        }

        let call_timeout = self.call_timeout;
        let result = policy
            .execute(|| {
                let call = operation();
                async move {
                    match tokio::time::timeout(call_timeout, call).await {
                        Ok(outcome) => outcome,
                        Err(_) => Err(IntegrationError::Timeout {
                            duration: call_timeout,
                        }),
                    }
                }
            })
            .await;

        match &result {
            Ok(_) => breaker.record_success().await,
            Err(_) => breaker.record_failure().await,
        }

        result
    }
}
