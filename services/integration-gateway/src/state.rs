//! Shared application state: limiter, breaker registry, executor, clients.

use std::sync::Arc;
use std::time::Duration;

use talent_resilience::{
    BackoffConfig, BreakerRegistry, CircuitBreakerConfig, CounterStore, InMemoryCounterStore,
    RateLimiter, RedisCounterStore, ResilientExecutor, RetryPolicy,
};
use tracing::info;

use crate::config::Config;
use crate::integrations::Integrations;
use crate::observability::GatewayMetrics;

/// State shared by every handler and middleware layer.
#[derive(Clone)]
pub struct AppState {
    /// Inbound admission control
    pub limiter: Arc<RateLimiter>,
    /// Per-service circuit breakers
    pub registry: Arc<BreakerRegistry>,
    /// Outbound provider clients
    pub integrations: Arc<Integrations>,
    /// Prometheus metrics
    pub metrics: Arc<GatewayMetrics>,
}

impl AppState {
    /// Build the full state graph from configuration.
    ///
    /// Selects the counter store at construction time: Redis when a URL is
    /// configured, otherwise the in-process fallback.
    ///
    /// # Errors
    ///
    /// Returns an error if the counter store connection, metrics registry,
    /// or HTTP client construction fails.
    pub async fn from_config(config: &Config) -> anyhow::Result<Self> {
        let metrics = Arc::new(GatewayMetrics::new()?);

        let store: Arc<dyn CounterStore> = match &config.redis_url {
            Some(url) => {
                info!(store = "redis", "connecting shared counter store");
                Arc::new(RedisCounterStore::connect(url.as_str()).await?)
            }
            None => Arc::new(InMemoryCounterStore::new()),
        };

        let limiter =
            Arc::new(RateLimiter::new(store).with_fail_open(config.rate_limit_fail_open));

        let breaker_config = CircuitBreakerConfig {
            failure_threshold: config.breaker_failure_threshold,
            success_threshold: config.breaker_success_threshold,
            reset_timeout: Duration::from_secs(config.breaker_reset_timeout_secs),
        };
        let transition_metrics = Arc::clone(&metrics);
        let registry = Arc::new(BreakerRegistry::new(breaker_config).with_state_change_hook(
            Arc::new(move |name, from, to| {
                transition_metrics.record_breaker_transition(name, from.as_str(), to.as_str());
            }),
        ));

        let retry_metrics = Arc::clone(&metrics);
        let retry = RetryPolicy::new(BackoffConfig::standard()).with_on_retry(Arc::new(
            move |attempt, error| {
                retry_metrics.record_retry();
                tracing::warn!(attempt, error = %error, "retrying outbound call");
            },
        ));

        let executor = Arc::new(
            ResilientExecutor::new(Arc::clone(&registry))
                .with_retry_policy(retry)
                .with_call_timeout(Duration::from_secs(config.call_timeout_secs)),
        );

        let integrations = Arc::new(Integrations::new(config, executor)?);

        Ok(Self {
            limiter,
            registry,
            integrations,
            metrics,
        })
    }
}
