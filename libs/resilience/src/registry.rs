//! Process-wide registry of circuit breakers, keyed by service name.
//!
//! The registry is an explicit component injected into callers, never
//! ambient global state. Breakers are created lazily on first lookup and
//! live for the life of the process; `reset`/`reset_all` exist as
//! operational escape hatches.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::circuit_breaker::{
    BreakerStats, CircuitBreaker, CircuitBreakerConfig, StateChangeHook,
};

/// Registry owning one [`CircuitBreaker`] per guarded service.
pub struct BreakerRegistry {
    default_config: CircuitBreakerConfig,
    on_state_change: Option<Arc<StateChangeHook>>,
    breakers: RwLock<HashMap<String, Arc<CircuitBreaker>>>,
}

impl BreakerRegistry {
    /// Create a registry whose breakers use the given configuration.
    #[must_use]
    pub fn new(default_config: CircuitBreakerConfig) -> Self {
        Self {
            default_config,
            on_state_change: None,
            breakers: RwLock::new(HashMap::new()),
        }
    }

    /// Create a registry with the standard breaker preset.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }

    /// Install a state-change hook propagated to every breaker this
    /// registry creates.
    #[must_use]
    pub fn with_state_change_hook(mut self, hook: Arc<StateChangeHook>) -> Self {
        self.on_state_change = Some(hook);
        self
    }

    /// Look up the breaker for a service, creating it on first use.
    pub async fn get_or_create(&self, name: &str) -> Arc<CircuitBreaker> {
        {
            let breakers = self.breakers.read().await;
            if let Some(breaker) = breakers.get(name) {
                return Arc::clone(breaker);
            }
        }

        let mut breakers = self.breakers.write().await;
        let breaker = breakers.entry(name.to_string()).or_insert_with(|| {
            let mut breaker = CircuitBreaker::new(name, self.default_config.clone());
            if let Some(hook) = &self.on_state_change {
                breaker = breaker.with_state_change_hook(Arc::clone(hook));
            }
            Arc::new(breaker)
        });
        Arc::clone(breaker)
    }

    /// Snapshot a single breaker, if it exists.
    pub async fn stats(&self, name: &str) -> Option<BreakerStats> {
        let breaker = {
            let breakers = self.breakers.read().await;
            breakers.get(name).map(Arc::clone)
        };
        match breaker {
            Some(breaker) => Some(breaker.stats().await),
            None => None,
        }
    }

    /// Snapshot every registered breaker.
    pub async fn all_stats(&self) -> Vec<BreakerStats> {
        let breakers: Vec<Arc<CircuitBreaker>> = {
            let map = self.breakers.read().await;
            map.values().map(Arc::clone).collect()
        };
        let mut stats = Vec::with_capacity(breakers.len());
        for breaker in breakers {
            stats.push(breaker.stats().await);
        }
        stats.sort_by(|a, b| a.name.cmp(&b.name));
        stats
    }

    /// Force a single breaker back to closed. Returns `false` if no breaker
    /// is registered under the name.
    pub async fn reset(&self, name: &str) -> bool {
        let breaker = {
            let breakers = self.breakers.read().await;
            breakers.get(name).map(Arc::clone)
        };
        match breaker {
            Some(breaker) => {
                breaker.reset().await;
                true
            }
            None => false,
        }
    }

    /// Force every registered breaker back to closed.
    pub async fn reset_all(&self) {
        let breakers: Vec<Arc<CircuitBreaker>> = {
            let map = self.breakers.read().await;
            map.values().map(Arc::clone).collect()
        };
        for breaker in breakers {
            breaker.reset().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::circuit_breaker::CircuitState;

    #[tokio::test]
    async fn test_get_or_create_reuses_instances() {
        let registry = BreakerRegistry::with_defaults();

        let first = registry.get_or_create("oauth").await;
        let second = registry.get_or_create("oauth").await;

        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn test_breakers_are_independent_per_service() {
        let config = CircuitBreakerConfig::default().with_failure_threshold(2);
        let registry = BreakerRegistry::new(config);

        let oauth = registry.get_or_create("oauth").await;
        let billing = registry.get_or_create("billing").await;

        oauth.record_failure().await;
        oauth.record_failure().await;

        assert_eq!(oauth.state().await, CircuitState::Open);
        assert_eq!(billing.state().await, CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_stats_and_reset() {
        let config = CircuitBreakerConfig {
            failure_threshold: 1,
            success_threshold: 1,
            reset_timeout: Duration::from_secs(30),
        };
        let registry = BreakerRegistry::new(config);

        registry.get_or_create("ai").await.record_failure().await;

        let stats = registry.stats("ai").await.unwrap();
        assert_eq!(stats.state, CircuitState::Open);
        assert!(registry.stats("unknown").await.is_none());

        assert!(registry.reset("ai").await);
        assert!(!registry.reset("unknown").await);
        assert_eq!(
            registry.stats("ai").await.unwrap().state,
            CircuitState::Closed
        );
    }

    #[tokio::test]
    async fn test_reset_all() {
        let config = CircuitBreakerConfig::default().with_failure_threshold(1);
        let registry = BreakerRegistry::new(config);

        registry.get_or_create("a").await.record_failure().await;
        registry.get_or_create("b").await.record_failure().await;

        registry.reset_all().await;

        for stats in registry.all_stats().await {
            assert_eq!(stats.state, CircuitState::Closed);
        }
    }

    #[tokio::test]
    async fn test_all_stats_sorted_by_name() {
        let registry = BreakerRegistry::with_defaults();
        registry.get_or_create("billing").await;
        registry.get_or_create("ai").await;
        registry.get_or_create("oauth").await;

        let names: Vec<String> = registry
            .all_stats()
            .await
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(names, vec!["ai", "billing", "oauth"]);
    }
}
