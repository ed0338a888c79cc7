//! Shared resilience and traffic-shaping primitives for Talent Platform services.
//!
//! This crate provides centralized implementations for:
//! - Error types with retryability classification
//! - Exponential backoff retry policies with jitter
//! - Circuit breaker pattern with a per-service registry
//! - Resilient call execution (breaker + retry + per-call timeout)
//! - Distributed sliding-window rate limiting over a shared counter store
//! - HTTP client configuration and building

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod backoff;
pub mod circuit_breaker;
pub mod error;
pub mod executor;
pub mod http;
pub mod rate_limit;
pub mod registry;

pub use backoff::{BackoffConfig, RetryPolicy};
pub use circuit_breaker::{BreakerStats, CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use error::IntegrationError;
pub use executor::ResilientExecutor;
pub use http::{build_http_client, HttpConfig};
pub use rate_limit::store::{
    CounterSnapshot, CounterStore, InMemoryCounterStore, RedisCounterStore, StoreError,
};
pub use rate_limit::{CallerIdentity, LimiterClass, RateLimitDecision, RateLimiter};
pub use registry::BreakerRegistry;
