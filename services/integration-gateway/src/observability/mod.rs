//! Observability: structured logging initialization and Prometheus metrics.

pub mod metrics;

pub use metrics::GatewayMetrics;

use tracing_subscriber::EnvFilter;

/// Initialize JSON structured logging with env-filter support.
///
/// Idempotent: a second call (e.g. from tests) is a no-op.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter)
        .try_init();
}
