//! Gateway metrics: admissions, retries, and circuit breaker state.

use prometheus::{CounterVec, Encoder, GaugeVec, IntCounter, Opts, Registry, TextEncoder};

/// Prometheus metrics for the gateway.
pub struct GatewayMetrics {
    registry: Registry,
    /// Admission decisions by class and outcome
    pub admissions: CounterVec,
    /// Circuit breaker transitions by circuit and edge
    pub breaker_transitions: CounterVec,
    /// Current breaker state per circuit (0=closed, 1=open, 2=half-open)
    pub breaker_state: GaugeVec,
    /// Outbound retry attempts
    pub retries: IntCounter,
}

impl GatewayMetrics {
    /// Create and register all gateway metrics.
    ///
    /// # Errors
    ///
    /// Returns an error if a collector cannot be registered.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let admissions = CounterVec::new(
            Opts::new("admissions_total", "Admission decisions by class and outcome")
                .namespace("integration_gateway"),
            &["class", "outcome"],
        )?;
        registry.register(Box::new(admissions.clone()))?;

        let breaker_transitions = CounterVec::new(
            Opts::new(
                "circuit_breaker_state_changes_total",
                "Total circuit breaker state changes",
            )
            .namespace("integration_gateway"),
            &["circuit", "from_state", "to_state"],
        )?;
        registry.register(Box::new(breaker_transitions.clone()))?;

        let breaker_state = GaugeVec::new(
            Opts::new("circuit_breaker_state", "Current circuit breaker state")
                .namespace("integration_gateway"),
            &["circuit"],
        )?;
        registry.register(Box::new(breaker_state.clone()))?;

        let retries = IntCounter::with_opts(
            Opts::new("outbound_retries_total", "Total outbound retry attempts")
                .namespace("integration_gateway"),
        )?;
        registry.register(Box::new(retries.clone()))?;

        Ok(Self {
            registry,
            admissions,
            breaker_transitions,
            breaker_state,
            retries,
        })
    }

    /// Records an admission decision.
    pub fn record_admission(&self, class: &str, allowed: bool) {
        let outcome = if allowed { "allowed" } else { "denied" };
        self.admissions.with_label_values(&[class, outcome]).inc();
    }

    /// Records a circuit breaker state change.
    pub fn record_breaker_transition(&self, circuit: &str, from: &str, to: &str) {
        self.breaker_transitions
            .with_label_values(&[circuit, from, to])
            .inc();

        let state_value = match to {
            "closed" => 0.0,
            "open" => 1.0,
            "half_open" => 2.0,
            _ => -1.0,
        };
        self.breaker_state
            .with_label_values(&[circuit])
            .set(state_value);
    }

    /// Records an outbound retry attempt.
    pub fn record_retry(&self) {
        self.retries.inc();
    }

    /// Render all metrics in Prometheus text exposition format.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails.
    pub fn export(&self) -> Result<String, prometheus::Error> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer).unwrap_or_default())
    }
}
