//! Circuit breaker implementation for protecting external services.
//!
//! Implements the circuit breaker pattern with three states:
//! - Closed: normal operation, requests are allowed
//! - Open: failure threshold exceeded, requests are rejected until the
//!   reset timeout elapses
//! - Half-Open: testing recovery; every call in this phase counts toward
//!   probation
//!
//! The whole state record is guarded by a single lock, so each phase
//! transition is atomic relative to one read-then-write. Approximate
//! counting across concurrent callers of the same breaker is tolerated; the
//! breaker only needs to trend toward open/closed correctly.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use tracing::{info, warn};

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Circuit is closed, requests are allowed
    Closed,
    /// Circuit is open, requests are rejected
    Open,
    /// Circuit is half-open, probe requests are allowed to test recovery
    HalfOpen,
}

impl CircuitState {
    /// Lowercase label for logs, metrics, and admin responses.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        }
    }
}

/// Observability hook fired on every phase transition.
///
/// Receives the breaker name and the from/to states. Hooks are best-effort:
/// a panicking hook is caught and discarded, never allowed to affect breaker
/// correctness.
pub type StateChangeHook = dyn Fn(&str, CircuitState, CircuitState) + Send + Sync;

/// Circuit breaker configuration.
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before opening the circuit
    pub failure_threshold: u32,
    /// Consecutive successes in half-open state to close the circuit
    pub success_threshold: u32,
    /// Time to wait before allowing a probe through an open circuit
    pub reset_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self::standard()
    }
}

impl CircuitBreakerConfig {
    /// Preset for fast-recovering dependencies: 3 failures / 1 success / 10s.
    #[must_use]
    pub const fn quick() -> Self {
        Self {
            failure_threshold: 3,
            success_threshold: 1,
            reset_timeout: Duration::from_secs(10),
        }
    }

    /// Standard preset: 5 failures / 2 successes / 30s.
    #[must_use]
    pub const fn standard() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            reset_timeout: Duration::from_secs(30),
        }
    }

    /// Preset for dependencies where flapping is expensive: 10 / 3 / 60s.
    #[must_use]
    pub const fn conservative() -> Self {
        Self {
            failure_threshold: 10,
            success_threshold: 3,
            reset_timeout: Duration::from_secs(60),
        }
    }

    /// Create a new config with custom failure threshold.
    #[must_use]
    pub const fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    /// Create a new config with custom success threshold.
    #[must_use]
    pub const fn with_success_threshold(mut self, threshold: u32) -> Self {
        self.success_threshold = threshold;
        self
    }

    /// Create a new config with custom reset timeout.
    #[must_use]
    pub const fn with_reset_timeout(mut self, timeout: Duration) -> Self {
        self.reset_timeout = timeout;
        self
    }
}

/// Point-in-time snapshot of a breaker for introspection.
#[derive(Debug, Clone)]
pub struct BreakerStats {
    /// The guarded service name
    pub name: String,
    /// Current phase
    pub state: CircuitState,
    /// Consecutive failures observed while closed
    pub consecutive_failures: u32,
    /// Consecutive successes observed while half-open
    pub consecutive_successes: u32,
    /// Time remaining until an open circuit allows a probe
    pub open_remaining: Option<Duration>,
}

#[derive(Debug)]
struct BreakerState {
    phase: CircuitState,
    consecutive_failures: u32,
    consecutive_successes: u32,
    open_until: Option<Instant>,
}

impl BreakerState {
    const fn new() -> Self {
        Self {
            phase: CircuitState::Closed,
            consecutive_failures: 0,
            consecutive_successes: 0,
            open_until: None,
        }
    }
}

/// Circuit breaker for a single guarded service.
///
/// Each guarded service gets its own instance, looked up by name from a
/// [`crate::BreakerRegistry`].
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    state: RwLock<BreakerState>,
    on_state_change: Option<Arc<StateChangeHook>>,
}

impl CircuitBreaker {
    /// Create a new circuit breaker for the named service.
    #[must_use]
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            state: RwLock::new(BreakerState::new()),
            on_state_change: None,
        }
    }

    /// Install a state-change hook fired on every phase transition.
    #[must_use]
    pub fn with_state_change_hook(mut self, hook: Arc<StateChangeHook>) -> Self {
        self.on_state_change = Some(hook);
        self
    }

    /// Returns the breaker name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Check if a request is allowed.
    ///
    /// Returns `true` if the request should proceed. An open circuit whose
    /// reset timeout has elapsed transitions to half-open and lets the call
    /// through as a probe.
    pub async fn allow_request(&self) -> bool {
        let mut state = self.state.write().await;
        match state.phase {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let expired = state
                    .open_until
                    .map_or(true, |until| Instant::now() >= until);
                if expired {
                    self.transition(&mut state, CircuitState::HalfOpen);
                    state.consecutive_successes = 0;
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Record a successful request.
    pub async fn record_success(&self) {
        let mut state = self.state.write().await;
        match state.phase {
            CircuitState::Closed => {
                state.consecutive_failures = 0;
            }
            CircuitState::HalfOpen => {
                state.consecutive_failures = 0;
                state.consecutive_successes += 1;
                if state.consecutive_successes >= self.config.success_threshold {
                    self.transition(&mut state, CircuitState::Closed);
                    state.consecutive_successes = 0;
                    state.open_until = None;
                    info!(circuit = %self.name, "circuit closed after recovery");
                }
            }
            CircuitState::Open => {}
        }
    }

    /// Record a failed request.
    pub async fn record_failure(&self) {
        let mut state = self.state.write().await;
        match state.phase {
            CircuitState::Closed => {
                state.consecutive_successes = 0;
                state.consecutive_failures += 1;
                if state.consecutive_failures >= self.config.failure_threshold {
                    self.transition(&mut state, CircuitState::Open);
                    state.open_until = Some(Instant::now() + self.config.reset_timeout);
                    warn!(
                        circuit = %self.name,
                        failures = state.consecutive_failures,
                        "circuit opened"
                    );
                }
            }
            CircuitState::HalfOpen => {
                // One probe failure re-opens immediately with a fresh timeout.
                self.transition(&mut state, CircuitState::Open);
                state.consecutive_failures = 0;
                state.consecutive_successes = 0;
                state.open_until = Some(Instant::now() + self.config.reset_timeout);
                warn!(circuit = %self.name, "circuit re-opened from half-open");
            }
            CircuitState::Open => {}
        }
    }

    /// Get the current circuit state.
    pub async fn state(&self) -> CircuitState {
        self.state.read().await.phase
    }

    /// Time remaining until an open circuit allows a probe.
    ///
    /// Returns zero when the circuit is not open.
    pub async fn retry_after(&self) -> Duration {
        let state = self.state.read().await;
        match (state.phase, state.open_until) {
            (CircuitState::Open, Some(until)) => until.saturating_duration_since(Instant::now()),
            _ => Duration::ZERO,
        }
    }

    /// Snapshot the breaker for introspection.
    pub async fn stats(&self) -> BreakerStats {
        let state = self.state.read().await;
        let open_remaining = match (state.phase, state.open_until) {
            (CircuitState::Open, Some(until)) => {
                Some(until.saturating_duration_since(Instant::now()))
            }
            _ => None,
        };
        BreakerStats {
            name: self.name.clone(),
            state: state.phase,
            consecutive_failures: state.consecutive_failures,
            consecutive_successes: state.consecutive_successes,
            open_remaining,
        }
    }

    /// Force the breaker back to closed state. Operational escape hatch.
    pub async fn reset(&self) {
        let mut state = self.state.write().await;
        self.transition(&mut state, CircuitState::Closed);
        state.consecutive_failures = 0;
        state.consecutive_successes = 0;
        state.open_until = None;
    }

    /// Apply a phase transition and fire the state-change hook.
    ///
    /// Must be called with the state write lock held so the read-then-write
    /// is atomic.
    fn transition(&self, state: &mut BreakerState, to: CircuitState) {
        let from = state.phase;
        if from == to {
            return;
        }
        state.phase = to;
        if let Some(hook) = &self.on_state_change {
            let guarded = catch_unwind(AssertUnwindSafe(|| hook(&self.name, from, to)));
            if guarded.is_err() {
                tracing::debug!(circuit = %self.name, "state-change hook panicked; ignoring");
            }
        }
    }
}
