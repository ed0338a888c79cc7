//! Retry policy implementation with exponential backoff and jitter.
//!
//! Delays grow as `base_delay * multiplier^attempt`, capped at `max_delay`,
//! then perturbed by a symmetric jitter band to desynchronize concurrent
//! retries across callers.

use std::fmt;
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;

use crate::error::IntegrationError;

/// Pluggable retryability classification.
pub type RetryPredicate = dyn Fn(&IntegrationError) -> bool + Send + Sync;

/// Observability hook fired before each backoff wait.
///
/// Receives the 1-based number of the attempt about to run and the error
/// that triggered the retry. Hooks are best-effort: a panicking hook is
/// caught and discarded, never allowed to alter control flow.
pub type RetryHook = dyn Fn(u32, &IntegrationError) + Send + Sync;

/// Backoff configuration.
#[derive(Debug, Clone)]
pub struct BackoffConfig {
    /// Maximum number of retry attempts (total tries = `max_retries + 1`)
    pub max_retries: u32,
    /// Initial delay between attempts
    pub base_delay: Duration,
    /// Maximum delay between attempts
    pub max_delay: Duration,
    /// Multiplier for exponential growth
    pub multiplier: f64,
    /// Width of the jitter band as a fraction of the capped delay.
    ///
    /// The delay is perturbed uniformly by ± `delay * jitter_fraction / 2`.
    /// Zero disables jitter.
    pub jitter_fraction: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(10_000),
            multiplier: 2.0,
            jitter_fraction: 0.2,
        }
    }
}

impl BackoffConfig {
    /// Preset for latency-sensitive paths: 2 retries, 500ms..2s.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_millis(2000),
            ..Self::default()
        }
    }

    /// Standard preset: 3 retries, 1s..10s. Same as [`Default`].
    #[must_use]
    pub fn standard() -> Self {
        Self::default()
    }

    /// Preset for batch-style work that can afford long waits: 5 retries, 2s..30s.
    #[must_use]
    pub fn aggressive() -> Self {
        Self {
            max_retries: 5,
            base_delay: Duration::from_millis(2000),
            max_delay: Duration::from_millis(30_000),
            ..Self::default()
        }
    }

    /// Preset tuned for flaky network hops: 3 retries, 1s..8s, default
    /// retryable-error classification.
    #[must_use]
    pub fn network() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(8000),
            ..Self::default()
        }
    }

    /// Create a new config with custom max retries.
    #[must_use]
    pub const fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Create a new config with custom base delay.
    #[must_use]
    pub const fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Create a new config with custom max delay.
    #[must_use]
    pub const fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Create a new config without jitter.
    #[must_use]
    pub const fn without_jitter(mut self) -> Self {
        self.jitter_fraction = 0.0;
        self
    }
}

/// Retry policy for executing operations with automatic retries.
#[derive(Clone)]
pub struct RetryPolicy {
    config: BackoffConfig,
    classify: Option<Arc<RetryPredicate>>,
    on_retry: Option<Arc<RetryHook>>,
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl RetryPolicy {
    /// Create a new retry policy with the given configuration.
    #[must_use]
    pub const fn new(config: BackoffConfig) -> Self {
        Self {
            config,
            classify: None,
            on_retry: None,
        }
    }

    /// Create a retry policy with default configuration.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(BackoffConfig::default())
    }

    /// Replace the default retryability classification.
    #[must_use]
    pub fn with_classifier(mut self, classify: Arc<RetryPredicate>) -> Self {
        self.classify = Some(classify);
        self
    }

    /// Install an observability hook fired before each backoff wait.
    #[must_use]
    pub fn with_on_retry(mut self, hook: Arc<RetryHook>) -> Self {
        self.on_retry = Some(hook);
        self
    }

    /// Calculate the delay for a given 0-based attempt number.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base_ms = self.config.base_delay.as_millis() as f64;
        let max_ms = self.config.max_delay.as_millis() as f64;
        let capped = (base_ms * self.config.multiplier.powi(attempt as i32)).min(max_ms);

        let delay_ms = if self.config.jitter_fraction > 0.0 {
            let half_band = capped * self.config.jitter_fraction / 2.0;
            capped + rand::thread_rng().gen_range(-half_band..=half_band)
        } else {
            capped
        };

        Duration::from_millis(delay_ms.max(0.0) as u64)
    }

    /// Check if an error should be retried.
    #[must_use]
    pub fn should_retry(&self, error: &IntegrationError) -> bool {
        match &self.classify {
            Some(classify) => classify(error),
            None => error.is_retryable(),
        }
    }

    /// Get the maximum number of retries.
    #[must_use]
    pub const fn max_retries(&self) -> u32 {
        self.config.max_retries
    }

    /// Execute an async operation with retries.
    ///
    /// Attempts run `0..=max_retries`. A non-retryable classification
    /// propagates on first occurrence; the final attempt's failure
    /// propagates regardless of retryability. Waits between attempts are
    /// cooperative (`tokio::time::sleep`), so concurrent operations are not
    /// blocked. Retries of one call are strictly sequential.
    ///
    /// # Errors
    ///
    /// Returns the last observed error once retries are exhausted or a
    /// non-retryable error is seen.
    pub async fn execute<F, Fut, T>(&self, mut operation: F) -> Result<T, IntegrationError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, IntegrationError>>,
    {
        let mut attempt = 0u32;
        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(error) => {
                    if attempt >= self.config.max_retries || !self.should_retry(&error) {
                        return Err(error);
                    }
                    let delay = self.delay_for_attempt(attempt);
                    self.fire_on_retry(attempt + 1, &error);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    fn fire_on_retry(&self, attempt: u32, error: &IntegrationError) {
        if let Some(hook) = &self.on_retry {
            let guarded = catch_unwind(AssertUnwindSafe(|| hook(attempt, error)));
            if guarded.is_err() {
                tracing::debug!(attempt, "retry hook panicked; ignoring");
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    use super::*;

    fn fast_config() -> BackoffConfig {
        BackoffConfig::default()
            .with_base_delay(Duration::from_millis(1))
            .with_max_delay(Duration::from_millis(5))
    }

    #[test]
    fn test_default_config() {
        let config = BackoffConfig::default();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.base_delay, Duration::from_millis(1000));
        assert_eq!(config.max_delay, Duration::from_millis(10_000));
        assert_eq!(config.multiplier, 2.0);
        assert_eq!(config.jitter_fraction, 0.2);
    }

    #[test]
    fn test_presets() {
        let quick = BackoffConfig::quick();
        assert_eq!(quick.max_retries, 2);
        assert_eq!(quick.base_delay, Duration::from_millis(500));
        assert_eq!(quick.max_delay, Duration::from_millis(2000));

        let aggressive = BackoffConfig::aggressive();
        assert_eq!(aggressive.max_retries, 5);
        assert_eq!(aggressive.max_delay, Duration::from_millis(30_000));

        let network = BackoffConfig::network();
        assert_eq!(network.max_retries, 3);
        assert_eq!(network.max_delay, Duration::from_millis(8000));
    }

    #[test]
    fn test_delay_growth_without_jitter() {
        let policy = RetryPolicy::new(BackoffConfig::default().without_jitter());

        assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(1000));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(2000));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(4000));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(8000));
        // Capped at max_delay from here on.
        assert_eq!(policy.delay_for_attempt(4), Duration::from_millis(10_000));
        assert_eq!(policy.delay_for_attempt(10), Duration::from_millis(10_000));
    }

    #[test]
    fn test_jitter_stays_within_band() {
        let policy = RetryPolicy::with_defaults();

        for attempt in 0..6 {
            let capped = (1000.0 * 2.0f64.powi(attempt)).min(10_000.0);
            let lower = capped * 0.9;
            let upper = capped * 1.1;
            for _ in 0..50 {
                let delay = policy.delay_for_attempt(attempt as u32).as_millis() as f64;
                assert!(
                    delay >= lower - 1.0 && delay <= upper + 1.0,
                    "attempt {attempt}: delay {delay} outside [{lower}, {upper}]"
                );
            }
        }
    }

    #[tokio::test]
    async fn test_execute_success_first_try() {
        let policy = RetryPolicy::new(fast_config());
        let attempts = AtomicU32::new(0);

        let result = policy
            .execute(|| {
                attempts.fetch_add(1, Ordering::SeqCst);
                async { Ok(42) }
            })
            .await;

        assert_eq!(result.ok(), Some(42));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_execute_retries_then_succeeds() {
        let policy = RetryPolicy::new(fast_config());
        let attempts = AtomicU32::new(0);

        let result = policy
            .execute(|| {
                let n = attempts.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(IntegrationError::Server { status: 503 })
                    } else {
                        Ok("recovered")
                    }
                }
            })
            .await;

        assert_eq!(result.ok(), Some("recovered"));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_execute_exhausts_retries() {
        let policy = RetryPolicy::new(fast_config().with_max_retries(2));
        let attempts = AtomicU32::new(0);

        let result: Result<(), _> = policy
            .execute(|| {
                attempts.fetch_add(1, Ordering::SeqCst);
                async { Err(IntegrationError::network("connection reset")) }
            })
            .await;

        assert!(result.is_err());
        // max_retries + 1 total tries
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_retryable_yields_single_attempt() {
        let policy = RetryPolicy::new(fast_config());
        let attempts = AtomicU32::new(0);

        let result: Result<(), _> = policy
            .execute(|| {
                attempts.fetch_add(1, Ordering::SeqCst);
                async { Err(IntegrationError::Client { status: 422 }) }
            })
            .await;

        assert!(matches!(
            result,
            Err(IntegrationError::Client { status: 422 })
        ));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_custom_classifier_overrides_default() {
        // Treat everything as non-retryable.
        let policy = RetryPolicy::new(fast_config()).with_classifier(Arc::new(|_| false));
        let attempts = AtomicU32::new(0);

        let result: Result<(), _> = policy
            .execute(|| {
                attempts.fetch_add(1, Ordering::SeqCst);
                async { Err(IntegrationError::Server { status: 500 }) }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_on_retry_hook_observes_attempts() {
        let seen: Arc<Mutex<Vec<u32>>> = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);

        let policy = RetryPolicy::new(fast_config()).with_on_retry(Arc::new(move |attempt, _| {
            if let Ok(mut log) = seen_clone.lock() {
                log.push(attempt);
            }
        }));

        let attempts = AtomicU32::new(0);
        let result = policy
            .execute(|| {
                let n = attempts.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(IntegrationError::Server { status: 502 })
                    } else {
                        Ok(())
                    }
                }
            })
            .await;

        assert!(result.is_ok());
        assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_panicking_hook_does_not_alter_outcome() {
        let policy = RetryPolicy::new(fast_config())
            .with_on_retry(Arc::new(|_, _| panic!("hook blew up")));

        let attempts = AtomicU32::new(0);
        let result = policy
            .execute(|| {
                let n = attempts.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        Err(IntegrationError::Server { status: 500 })
                    } else {
                        Ok("fine")
                    }
                }
            })
            .await;

        assert_eq!(result.ok(), Some("fine"));
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }
}
