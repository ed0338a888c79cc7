//! Distributed sliding-window rate limiting keyed by caller identity.
//!
//! Counters live in a shared external store so that admission decisions are
//! coherent across horizontally scaled processes. The store increment is the
//! single atomic operation; everything else is derived metadata for quota
//! headers. Store failure fails open by default: availability of the product
//! outweighs strict quota enforcement during a store outage.

pub mod store;

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use store::{CounterStore, StoreError};

/// Admission classes, each with its own window ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LimiterClass {
    /// General API traffic
    Default,
    /// Mutating creation endpoints
    Create,
    /// Login/token endpoints
    Auth,
    /// AI model calls
    Ai,
    /// Bulk import/export jobs
    Bulk,
    /// Inbound webhook intake
    Webhook,
}

impl LimiterClass {
    /// Lowercase label used in store keys, logs, and admin routes.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Create => "create",
            Self::Auth => "auth",
            Self::Ai => "ai",
            Self::Bulk => "bulk",
            Self::Webhook => "webhook",
        }
    }

    /// Maximum admissions per window.
    #[must_use]
    pub const fn max_requests(&self) -> u32 {
        match self {
            Self::Default => 100,
            Self::Create => 30,
            Self::Auth => 10,
            Self::Ai => 20,
            Self::Bulk => 10,
            Self::Webhook => 120,
        }
    }

    /// Window duration.
    #[must_use]
    pub const fn window(&self) -> Duration {
        match self {
            Self::Default | Self::Create | Self::Auth | Self::Webhook => Duration::from_secs(60),
            Self::Ai | Self::Bulk => Duration::from_secs(3600),
        }
    }
}

impl FromStr for LimiterClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "default" => Ok(Self::Default),
            "create" => Ok(Self::Create),
            "auth" => Ok(Self::Auth),
            "ai" => Ok(Self::Ai),
            "bulk" => Ok(Self::Bulk),
            "webhook" => Ok(Self::Webhook),
            other => Err(format!("unknown limiter class: {other}")),
        }
    }
}

/// Raw caller attributes from which the admission key is resolved.
///
/// Resolution prefers organization over user over network address:
/// tenant-level fairness prevents one heavy user from exhausting a shared
/// tenant budget, and vice versa.
#[derive(Debug, Clone, Default)]
pub struct CallerIdentity {
    /// Tenant/organization id, when the caller is authenticated into one
    pub org_id: Option<String>,
    /// User id, when the caller is authenticated
    pub user_id: Option<String>,
    /// Raw `X-Forwarded-For` header value, when present
    pub forwarded_for: Option<String>,
    /// Direct peer address, when known
    pub peer_addr: Option<String>,
}

impl CallerIdentity {
    /// An unauthenticated caller with no known address.
    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Resolve the admission key, applying the priority chain.
    ///
    /// Keys are prefixed by scope (`org:`, `user:`, `ip:`) so the same raw
    /// value can never collide across scopes.
    #[must_use]
    pub fn resolve(&self) -> String {
        if let Some(org) = non_empty(&self.org_id) {
            return format!("org:{org}");
        }
        if let Some(user) = non_empty(&self.user_id) {
            return format!("user:{user}");
        }
        if let Some(forwarded) = non_empty(&self.forwarded_for) {
            // First hop in the chain is the original client.
            if let Some(first) = forwarded.split(',').next() {
                let first = first.trim();
                if !first.is_empty() {
                    return format!("ip:{first}");
                }
            }
        }
        if let Some(peer) = non_empty(&self.peer_addr) {
            return format!("ip:{peer}");
        }
        "ip:unknown".to_string()
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.trim().is_empty())
}

/// Outcome of an admission check, with enough metadata for quota headers
/// regardless of the allow/deny outcome.
#[derive(Debug, Clone)]
pub struct RateLimitDecision {
    /// Whether the request is admitted
    pub allowed: bool,
    /// The class ceiling
    pub limit: u32,
    /// Admissions remaining in the current window
    pub remaining: u32,
    /// When the current window expires
    pub reset_at: DateTime<Utc>,
    /// How long to wait before retrying; set only on deny
    pub retry_after: Option<Duration>,
}

/// Distributed rate limiter over a shared counter store.
pub struct RateLimiter {
    store: Arc<dyn CounterStore>,
    fail_open: bool,
}

impl RateLimiter {
    /// Create a limiter over the given store, failing open on store errors.
    #[must_use]
    pub fn new(store: Arc<dyn CounterStore>) -> Self {
        Self {
            store,
            fail_open: true,
        }
    }

    /// Tune the store-outage behavior. Fail-open trades quota strictness
    /// for availability; abuse-sensitive deployments may prefer fail-closed.
    #[must_use]
    pub fn with_fail_open(mut self, fail_open: bool) -> Self {
        self.fail_open = fail_open;
        self
    }

    fn bucket_key(class: LimiterClass, identifier: &str) -> String {
        format!("ratelimit:{}:{}", class.as_str(), identifier)
    }

    /// Check and consume one admission for the identifier under the class.
    ///
    /// Infallible by contract: a store failure is recovered locally
    /// according to the fail-open setting and never surfaces to callers.
    pub async fn admit(&self, class: LimiterClass, identifier: &str) -> RateLimitDecision {
        let limit = class.max_requests();
        let window = class.window();
        let key = Self::bucket_key(class, identifier);

        match self.store.incr_with_expiry(&key, window).await {
            Ok(snapshot) => {
                let reset_at = Utc::now()
                    + chrono::Duration::milliseconds(snapshot.ttl.as_millis() as i64);
                if snapshot.count <= u64::from(limit) {
                    let remaining = limit.saturating_sub(snapshot.count as u32);
                    RateLimitDecision {
                        allowed: true,
                        limit,
                        remaining,
                        reset_at,
                        retry_after: None,
                    }
                } else {
                    debug!(
                        class = class.as_str(),
                        caller = identifier,
                        count = snapshot.count,
                        "admission denied"
                    );
                    RateLimitDecision {
                        allowed: false,
                        limit,
                        remaining: 0,
                        reset_at,
                        retry_after: Some(snapshot.ttl),
                    }
                }
            }
            Err(err) => self.store_unavailable_decision(class, &err),
        }
    }

    fn store_unavailable_decision(
        &self,
        class: LimiterClass,
        err: &StoreError,
    ) -> RateLimitDecision {
        let limit = class.max_requests();
        let window = class.window();
        let reset_at = Utc::now() + chrono::Duration::milliseconds(window.as_millis() as i64);
        if self.fail_open {
            warn!(
                class = class.as_str(),
                error = %err,
                "counter store unavailable; failing open"
            );
            RateLimitDecision {
                allowed: true,
                limit,
                remaining: limit,
                reset_at,
                retry_after: None,
            }
        } else {
            warn!(
                class = class.as_str(),
                error = %err,
                "counter store unavailable; failing closed"
            );
            RateLimitDecision {
                allowed: false,
                limit,
                remaining: 0,
                reset_at,
                retry_after: Some(window),
            }
        }
    }

    /// Force-clear a caller's window. Operational override, implemented as
    /// a plain store delete: in-flight counters created after the delete
    /// are unaffected.
    ///
    /// # Errors
    ///
    /// Returns the underlying store error; this path does not fail open.
    pub async fn reset(&self, class: LimiterClass, identifier: &str) -> Result<(), StoreError> {
        self.store
            .delete(&Self::bucket_key(class, identifier))
            .await
    }

    /// Enumerate live bucket keys, for operational inspection.
    ///
    /// # Errors
    ///
    /// Returns the underlying store error.
    pub async fn active_keys(&self) -> Result<Vec<String>, StoreError> {
        self.store.keys("ratelimit:*").await
    }
}
