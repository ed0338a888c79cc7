//! Operational endpoints: breaker introspection/recovery and rate-limit
//! overrides. These sit outside the request gate.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use talent_resilience::{BreakerStats, LimiterClass};

use crate::error::GatewayError;
use crate::state::AppState;

/// Breaker snapshot as returned by the admin API.
#[derive(Debug, Serialize)]
pub struct BreakerStatsBody {
    /// Guarded service name
    pub name: String,
    /// Current phase
    pub state: &'static str,
    /// Consecutive failures while closed
    pub consecutive_failures: u32,
    /// Consecutive successes while half-open
    pub consecutive_successes: u32,
    /// Seconds until an open circuit allows a probe
    #[serde(skip_serializing_if = "Option::is_none")]
    pub open_remaining_secs: Option<u64>,
}

impl From<BreakerStats> for BreakerStatsBody {
    fn from(stats: BreakerStats) -> Self {
        Self {
            name: stats.name,
            state: stats.state.as_str(),
            consecutive_failures: stats.consecutive_failures,
            consecutive_successes: stats.consecutive_successes,
            open_remaining_secs: stats.open_remaining.map(|d| d.as_secs()),
        }
    }
}

/// List every registered breaker.
pub async fn list_breakers(State(state): State<AppState>) -> Json<Vec<BreakerStatsBody>> {
    let stats = state.registry.all_stats().await;
    Json(stats.into_iter().map(BreakerStatsBody::from).collect())
}

/// Force one breaker closed.
pub async fn reset_breaker(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> StatusCode {
    if state.registry.reset(&name).await {
        tracing::info!(circuit = %name, "breaker reset via admin API");
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

/// Force every breaker closed.
pub async fn reset_all_breakers(State(state): State<AppState>) -> StatusCode {
    state.registry.reset_all().await;
    tracing::info!("all breakers reset via admin API");
    StatusCode::NO_CONTENT
}

/// Enumerate live rate-limit buckets.
pub async fn list_rate_limit_keys(
    State(state): State<AppState>,
) -> Result<Json<Vec<String>>, GatewayError> {
    let mut keys = state
        .limiter
        .active_keys()
        .await
        .map_err(anyhow::Error::new)?;
    keys.sort();
    Ok(Json(keys))
}

/// Force-clear one caller's window. Support/ops override only.
pub async fn reset_rate_limit(
    State(state): State<AppState>,
    Path((class, identifier)): Path<(String, String)>,
) -> Result<StatusCode, GatewayError> {
    let class: LimiterClass = class
        .parse()
        .map_err(GatewayError::InvalidRequest)?;

    state
        .limiter
        .reset(class, &identifier)
        .await
        .map_err(anyhow::Error::new)?;

    tracing::info!(
        class = class.as_str(),
        caller = %identifier,
        "rate-limit window cleared via admin API"
    );
    Ok(StatusCode::NO_CONTENT)
}
