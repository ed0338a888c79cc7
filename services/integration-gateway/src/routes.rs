//! Router assembly.
//!
//! Business routes sit behind the admission gate; health, metrics, and
//! admin endpoints bypass it. Trace and timeout layers wrap everything.

use std::time::Duration;

use axum::routing::{delete, get, post};
use axum::{middleware, Router};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;
use crate::{admin, gate, handlers};

/// Build the full service router.
#[must_use]
pub fn build_router(state: AppState, request_timeout: Duration) -> Router {
    let business = Router::new()
        .route("/auth/oauth/callback", post(handlers::oauth_callback))
        .route("/auth/oauth/userinfo", get(handlers::oauth_userinfo))
        .route("/ai/review-summary", post(handlers::ai_review_summary))
        .route("/webhooks/billing", post(handlers::billing_webhook))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            gate::admission_middleware,
        ));

    let admin = Router::new()
        .route("/admin/breakers", get(admin::list_breakers))
        .route("/admin/breakers/reset", post(admin::reset_all_breakers))
        .route("/admin/breakers/:name/reset", post(admin::reset_breaker))
        .route("/admin/rate-limits", get(admin::list_rate_limit_keys))
        .route(
            "/admin/rate-limits/:class/:identifier",
            delete(admin::reset_rate_limit),
        );

    Router::new()
        .merge(business)
        .merge(admin)
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
        .layer(TimeoutLayer::new(request_timeout))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
