//! Route definitions for Bazaar API

mod auth;
mod orders;
mod payment;

pub use auth::auth_routes;
pub use orders::order_routes;
pub use payment::{payment_routes, webhook_routes};

use axum::http::{HeaderValue, Method};
use axum::{middleware, routing::get, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::handlers::health;
use crate::middleware::{hsts_header, rate_limit, request_tracing, security_headers, RateLimiter};
use crate::state::AppState;

/// Build the full application router with its middleware stack
pub fn app(state: AppState) -> Router {
    let config = state.config.clone();
    let rate_limiter = RateLimiter::new(config.rate_limit_rps);

    let api = Router::new()
        .merge(auth_routes())
        .merge(order_routes())
        .merge(payment_routes())
        .merge(webhook_routes());

    let mut router = Router::new()
        .route("/health", get(health::health_check))
        .nest("/api", api)
        .with_state(state)
        .layer(middleware::from_fn(security_headers));

    if config.environment.is_production() {
        router = router.layer(middleware::from_fn(hsts_header));
    }

    // Each layer wraps the previous one; CORS ends up outermost
    router
        .layer(middleware::from_fn_with_state(rate_limiter, rate_limit))
        .layer(middleware::from_fn(request_tracing))
        .layer(TraceLayer::new_for_http())
        .layer(configure_cors(&config))
}

fn configure_cors(config: &Config) -> CorsLayer {
    let allowed = config
        .cors_allowed_origins
        .as_deref()
        .map(str::trim)
        .unwrap_or_default();

    if allowed.is_empty() {
        if config.environment.is_production() {
            tracing::warn!("CORS_ALLOWED_ORIGINS not set in production, cross-origin requests are refused");
            return CorsLayer::new();
        }
        tracing::warn!("CORS_ALLOWED_ORIGINS not set, allowing all origins (permissive)");
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = allowed
        .split(',')
        .filter_map(|s| s.trim().parse().ok())
        .collect();

    // Session cookies need credentials, which rules out wildcard headers.
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::AUTHORIZATION,
        ])
        .allow_credentials(true)
}
