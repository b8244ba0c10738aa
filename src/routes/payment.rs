//! Payment and webhook routes

use axum::{routing::post, Router};

use crate::handlers::payment;
use crate::state::AppState;

/// Create payment routes
pub fn payment_routes() -> Router<AppState> {
    Router::new()
        .route("/payment/gateway", post(payment::create_intent))
        .route("/payment/verify", post(payment::verify_payment))
}

/// Gateway callbacks; authenticated by signature, not by session
pub fn webhook_routes() -> Router<AppState> {
    Router::new().route("/webhooks/gateway", post(payment::gateway_webhook))
}
