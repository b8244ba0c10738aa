//! Health check handler

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use std::sync::Arc;

use crate::store::Store;

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: String,
    pub version: &'static str,
}

/// GET /health
pub async fn health_check(
    State(store): State<Arc<dyn Store>>,
) -> (StatusCode, Json<HealthResponse>) {
    let (status, code, database) = match store.ping().await {
        Ok(()) => ("healthy", StatusCode::OK, "connected".to_string()),
        Err(e) => {
            tracing::error!(error = %e, "Health check failed");
            (
                "unhealthy",
                StatusCode::SERVICE_UNAVAILABLE,
                "unreachable".to_string(),
            )
        }
    };

    (
        code,
        Json(HealthResponse {
            status,
            database,
            version: env!("CARGO_PKG_VERSION"),
        }),
    )
}
