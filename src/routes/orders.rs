//! Order routes

use axum::{
    routing::{get, post, put},
    Router,
};

use crate::handlers::orders;
use crate::state::AppState;

/// Create order routes
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/orders",
            post(orders::create_order).get(orders::list_orders),
        )
        .route("/orders/my", get(orders::my_orders))
        .route("/orders/export/csv", get(orders::export_csv))
        .route("/orders/admin/:id", get(orders::get_order))
        .route("/orders/:id/status", put(orders::update_status))
        .route("/orders/:id/cancel", put(orders::cancel_order))
        .route("/orders/:id/return", put(orders::request_return))
        .route("/orders/:id/refund", post(orders::refund_order))
}
