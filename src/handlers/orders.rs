//! Order HTTP handlers

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use uuid::Uuid;

use crate::error::ApiError;
use crate::middleware::{AdminUser, AuthenticatedUser};
use crate::models::MessageResponse;
use crate::order::{
    CreateOrderRequest, ListOrdersQuery, Order, OrderPage, OrderService, UpdateStatusRequest,
};
use crate::payment::PaymentService;

/// POST /api/orders - Checkout
pub async fn create_order(
    State(orders): State<OrderService>,
    user: AuthenticatedUser,
    Json(request): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<Order>), ApiError> {
    let order = orders.create_order(user.user_id, request).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// GET /api/orders/my
pub async fn my_orders(
    State(orders): State<OrderService>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<Order>>, ApiError> {
    Ok(Json(orders.list_my_orders(user.user_id).await?))
}

/// GET /api/orders - Admin listing with filters and pagination
pub async fn list_orders(
    State(orders): State<OrderService>,
    _admin: AdminUser,
    Query(query): Query<ListOrdersQuery>,
) -> Result<Json<OrderPage>, ApiError> {
    Ok(Json(orders.list_orders(&query).await?))
}

/// GET /api/orders/admin/:id
pub async fn get_order(
    State(orders): State<OrderService>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Order>, ApiError> {
    Ok(Json(orders.get_order(id).await?))
}

/// GET /api/orders/export/csv
pub async fn export_csv(
    State(orders): State<OrderService>,
    _admin: AdminUser,
) -> Result<impl IntoResponse, ApiError> {
    let csv = orders.export_csv().await?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (header::CONTENT_DISPOSITION, "attachment; filename=\"orders.csv\""),
        ],
        csv,
    ))
}

/// PUT /api/orders/:id/status
pub async fn update_status(
    State(orders): State<OrderService>,
    AdminUser(admin): AdminUser,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<Order>, ApiError> {
    tracing::debug!(admin_id = %admin.user_id, order_id = %id, status = %request.status, "Status update requested");
    Ok(Json(orders.update_status(id, request.status).await?))
}

/// PUT /api/orders/:id/cancel
pub async fn cancel_order(
    State(orders): State<OrderService>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Order>, ApiError> {
    Ok(Json(orders.cancel_order(id, user.user_id).await?))
}

/// PUT /api/orders/:id/return
pub async fn request_return(
    State(orders): State<OrderService>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<MessageResponse>, ApiError> {
    orders.request_return(id, user.user_id).await?;
    Ok(Json(MessageResponse::new("Return requested")))
}

/// POST /api/orders/:id/refund
pub async fn refund_order(
    State(payments): State<PaymentService>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Order>, ApiError> {
    Ok(Json(payments.refund_payment(id).await?))
}
