//! Payment and gateway webhook HTTP handlers

use axum::{body::Bytes, extract::State, http::HeaderMap, Json};

use crate::error::ApiError;
use crate::middleware::AuthenticatedUser;
use crate::payment::{
    CreateIntentRequest, IntentResponse, PaymentService, VerifyPaymentRequest,
    VerifyPaymentResponse, WebhookAck,
};

/// Header carrying the webhook HMAC
pub const WEBHOOK_SIGNATURE_HEADER: &str = "x-razorpay-signature";

/// POST /api/payment/gateway - Create the remote intent for an order
pub async fn create_intent(
    State(payments): State<PaymentService>,
    user: AuthenticatedUser,
    Json(request): Json<CreateIntentRequest>,
) -> Result<Json<IntentResponse>, ApiError> {
    let intent = payments
        .create_remote_intent(user.user_id, request.order_id)
        .await?;
    Ok(Json(intent))
}

/// POST /api/payment/verify - Client-relayed confirmation
pub async fn verify_payment(
    State(payments): State<PaymentService>,
    user: AuthenticatedUser,
    Json(request): Json<VerifyPaymentRequest>,
) -> Result<Json<VerifyPaymentResponse>, ApiError> {
    let order = payments
        .verify_client_confirmation(user.user_id, request)
        .await?;
    Ok(Json(VerifyPaymentResponse {
        success: true,
        order,
    }))
}

/// POST /api/webhooks/gateway - Takes the body as raw bytes so the
/// signature is checked over exactly what the gateway sent
pub async fn gateway_webhook(
    State(payments): State<PaymentService>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, ApiError> {
    let signature = headers
        .get(WEBHOOK_SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());

    let outcome = payments.handle_webhook(&body, signature).await?;
    Ok(Json(outcome.into()))
}
