//! Centralized API error handling for Bazaar
//!
//! Every business-rule failure is recovered here and turned into a
//! `{"message", "code"}` JSON body with the matching status code. Internal
//! details (database messages, gateway responses) are logged but never
//! returned to the client.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::auth::AuthError;
use crate::order::OrderError;
use crate::payment::PaymentError;
use crate::store::StoreError;

/// API error type with HTTP status code mapping
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    ValidationError(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Locked(String),

    #[error("Invalid signature")]
    Signature,

    #[error("Payment failed")]
    PaymentFailed,

    #[error("Too many requests")]
    TooManyRequests,

    #[error("Dependency error: {0}")]
    DependencyError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Internal server error: {0}")]
    InternalError(String),
}

/// JSON error response body
#[derive(Serialize)]
pub struct ErrorResponse {
    pub message: String,
    pub code: &'static str,
}

impl ApiError {
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::ValidationError(_) => "VALIDATION_ERROR",
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::Forbidden(_) => "FORBIDDEN",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::Locked(_) => "LOCKED",
            ApiError::Signature => "INVALID_SIGNATURE",
            ApiError::PaymentFailed => "PAYMENT_FAILED",
            ApiError::TooManyRequests => "TOO_MANY_REQUESTS",
            ApiError::DependencyError(_) => "DEPENDENCY_ERROR",
            ApiError::DatabaseError(_) => "DATABASE_ERROR",
            ApiError::InternalError(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::ValidationError(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Locked(_) => StatusCode::LOCKED,
            ApiError::Signature => StatusCode::BAD_REQUEST,
            ApiError::PaymentFailed => StatusCode::BAD_REQUEST,
            ApiError::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
            ApiError::DependencyError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show to the client
    pub fn public_message(&self) -> String {
        match self {
            ApiError::DependencyError(_) => {
                "Payment provider unavailable, please retry".to_string()
            }
            ApiError::DatabaseError(_) | ApiError::InternalError(_) => {
                "Internal server error".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.error_code();

        if status.is_server_error() {
            tracing::error!(error = %self, code = %code, "Server error occurred");
        } else {
            tracing::debug!(error = %self, code = %code, "Client error occurred");
        }

        let body = ErrorResponse {
            message: self.public_message(),
            code,
        };

        (status, Json(body)).into_response()
    }
}

// Conversions from domain errors

impl From<validator::ValidationErrors> for ApiError {
    fn from(err: validator::ValidationErrors) -> Self {
        ApiError::ValidationError(err.to_string())
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::BadRequest(format!("Invalid JSON: {}", err))
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::InsufficientStock { sku, .. } => {
                ApiError::Conflict(format!("Insufficient stock for {}", sku))
            }
            StoreError::ProductUnavailable(id) => {
                ApiError::Conflict(format!("Product {} is not available", id))
            }
            StoreError::Duplicate(what) => ApiError::Conflict(format!("{} already exists", what)),
            StoreError::Backend(msg) => ApiError::DatabaseError(msg),
        }
    }
}

impl From<OrderError> for ApiError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::Validation(msg) => ApiError::ValidationError(msg),
            OrderError::NotFound => ApiError::NotFound("Order not found".to_string()),
            OrderError::ProductNotFound(id) => {
                ApiError::NotFound(format!("Product {} not found", id))
            }
            OrderError::InvalidTransition { .. }
            | OrderError::NotCancellable(_)
            | OrderError::AlreadyCancelled
            | OrderError::ReturnNotAllowed
            | OrderError::ReturnAlreadyRequested
            | OrderError::Contention => ApiError::Conflict(err.to_string()),
            OrderError::Store(store) => store.into(),
        }
    }
}

impl From<PaymentError> for ApiError {
    fn from(err: PaymentError) -> Self {
        match err {
            PaymentError::Order(order) => order.into(),
            PaymentError::AlreadyPaid
            | PaymentError::NotRefundable
            | PaymentError::NotGatewayOrder
            | PaymentError::OrderCancelled
            | PaymentError::NoIntent => ApiError::Conflict(err.to_string()),
            PaymentError::VerificationFailed => ApiError::PaymentFailed,
            PaymentError::InvalidSignature => ApiError::Signature,
            PaymentError::MalformedEvent(msg) => ApiError::BadRequest(msg),
            PaymentError::Gateway(gateway) => ApiError::DependencyError(gateway.to_string()),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials | AuthError::SessionExpired | AuthError::Token(_) => {
                ApiError::Unauthorized(err.to_string())
            }
            AuthError::AccountBlocked => ApiError::Forbidden(err.to_string()),
            AuthError::AccountLocked => ApiError::Locked(err.to_string()),
            AuthError::UserNotFound => ApiError::NotFound(err.to_string()),
            AuthError::PhoneTaken => ApiError::Conflict(err.to_string()),
            AuthError::Hashing(msg) => ApiError::InternalError(msg),
            AuthError::Store(store) => store.into(),
        }
    }
}
