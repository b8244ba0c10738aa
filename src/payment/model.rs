//! Payment request/response models and gateway webhook payloads

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::order::Order;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CreateIntentRequest {
    pub order_id: Uuid,
}

/// What the checkout widget needs to collect payment
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct IntentResponse {
    pub order_id: Uuid,
    pub remote_order_id: String,
    /// Minor units (paise)
    pub amount: i64,
    pub currency: String,
    pub key_id: String,
}

/// Confirmation relayed by the client after the widget closes
#[derive(Debug, Deserialize, Serialize, Clone, Validate)]
pub struct VerifyPaymentRequest {
    pub order_id: Uuid,
    #[serde(alias = "razorpay_order_id")]
    #[validate(length(min = 1, max = 128))]
    pub remote_order_id: String,
    #[serde(alias = "razorpay_payment_id")]
    #[validate(length(min = 1, max = 128))]
    pub remote_payment_id: String,
    #[serde(alias = "razorpay_signature")]
    #[validate(length(min = 1, max = 256))]
    pub signature: String,
}

#[derive(Debug, Serialize)]
pub struct VerifyPaymentResponse {
    pub success: bool,
    pub order: Order,
}

pub const EVENT_PAYMENT_CAPTURED: &str = "payment.captured";
pub const EVENT_PAYMENT_FAILED: &str = "payment.failed";

/// Webhook envelope; only the payment entity is interpreted
#[derive(Debug, Deserialize)]
pub struct WebhookEvent {
    pub event: String,
    #[serde(default)]
    pub payload: WebhookPayload,
}

#[derive(Debug, Deserialize, Default)]
pub struct WebhookPayload {
    pub payment: Option<EntityEnvelope>,
}

#[derive(Debug, Deserialize)]
pub struct EntityEnvelope {
    pub entity: serde_json::Value,
}

impl WebhookEvent {
    pub fn payment_entity(&self) -> Option<&serde_json::Value> {
        self.payload.payment.as_ref().map(|p| &p.entity)
    }

    pub fn remote_order_id(&self) -> Option<&str> {
        self.payment_entity()?.get("order_id")?.as_str()
    }

    pub fn remote_payment_id(&self) -> Option<&str> {
        self.payment_entity()?.get("id")?.as_str()
    }
}

/// How a verified webhook was handled
#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WebhookOutcome {
    Processed,
    Duplicate,
    Logged,
    UnknownOrder,
    Ignored,
}

#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub status: &'static str,
    pub outcome: WebhookOutcome,
}

impl From<WebhookOutcome> for WebhookAck {
    fn from(outcome: WebhookOutcome) -> Self {
        Self {
            status: "ok",
            outcome,
        }
    }
}
