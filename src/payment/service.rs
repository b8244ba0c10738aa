//! Payment service layer - remote intents, confirmations, webhooks, refunds

use serde_json::json;
use sqlx::types::chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use super::gateway::PaymentGateway;
use super::model::{
    IntentResponse, VerifyPaymentRequest, WebhookEvent, WebhookOutcome, EVENT_PAYMENT_CAPTURED,
    EVENT_PAYMENT_FAILED,
};
use super::settlement;
use super::signature;
use super::PaymentError;
use crate::config::GatewayConfig;
use crate::order::{pricing, Order, OrderError, OrderService};

#[derive(Clone)]
pub struct PaymentService {
    orders: OrderService,
    gateway: Arc<dyn PaymentGateway>,
    key_secret: String,
    webhook_secret: String,
    currency: String,
}

impl PaymentService {
    pub fn new(
        orders: OrderService,
        gateway: Arc<dyn PaymentGateway>,
        config: &GatewayConfig,
    ) -> Self {
        Self {
            orders,
            gateway,
            key_secret: config.key_secret.clone(),
            webhook_secret: config.webhook_secret.clone(),
            currency: config.currency.clone(),
        }
    }

    /// Create the gateway-side order for `order_id`, charging its server total.
    ///
    /// An INITIATED intent is handed back without a gateway call. After a
    /// failed attempt a new remote order is created; the old id stays
    /// resolvable for webhooks and confirmations.
    pub async fn create_remote_intent(
        &self,
        user_id: Uuid,
        order_id: Uuid,
    ) -> Result<IntentResponse, PaymentError> {
        let order = self.orders.get_order(order_id).await?;
        if order.user_id != user_id {
            return Err(OrderError::NotFound.into());
        }

        // Reject before talking to the gateway; re-checked when we write
        if order.payment_method != crate::order::PaymentMethod::Gateway {
            return Err(PaymentError::NotGatewayOrder);
        }
        if order.payment_status.is_settled() {
            return Err(PaymentError::AlreadyPaid);
        }
        if order.status == crate::order::OrderStatus::Cancelled {
            return Err(PaymentError::OrderCancelled);
        }

        let amount = pricing::to_minor_units(order.total_amount)
            .filter(|amount| *amount > 0)
            .ok_or_else(|| OrderError::Validation("Order total is not payable".to_string()))?;

        let pending_intent = order.payment_status == crate::order::PaymentStatus::Initiated
            && order.remote_order_id().is_some();
        let updated = if pending_intent {
            order
        } else {
            let remote = self
                .gateway
                .create_order(amount, &self.currency, &order.id.to_string())
                .await?;
            self.orders
                .apply(order_id, |order| {
                    settlement::initiate(order, &remote, Utc::now())
                })
                .await?
        };

        let remote_order_id = updated
            .remote_order_id()
            .map(str::to_owned)
            .ok_or(PaymentError::NoIntent)?;

        tracing::info!(
            order_id = %order_id,
            remote_order_id = %remote_order_id,
            amount = amount,
            "Payment intent ready"
        );

        Ok(IntentResponse {
            order_id,
            remote_order_id,
            amount,
            currency: self.currency.clone(),
            key_id: self.gateway.key_id().to_string(),
        })
    }

    /// Check the widget's signature and mark the order paid.
    ///
    /// A bad signature is recorded on the order (FAILED plus a log entry)
    /// before `VerificationFailed` is returned. A repeat of a good
    /// confirmation returns the order unchanged.
    pub async fn verify_client_confirmation(
        &self,
        user_id: Uuid,
        request: VerifyPaymentRequest,
    ) -> Result<Order, PaymentError> {
        request
            .validate()
            .map_err(|e| OrderError::Validation(e.to_string()))?;

        let signature_ok = !self.key_secret.is_empty()
            && signature::verify_payment_signature(
                &self.key_secret,
                &request.remote_order_id,
                &request.remote_payment_id,
                &request.signature,
            );

        let mut verified = false;
        let order = self
            .orders
            .apply(request.order_id, |order| {
                if order.user_id != user_id {
                    return Err(PaymentError::Order(OrderError::NotFound));
                }
                let now = Utc::now();
                let matches_intent = order.has_remote_order_id(&request.remote_order_id);

                if signature_ok && matches_intent {
                    verified = true;
                    return Ok(settlement::capture(
                        order,
                        &request.remote_payment_id,
                        Some(&request.signature),
                        "payment.verified",
                        json!({
                            "remote_order_id": request.remote_order_id,
                            "remote_payment_id": request.remote_payment_id,
                        }),
                        now,
                    ));
                }

                verified = false;
                let payload = json!({
                    "remote_order_id": request.remote_order_id,
                    "remote_payment_id": request.remote_payment_id,
                    "signature_valid": signature_ok,
                });
                if order.payment_status.is_settled() {
                    return Ok(settlement::log_only(
                        order,
                        "payment.verification_failed",
                        payload,
                        now,
                    ));
                }
                Ok(settlement::fail(order, "payment.verification_failed", payload, now))
            })
            .await?;

        if !verified {
            tracing::warn!(
                order_id = %request.order_id,
                remote_order_id = %request.remote_order_id,
                "Payment verification failed"
            );
            return Err(PaymentError::VerificationFailed);
        }

        tracing::info!(
            order_id = %order.id,
            remote_payment_id = %request.remote_payment_id,
            "Payment verified"
        );
        Ok(order)
    }

    /// Process a gateway webhook. The signature is checked over `raw_body`
    /// before anything is parsed or written.
    pub async fn handle_webhook(
        &self,
        raw_body: &[u8],
        signature_header: Option<&str>,
    ) -> Result<WebhookOutcome, PaymentError> {
        if self.webhook_secret.is_empty() {
            tracing::error!("Webhook secret not configured, rejecting webhook");
            return Err(PaymentError::InvalidSignature);
        }
        let signature = signature_header.ok_or(PaymentError::InvalidSignature)?;
        if !signature::verify_webhook_signature(&self.webhook_secret, raw_body, signature) {
            tracing::warn!(bytes = raw_body.len(), "Rejected webhook with bad signature");
            return Err(PaymentError::InvalidSignature);
        }

        let event: WebhookEvent = serde_json::from_slice(raw_body)
            .map_err(|e| PaymentError::MalformedEvent(format!("Invalid webhook payload: {}", e)))?;

        let Some(remote_order_id) = event.remote_order_id() else {
            tracing::debug!(event = %event.event, "Webhook without payment order, ignoring");
            return Ok(WebhookOutcome::Ignored);
        };

        let Some(order) = self.orders.find_by_remote_order_id(remote_order_id).await? else {
            tracing::warn!(
                event = %event.event,
                remote_order_id = %remote_order_id,
                "Webhook for unknown order"
            );
            return Ok(WebhookOutcome::UnknownOrder);
        };

        let payload = event
            .payment_entity()
            .cloned()
            .unwrap_or(serde_json::Value::Null);
        let name = event.event.as_str();

        let outcome = match name {
            EVENT_PAYMENT_CAPTURED => {
                let remote_payment_id = event.remote_payment_id().unwrap_or_default();
                let mut duplicate = false;
                self.orders
                    .apply::<PaymentError, _>(order.id, |order| {
                        let now = Utc::now();
                        duplicate = order.payment_status.is_settled();
                        if duplicate {
                            return Ok(settlement::log_only(order, name, payload.clone(), now));
                        }
                        Ok(settlement::capture(
                            order,
                            remote_payment_id,
                            None,
                            name,
                            payload.clone(),
                            now,
                        ))
                    })
                    .await?;
                if duplicate {
                    WebhookOutcome::Duplicate
                } else {
                    WebhookOutcome::Processed
                }
            }
            EVENT_PAYMENT_FAILED => {
                self.orders
                    .apply::<PaymentError, _>(order.id, |order| {
                        Ok(settlement::fail(order, name, payload.clone(), Utc::now()))
                    })
                    .await?;
                WebhookOutcome::Processed
            }
            _ => {
                self.orders
                    .apply::<PaymentError, _>(order.id, |order| {
                        Ok(settlement::log_only(order, name, payload.clone(), Utc::now()))
                    })
                    .await?;
                WebhookOutcome::Logged
            }
        };

        tracing::info!(
            order_id = %order.id,
            event = %name,
            outcome = ?outcome,
            "Webhook handled"
        );
        Ok(outcome)
    }

    /// Refund a paid order in full through the gateway, then cancel it
    pub async fn refund_payment(&self, order_id: Uuid) -> Result<Order, PaymentError> {
        let order = self.orders.get_order(order_id).await?;
        if order.payment_status == crate::order::PaymentStatus::Refunded {
            return Ok(order);
        }
        if order.payment_status != crate::order::PaymentStatus::Paid {
            return Err(PaymentError::NotRefundable);
        }
        let payment_id = order
            .gateway_reference
            .remote_payment_id
            .clone()
            .ok_or(PaymentError::NotRefundable)?;
        let amount = pricing::to_minor_units(order.total_amount)
            .ok_or_else(|| OrderError::Validation("Order total is not refundable".to_string()))?;

        let refund = self.gateway.refund(&payment_id, amount).await?;
        let payload = serde_json::to_value(&refund).unwrap_or_default();
        let restock = self.orders.policy().restock_on_cancel;

        let order = self
            .orders
            .apply(order_id, |order| {
                settlement::refund(order, payload.clone(), Utc::now(), restock)
            })
            .await?;

        tracing::info!(
            order_id = %order_id,
            refund_id = %refund.id,
            amount = amount,
            "Payment refunded"
        );
        Ok(order)
    }
}
