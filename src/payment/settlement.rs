//! Payment state transitions on an order document
//!
//! PAID is sticky: nothing here moves a settled order back to PENDING,
//! INITIATED or FAILED. Only a refund moves it on, to REFUNDED.

use sqlx::types::chrono::{DateTime, Utc};

use super::gateway::RemoteOrder;
use super::PaymentError;
use crate::order::lifecycle;
use crate::order::{Order, OrderStatus, Outcome, PaymentMethod, PaymentStatus};

fn ensure_payable(order: &Order) -> Result<(), PaymentError> {
    if order.payment_method != PaymentMethod::Gateway {
        return Err(PaymentError::NotGatewayOrder);
    }
    if order.payment_status.is_settled() {
        return Err(PaymentError::AlreadyPaid);
    }
    if order.status == OrderStatus::Cancelled {
        return Err(PaymentError::OrderCancelled);
    }
    Ok(())
}

/// Attach a freshly created remote intent.
///
/// While an intent is INITIATED it stays current, so a concurrent request
/// cannot orphan a widget the buyer already has open. After a failed
/// attempt the new intent replaces it and the old id is kept in
/// `superseded_remote_order_ids`, where webhooks and confirmations still
/// resolve it.
pub fn initiate(
    order: &mut Order,
    remote: &RemoteOrder,
    now: DateTime<Utc>,
) -> Result<Outcome, PaymentError> {
    ensure_payable(order)?;
    if order.payment_status == PaymentStatus::Initiated && order.remote_order_id().is_some() {
        return Ok(Outcome::Unchanged);
    }

    let reference = &mut order.gateway_reference;
    if let Some(previous) = reference.remote_order_id.take() {
        if previous != remote.id {
            reference.superseded_remote_order_ids.push(previous);
        }
    }
    reference.remote_order_id = Some(remote.id.clone());
    reference.remote_payment_id = None;
    reference.signature = None;

    order.payment_status = PaymentStatus::Initiated;
    order.log_payment_event(
        "intent.created",
        serde_json::to_value(remote).unwrap_or_default(),
        now,
    );
    Ok(Outcome::changed())
}

/// Record a captured payment. Returns `Unchanged` if it is already settled.
pub fn capture(
    order: &mut Order,
    remote_payment_id: &str,
    signature: Option<&str>,
    event: &str,
    payload: serde_json::Value,
    now: DateTime<Utc>,
) -> Outcome {
    if order.payment_status.is_settled() {
        return Outcome::Unchanged;
    }

    order.payment_status = PaymentStatus::Paid;
    order.gateway_reference.remote_payment_id = Some(remote_payment_id.to_string());
    if let Some(signature) = signature {
        order.gateway_reference.signature = Some(signature.to_string());
    }
    if order.status == OrderStatus::Pending {
        order.record_status(OrderStatus::Confirmed, now);
    }
    order.log_payment_event(event, payload, now);
    Outcome::changed()
}

/// Record a failed attempt; never downgrades a settled payment
pub fn fail(
    order: &mut Order,
    event: &str,
    payload: serde_json::Value,
    now: DateTime<Utc>,
) -> Outcome {
    if !order.payment_status.is_settled() {
        order.payment_status = PaymentStatus::Failed;
    }
    order.log_payment_event(event, payload, now);
    Outcome::changed()
}

/// Append to the payment log without any state change
pub fn log_only(
    order: &mut Order,
    event: &str,
    payload: serde_json::Value,
    now: DateTime<Utc>,
) -> Outcome {
    order.log_payment_event(event, payload, now);
    Outcome::changed()
}

/// Mark a paid order refunded and cancelled
pub fn refund(
    order: &mut Order,
    payload: serde_json::Value,
    now: DateTime<Utc>,
    restock_on_cancel: bool,
) -> Result<Outcome, PaymentError> {
    match order.payment_status {
        PaymentStatus::Refunded => return Ok(Outcome::Unchanged),
        PaymentStatus::Paid => {}
        _ => return Err(PaymentError::NotRefundable),
    }

    order.payment_status = PaymentStatus::Refunded;
    order.log_payment_event("refund", payload, now);

    let effects = if order.status == OrderStatus::Cancelled {
        Vec::new()
    } else {
        lifecycle::mark_cancelled(order, now, restock_on_cancel)
    };
    Ok(Outcome::Changed(effects))
}
