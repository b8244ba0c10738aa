//! Fulfillment state machine
//!
//! Pure functions over an order document. They never touch storage; the
//! caller persists the result through [`super::ledger::apply`].

use sqlx::types::chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use uuid::Uuid;

use super::error::OrderError;
use super::ledger::Outcome;
use super::model::{Order, OrderStatus};
use crate::store::Effect;

/// Seller wallet and buyer loyalty credits owed once the order is delivered
pub fn delivery_credits(order: &Order) -> Vec<Effect> {
    let mut per_seller: BTreeMap<Uuid, rust_decimal::Decimal> = BTreeMap::new();
    for item in &order.items {
        *per_seller.entry(item.seller_id).or_default() += item.seller_earning;
    }

    let mut effects: Vec<Effect> = per_seller
        .into_iter()
        .map(|(seller_id, amount)| Effect::CreditWallet { seller_id, amount })
        .collect();

    if order.loyalty_points_earned > 0 {
        effects.push(Effect::CreditLoyalty {
            user_id: order.user_id,
            points: order.loyalty_points_earned,
        });
    }
    effects
}

/// Return every line's quantity to its variant
pub fn restock_effects(order: &Order) -> Vec<Effect> {
    order
        .items
        .iter()
        .map(|item| Effect::Restock {
            product_id: item.product_id,
            sku: item.sku.clone(),
            quantity: item.quantity,
        })
        .collect()
}

/// Mark the order cancelled; shared by user cancellation, admin updates and refunds
pub fn mark_cancelled(order: &mut Order, now: DateTime<Utc>, restock: bool) -> Vec<Effect> {
    order.record_status(OrderStatus::Cancelled, now);
    order.cancelled_at = Some(now);
    if restock {
        restock_effects(order)
    } else {
        Vec::new()
    }
}

/// Move the order to `next`.
///
/// Re-applying the current status is a no-op. Entering DELIVERED carries the
/// wallet and loyalty credits, guarded by `rewards_credited` in the same
/// document write.
pub fn advance(
    order: &mut Order,
    next: OrderStatus,
    now: DateTime<Utc>,
    restock_on_cancel: bool,
) -> Result<Outcome, OrderError> {
    if order.status == next {
        return Ok(Outcome::Unchanged);
    }
    if !order.status.can_transition_to(next) {
        return Err(OrderError::InvalidTransition {
            from: order.status,
            to: next,
        });
    }

    if next == OrderStatus::Cancelled {
        return Ok(Outcome::Changed(mark_cancelled(order, now, restock_on_cancel)));
    }

    order.record_status(next, now);

    let mut effects = Vec::new();
    if next == OrderStatus::Delivered && !order.rewards_credited {
        effects = delivery_credits(order);
        order.rewards_credited = true;
    }
    Ok(Outcome::Changed(effects))
}

/// Buyer-initiated cancellation
pub fn cancel(
    order: &mut Order,
    requester: Uuid,
    now: DateTime<Utc>,
    restock_on_cancel: bool,
) -> Result<Outcome, OrderError> {
    if order.user_id != requester {
        return Err(OrderError::NotFound);
    }
    if order.status == OrderStatus::Cancelled {
        return Err(OrderError::AlreadyCancelled);
    }
    if !order.status.is_cancellable() {
        return Err(OrderError::NotCancellable(order.status));
    }
    Ok(Outcome::Changed(mark_cancelled(order, now, restock_on_cancel)))
}

/// Flag a delivered order for return; the fulfillment status stays DELIVERED
pub fn request_return(
    order: &mut Order,
    requester: Uuid,
    now: DateTime<Utc>,
) -> Result<Outcome, OrderError> {
    if order.user_id != requester {
        return Err(OrderError::NotFound);
    }
    if order.status != OrderStatus::Delivered {
        return Err(OrderError::ReturnNotAllowed);
    }
    if order.is_return_requested {
        return Err(OrderError::ReturnAlreadyRequested);
    }
    order.is_return_requested = true;
    order.return_requested_at = Some(now);
    order.updated_at = now;
    Ok(Outcome::changed())
}
