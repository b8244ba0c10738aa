//! Server-side order pricing
//!
//! Totals are always derived from catalog prices. Commission is rounded to
//! paise per line and the seller earning takes the remainder, so
//! `sum(seller_earning) + platform_commission == subtotal` holds exactly.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

use super::model::LineItem;

/// Currency minor units per major unit (paise per rupee)
pub const MINOR_UNITS: i64 = 100;

/// Aggregate money fields of an order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Totals {
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub platform_commission: Decimal,
    pub total_amount: Decimal,
}

fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Split a line total into (platform commission, seller earning)
pub fn commission_split(item_total: Decimal, commission_percent: Decimal) -> (Decimal, Decimal) {
    let commission = round_money(item_total * commission_percent / Decimal::ONE_HUNDRED);
    (commission, item_total - commission)
}

/// Clamp a requested discount into `[0, subtotal]`
pub fn clamp_discount(requested: Decimal, subtotal: Decimal) -> Decimal {
    requested.max(Decimal::ZERO).min(subtotal)
}

/// Fill each line's commission fields and compute the order totals
pub fn price_lines(items: &mut [LineItem], requested_discount: Decimal) -> Totals {
    let mut subtotal = Decimal::ZERO;
    let mut platform_commission = Decimal::ZERO;

    for item in items.iter_mut() {
        let item_total = item.item_total();
        let (commission, earning) = commission_split(item_total, item.commission_percent);
        item.commission_amount = commission;
        item.seller_earning = earning;
        subtotal += item_total;
        platform_commission += commission;
    }

    let discount = clamp_discount(requested_discount, subtotal);

    Totals {
        subtotal,
        discount,
        platform_commission,
        total_amount: subtotal - discount,
    }
}

/// One point per `divisor` units of the order total, rounded down
pub fn loyalty_points(total_amount: Decimal, divisor: i64) -> i64 {
    if divisor <= 0 || total_amount <= Decimal::ZERO {
        return 0;
    }
    (total_amount / Decimal::from(divisor))
        .floor()
        .to_i64()
        .unwrap_or(0)
}

/// Amount in the gateway's minor unit, or `None` if it does not fit
pub fn to_minor_units(amount: Decimal) -> Option<i64> {
    round_money(amount * Decimal::from(MINOR_UNITS))
        .trunc()
        .to_i64()
}
