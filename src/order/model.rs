//! Order ledger models
//!
//! An order is a self-contained document: the customer and line items are
//! snapshots taken at checkout, so later edits to a profile or a product
//! never rewrite history.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::types::chrono::{DateTime, Utc};
use uuid::Uuid;
use validator::Validate;

use crate::models::Pagination;

/// Fulfillment status
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    #[serde(alias = "Pending")]
    Pending,
    #[serde(alias = "Confirmed")]
    Confirmed,
    #[serde(alias = "Packed")]
    Packed,
    #[serde(alias = "Shipped")]
    Shipped,
    #[serde(alias = "Delivered")]
    Delivered,
    #[serde(alias = "Cancelled")]
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Confirmed => "CONFIRMED",
            OrderStatus::Packed => "PACKED",
            OrderStatus::Shipped => "SHIPPED",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "PENDING" => Some(OrderStatus::Pending),
            "CONFIRMED" => Some(OrderStatus::Confirmed),
            "PACKED" => Some(OrderStatus::Packed),
            "SHIPPED" => Some(OrderStatus::Shipped),
            "DELIVERED" => Some(OrderStatus::Delivered),
            "CANCELLED" => Some(OrderStatus::Cancelled),
            _ => None,
        }
    }

    /// Position on the forward chain; `None` for CANCELLED
    pub fn rank(&self) -> Option<u8> {
        match self {
            OrderStatus::Pending => Some(0),
            OrderStatus::Confirmed => Some(1),
            OrderStatus::Packed => Some(2),
            OrderStatus::Shipped => Some(3),
            OrderStatus::Delivered => Some(4),
            OrderStatus::Cancelled => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    /// Cancellation window closes once the parcel has shipped
    pub fn is_cancellable(&self) -> bool {
        matches!(
            self,
            OrderStatus::Pending | OrderStatus::Confirmed | OrderStatus::Packed
        )
    }

    /// Forward moves along the chain, or cancellation before shipping
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        match next {
            OrderStatus::Cancelled => self.is_cancellable(),
            _ => match (self.rank(), next.rank()) {
                (Some(from), Some(to)) => to > from,
                _ => false,
            },
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payment status, independent of fulfillment
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Initiated,
    Paid,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Initiated => "INITIATED",
            PaymentStatus::Paid => "PAID",
            PaymentStatus::Failed => "FAILED",
            PaymentStatus::Refunded => "REFUNDED",
        }
    }

    /// Money has been captured (and possibly returned); never reset
    pub fn is_settled(&self) -> bool {
        matches!(self, PaymentStatus::Paid | PaymentStatus::Refunded)
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum PaymentMethod {
    #[serde(rename = "COD", alias = "CASH_ON_DELIVERY")]
    CashOnDelivery,
    #[serde(rename = "GATEWAY", alias = "RAZORPAY")]
    Gateway,
}

/// Customer details frozen at checkout
#[derive(Debug, Serialize, Deserialize, Clone, Validate, PartialEq, Eq)]
pub struct CustomerSnapshot {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(length(min = 1, max = 20))]
    pub phone: String,
    #[validate(length(min = 1, max = 500))]
    pub address: String,
    #[serde(default)]
    pub city: String,
    #[serde(default, alias = "pincode")]
    pub postal_code: String,
}

/// Line item snapshot; prices come from the catalog at order time
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct LineItem {
    pub product_id: Uuid,
    pub seller_id: Uuid,
    pub sku: String,
    pub size: String,
    pub color: String,
    pub title: String,
    pub unit_price: Decimal,
    pub quantity: u32,
    pub commission_percent: Decimal,
    pub commission_amount: Decimal,
    pub seller_earning: Decimal,
}

impl LineItem {
    pub fn item_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct StatusEntry {
    pub status: OrderStatus,
    pub at: DateTime<Utc>,
}

/// Every gateway callback received, kept verbatim
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PaymentLog {
    pub event: String,
    pub payload: serde_json::Value,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct GatewayReference {
    /// Current remote intent
    pub remote_order_id: Option<String>,
    pub remote_payment_id: Option<String>,
    pub signature: Option<String>,
    /// Earlier intents replaced after a failed attempt; still payable
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub superseded_remote_order_ids: Vec<String>,
}

/// Order document
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Order {
    pub id: Uuid,
    pub user_id: Uuid,
    pub customer: CustomerSnapshot,
    pub items: Vec<LineItem>,
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub platform_commission: Decimal,
    pub total_amount: Decimal,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub status: OrderStatus,
    pub status_history: Vec<StatusEntry>,
    #[serde(default)]
    pub gateway_reference: GatewayReference,
    #[serde(default)]
    pub payment_logs: Vec<PaymentLog>,
    pub loyalty_points_earned: i64,
    /// Set in the same write that moves the order into DELIVERED
    #[serde(default)]
    pub rewards_credited: bool,
    pub estimated_delivery: DateTime<Utc>,
    pub cancelled_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_return_requested: bool,
    pub return_requested_at: Option<DateTime<Utc>>,
    /// Bumped on every persisted change; the compare-and-swap key
    #[serde(default)]
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Set the status and append it to the audit trail
    pub fn record_status(&mut self, status: OrderStatus, at: DateTime<Utc>) {
        self.status = status;
        self.status_history.push(StatusEntry { status, at });
        self.updated_at = at;
    }

    pub fn log_payment_event(
        &mut self,
        event: impl Into<String>,
        payload: serde_json::Value,
        at: DateTime<Utc>,
    ) {
        self.payment_logs.push(PaymentLog {
            event: event.into(),
            payload,
            at,
        });
        self.updated_at = at;
    }

    pub fn remote_order_id(&self) -> Option<&str> {
        self.gateway_reference.remote_order_id.as_deref()
    }

    /// Whether `remote_order_id` is the current or a superseded intent
    pub fn has_remote_order_id(&self, remote_order_id: &str) -> bool {
        self.remote_order_id() == Some(remote_order_id)
            || self
                .gateway_reference
                .superseded_remote_order_ids
                .iter()
                .any(|id| id == remote_order_id)
    }
}

// ============================================================================
// Request/Response DTOs
// ============================================================================

/// One requested line; the client names the variant, never the price
#[derive(Debug, Deserialize, Serialize, Clone, Validate)]
pub struct RequestedItem {
    pub product_id: Uuid,
    #[validate(length(min = 1, max = 64))]
    pub sku: String,
    #[validate(range(min = 1, max = 100))]
    pub quantity: u32,
}

#[derive(Debug, Deserialize, Serialize, Clone, Validate)]
pub struct CreateOrderRequest {
    pub customer: CustomerSnapshot,
    #[validate(length(min = 1, max = 50))]
    pub items: Vec<RequestedItem>,
    #[serde(default)]
    pub discount: Decimal,
    pub payment_method: PaymentMethod,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: OrderStatus,
}

/// Admin listing filters
#[derive(Debug, Deserialize, Default, Clone)]
pub struct ListOrdersQuery {
    pub status: Option<OrderStatus>,
    /// Exact order id, or a fragment of the customer phone
    pub search: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl ListOrdersQuery {
    pub fn page(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn limit(&self) -> u32 {
        self.limit.unwrap_or(10).clamp(1, 100)
    }

    pub fn offset(&self) -> u64 {
        (self.page() as u64 - 1) * self.limit() as u64
    }
}

#[derive(Debug, Serialize)]
pub struct OrderPage {
    pub orders: Vec<Order>,
    pub pagination: Pagination,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_only_chain() {
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Confirmed));
        assert!(OrderStatus::Confirmed.can_transition_to(OrderStatus::Delivered));
        assert!(!OrderStatus::Shipped.can_transition_to(OrderStatus::Packed));
        assert!(!OrderStatus::Delivered.can_transition_to(OrderStatus::Pending));
        assert!(!OrderStatus::Cancelled.can_transition_to(OrderStatus::Confirmed));
    }

    #[test]
    fn test_cancellation_window() {
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Cancelled));
        assert!(OrderStatus::Packed.can_transition_to(OrderStatus::Cancelled));
        assert!(!OrderStatus::Shipped.can_transition_to(OrderStatus::Cancelled));
        assert!(!OrderStatus::Delivered.can_transition_to(OrderStatus::Cancelled));
        assert!(!OrderStatus::Cancelled.can_transition_to(OrderStatus::Cancelled));
    }

    #[test]
    fn test_status_wire_format() {
        assert_eq!(
            serde_json::to_string(&OrderStatus::Delivered).unwrap(),
            "\"DELIVERED\""
        );
        let legacy: OrderStatus = serde_json::from_str("\"Shipped\"").unwrap();
        assert_eq!(legacy, OrderStatus::Shipped);
        assert_eq!(OrderStatus::parse("packed"), Some(OrderStatus::Packed));
    }

    #[test]
    fn test_payment_method_aliases() {
        let cod: PaymentMethod = serde_json::from_str("\"COD\"").unwrap();
        assert_eq!(cod, PaymentMethod::CashOnDelivery);
        let legacy: PaymentMethod = serde_json::from_str("\"RAZORPAY\"").unwrap();
        assert_eq!(legacy, PaymentMethod::Gateway);
        assert!(serde_json::from_str::<PaymentMethod>("\"CARD\"").is_err());
    }

    #[test]
    fn test_list_query_bounds() {
        let query = ListOrdersQuery {
            page: Some(0),
            limit: Some(500),
            ..Default::default()
        };
        assert_eq!(query.page(), 1);
        assert_eq!(query.limit(), 100);
        assert_eq!(query.offset(), 0);

        let query = ListOrdersQuery {
            page: Some(3),
            ..Default::default()
        };
        assert_eq!(query.offset(), 20);
    }
}
