//! Order service layer - checkout, fulfillment updates and admin queries

use chrono::Duration;
use std::collections::HashMap;
use sqlx::types::chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use super::error::OrderError;
use super::ledger::{self, Outcome};
use super::lifecycle;
use super::model::{
    CreateOrderRequest, GatewayReference, LineItem, ListOrdersQuery, Order, OrderPage,
    OrderStatus, PaymentStatus, StatusEntry,
};
use super::pricing;
use crate::config::OrderPolicy;
use crate::models::Pagination;
use crate::store::{Store, StoreError};

pub const CSV_HEADER: &str = "OrderID,Name,Phone,Total,Status,Date";

/// Order service for managing the order lifecycle
#[derive(Clone)]
pub struct OrderService {
    store: Arc<dyn Store>,
    policy: OrderPolicy,
}

impl OrderService {
    pub fn new(store: Arc<dyn Store>, policy: OrderPolicy) -> Self {
        Self { store, policy }
    }

    pub fn policy(&self) -> &OrderPolicy {
        &self.policy
    }

    /// Price the cart from the live catalog, reserve stock and persist the order
    pub async fn create_order(
        &self,
        user_id: Uuid,
        request: CreateOrderRequest,
    ) -> Result<Order, OrderError> {
        request.validate()?;
        request.customer.validate()?;
        for item in &request.items {
            item.validate()?;
        }
        let customer = &request.customer;
        if [&customer.name, &customer.phone, &customer.address]
            .iter()
            .any(|field| field.trim().is_empty())
        {
            return Err(OrderError::Validation(
                "Customer name, phone and address are required".to_string(),
            ));
        }

        let mut items = Vec::with_capacity(request.items.len());
        // Units per (product, sku) across all lines, checked against the cap
        let mut units_by_sku: HashMap<(Uuid, String), u32> = HashMap::new();
        for requested in &request.items {
            let product = self
                .store
                .get_product(requested.product_id)
                .await?
                .ok_or(OrderError::ProductNotFound(requested.product_id))?;

            if !product.is_active {
                return Err(StoreError::ProductUnavailable(product.id).into());
            }
            let variant = product
                .variant(&requested.sku)
                .filter(|v| v.is_active)
                .ok_or(StoreError::ProductUnavailable(product.id))?;

            let units = units_by_sku
                .entry((product.id, variant.sku.clone()))
                .or_default();
            *units = units.saturating_add(requested.quantity);
            if *units > product.max_order_qty {
                return Err(OrderError::Validation(format!(
                    "At most {} units of {} per order",
                    product.max_order_qty, product.title
                )));
            }
            if product.commission_percent < rust_decimal::Decimal::ZERO
                || product.commission_percent > rust_decimal::Decimal::ONE_HUNDRED
            {
                return Err(OrderError::Validation(format!(
                    "Product {} has an invalid commission",
                    product.id
                )));
            }

            items.push(LineItem {
                product_id: product.id,
                seller_id: product.seller_id,
                sku: variant.sku.clone(),
                size: variant.size.clone(),
                color: variant.color.clone(),
                title: product.title.clone(),
                unit_price: product.unit_price(variant),
                quantity: requested.quantity,
                commission_percent: product.commission_percent,
                commission_amount: rust_decimal::Decimal::ZERO,
                seller_earning: rust_decimal::Decimal::ZERO,
            });
        }

        let totals = pricing::price_lines(&mut items, request.discount);
        let now = Utc::now();

        let order = Order {
            id: Uuid::new_v4(),
            user_id,
            customer: request.customer.clone(),
            items,
            subtotal: totals.subtotal,
            discount: totals.discount,
            platform_commission: totals.platform_commission,
            total_amount: totals.total_amount,
            payment_method: request.payment_method,
            payment_status: PaymentStatus::Pending,
            status: OrderStatus::Pending,
            status_history: vec![StatusEntry {
                status: OrderStatus::Pending,
                at: now,
            }],
            gateway_reference: GatewayReference::default(),
            payment_logs: Vec::new(),
            loyalty_points_earned: pricing::loyalty_points(
                totals.total_amount,
                self.policy.loyalty_point_divisor,
            ),
            rewards_credited: false,
            estimated_delivery: now + Duration::days(self.policy.estimated_delivery_days),
            cancelled_at: None,
            is_return_requested: false,
            return_requested_at: None,
            version: 0,
            created_at: now,
            updated_at: now,
        };

        self.store.create_order(&order).await?;

        tracing::info!(
            order_id = %order.id,
            user_id = %user_id,
            total = %order.total_amount,
            lines = order.items.len(),
            "Order created"
        );

        Ok(order)
    }

    pub async fn list_my_orders(&self, user_id: Uuid) -> Result<Vec<Order>, OrderError> {
        Ok(self.store.list_orders_for_user(user_id).await?)
    }

    pub async fn list_orders(&self, query: &ListOrdersQuery) -> Result<OrderPage, OrderError> {
        let (orders, total) = self.store.list_orders(query).await?;
        Ok(OrderPage {
            orders,
            pagination: Pagination::new(total, query.page(), query.limit()),
        })
    }

    pub async fn get_order(&self, id: Uuid) -> Result<Order, OrderError> {
        self.store.get_order(id).await?.ok_or(OrderError::NotFound)
    }

    /// Admin status change; DELIVERED credits sellers and buyer exactly once
    pub async fn update_status(&self, id: Uuid, next: OrderStatus) -> Result<Order, OrderError> {
        let restock = self.policy.restock_on_cancel;
        let order = ledger::apply(self.store.as_ref(), id, |order| {
            lifecycle::advance(order, next, Utc::now(), restock)
        })
        .await?;

        tracing::info!(order_id = %id, status = %order.status, "Order status updated");
        Ok(order)
    }

    pub async fn cancel_order(&self, id: Uuid, requester: Uuid) -> Result<Order, OrderError> {
        let restock = self.policy.restock_on_cancel;
        let order = ledger::apply(self.store.as_ref(), id, |order| {
            lifecycle::cancel(order, requester, Utc::now(), restock)
        })
        .await?;

        tracing::info!(order_id = %id, user_id = %requester, restock, "Order cancelled");
        Ok(order)
    }

    pub async fn request_return(&self, id: Uuid, requester: Uuid) -> Result<Order, OrderError> {
        let order = ledger::apply(self.store.as_ref(), id, |order| {
            lifecycle::request_return(order, requester, Utc::now())
        })
        .await?;

        tracing::info!(order_id = %id, user_id = %requester, "Return requested");
        Ok(order)
    }

    /// Every order, newest first, as CSV
    pub async fn export_csv(&self) -> Result<String, OrderError> {
        let orders = self.store.all_orders().await?;
        Ok(render_csv(&orders))
    }

    /// Apply an arbitrary ledger decision; used by the payment flows
    pub(crate) async fn apply<E, F>(&self, id: Uuid, decide: F) -> Result<Order, E>
    where
        E: From<OrderError> + Send,
        F: FnMut(&mut Order) -> Result<Outcome, E> + Send,
    {
        ledger::apply(self.store.as_ref(), id, decide).await
    }

    pub(crate) async fn find_by_remote_order_id(
        &self,
        remote_order_id: &str,
    ) -> Result<Option<Order>, OrderError> {
        Ok(self
            .store
            .find_order_by_remote_order_id(remote_order_id)
            .await?)
    }
}

fn csv_field(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

pub fn render_csv(orders: &[Order]) -> String {
    let mut out = String::from(CSV_HEADER);
    out.push('\n');
    for order in orders {
        let row = [
            order.id.to_string(),
            order.customer.name.clone(),
            order.customer.phone.clone(),
            order.total_amount.to_string(),
            order.status.to_string(),
            order.created_at.format("%Y-%m-%d").to_string(),
        ];
        let row: Vec<String> = row.iter().map(|field| csv_field(field)).collect();
        out.push_str(&row.join(","));
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::lifecycle::tests::sample_order;

    #[test]
    fn test_csv_quotes_and_escapes() {
        let mut order = sample_order(Uuid::new_v4());
        order.customer.name = "Asha \"Ash\" Rao".to_string();

        let csv = render_csv(&[order.clone()]);
        let mut lines = csv.lines();
        assert_eq!(lines.next(), Some(CSV_HEADER));

        let row = lines.next().unwrap();
        assert!(row.starts_with(&format!("\"{}\",", order.id)));
        assert!(row.contains("\"Asha \"\"Ash\"\" Rao\""));
        assert!(row.contains("\"PENDING\""));
        assert!(lines.next().is_none());
    }

    #[test]
    fn test_csv_empty_ledger() {
        assert_eq!(render_csv(&[]), format!("{}\n", CSV_HEADER));
    }
}
