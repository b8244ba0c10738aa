//! Order lifecycle tests against the in-memory store
//!
//! Checkout pricing, stock reservation under contention, the fulfillment
//! chain and the exactly-once delivery credits.

mod common;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use bazaar_server::config::OrderPolicy;
use bazaar_server::order::{OrderError, OrderStatus, PaymentMethod, PaymentStatus};
use bazaar_server::store::StoreError;

use common::{order_request, Harness};

// ============================================================================
// Checkout
// ============================================================================

#[tokio::test]
async fn test_checkout_prices_from_catalog() {
    let h = Harness::new();
    let seller = h.seller().await;
    let buyer = h.buyer().await;
    let product = h.product(&seller, 500, 10).await;

    let order = h
        .orders
        .create_order(
            buyer.id,
            order_request(&product, 2, 200, PaymentMethod::CashOnDelivery),
        )
        .await
        .unwrap();

    assert_eq!(order.subtotal, dec!(1000));
    assert_eq!(order.discount, dec!(200));
    assert_eq!(order.total_amount, dec!(800));
    assert_eq!(order.platform_commission, dec!(100));
    assert_eq!(order.items[0].seller_earning, dec!(900));
    assert_eq!(order.loyalty_points_earned, 8);
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.payment_status, PaymentStatus::Pending);
    assert_eq!(order.status_history.len(), 1);
    assert_eq!(h.stock_of(&product).await, 8);
}

#[tokio::test]
async fn test_discount_is_clamped_to_subtotal() {
    let h = Harness::new();
    let seller = h.seller().await;
    let buyer = h.buyer().await;
    let product = h.product(&seller, 300, 5).await;

    let order = h
        .orders
        .create_order(
            buyer.id,
            order_request(&product, 1, 1000, PaymentMethod::CashOnDelivery),
        )
        .await
        .unwrap();

    assert_eq!(order.discount, dec!(300));
    assert_eq!(order.total_amount, Decimal::ZERO);
}

#[tokio::test]
async fn test_quantity_above_cap_is_rejected() {
    let h = Harness::new();
    let seller = h.seller().await;
    let buyer = h.buyer().await;
    let product = h.product(&seller, 500, 50).await;

    let result = h
        .orders
        .create_order(
            buyer.id,
            order_request(&product, product.max_order_qty + 1, 0, PaymentMethod::CashOnDelivery),
        )
        .await;

    assert!(matches!(result, Err(OrderError::Validation(_))));
    assert_eq!(h.stock_of(&product).await, 50);
}

#[tokio::test]
async fn test_quantity_cap_counts_split_lines() {
    let h = Harness::new();
    let seller = h.seller().await;
    let buyer = h.buyer().await;
    let product = h.product(&seller, 500, 100).await;
    let cap = product.max_order_qty;

    let mut request = order_request(&product, cap, 0, PaymentMethod::CashOnDelivery);
    let line = request.items[0].clone();
    request.items.extend([line.clone(), line.clone(), line]);

    let result = h.orders.create_order(buyer.id, request).await;

    assert!(matches!(result, Err(OrderError::Validation(_))));
    assert_eq!(h.stock_of(&product).await, 100);
    assert!(h.orders.list_my_orders(buyer.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_split_lines_within_cap_are_accepted() {
    let h = Harness::new();
    let seller = h.seller().await;
    let buyer = h.buyer().await;
    let product = h.product(&seller, 500, 100).await;

    let mut request = order_request(&product, 2, 0, PaymentMethod::CashOnDelivery);
    let line = request.items[0].clone();
    request.items.push(line);

    h.orders.create_order(buyer.id, request).await.unwrap();

    assert_eq!(h.stock_of(&product).await, 96);
}

#[tokio::test]
async fn test_insufficient_stock_leaves_stock_untouched() {
    let h = Harness::new();
    let seller = h.seller().await;
    let buyer = h.buyer().await;
    let product = h.product(&seller, 500, 1).await;

    let result = h
        .orders
        .create_order(buyer.id, order_request(&product, 2, 0, PaymentMethod::CashOnDelivery))
        .await;

    assert!(matches!(
        result,
        Err(OrderError::Store(StoreError::InsufficientStock { .. }))
    ));
    assert_eq!(h.stock_of(&product).await, 1);
    assert!(h.orders.list_my_orders(buyer.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_concurrent_checkout_for_last_unit() {
    let h = Harness::new();
    let seller = h.seller().await;
    let first = h.buyer().await;
    let second = h.buyer().await;
    let product = h.product(&seller, 500, 1).await;

    let orders_a = h.orders.clone();
    let orders_b = h.orders.clone();
    let request_a = order_request(&product, 1, 0, PaymentMethod::CashOnDelivery);
    let request_b = request_a.clone();

    let (a, b) = tokio::join!(
        tokio::spawn(async move { orders_a.create_order(first.id, request_a).await }),
        tokio::spawn(async move { orders_b.create_order(second.id, request_b).await }),
    );
    let results = [a.unwrap(), b.unwrap()];

    let successes = results.iter().filter(|r| r.is_ok()).count();
    let conflicts = results
        .iter()
        .filter(|r| matches!(r, Err(OrderError::Store(StoreError::InsufficientStock { .. }))))
        .count();
    assert_eq!(successes, 1);
    assert_eq!(conflicts, 1);
    assert_eq!(h.stock_of(&product).await, 0);
}

// ============================================================================
// Fulfillment and delivery credits
// ============================================================================

#[tokio::test]
async fn test_delivery_credits_exactly_once() {
    let h = Harness::new();
    let seller = h.seller().await;
    let buyer = h.buyer().await;
    let product = h.product(&seller, 500, 10).await;
    let order = h
        .orders
        .create_order(buyer.id, order_request(&product, 2, 200, PaymentMethod::CashOnDelivery))
        .await
        .unwrap();

    h.orders
        .update_status(order.id, OrderStatus::Delivered)
        .await
        .unwrap();

    let seller_after = h.user_by_id(seller.id).await;
    let buyer_after = h.user_by_id(buyer.id).await;
    assert_eq!(seller_after.wallet_balance, dec!(900));
    assert_eq!(buyer_after.loyalty_points, 8);

    // A repeated DELIVERED is a no-op
    let again = h
        .orders
        .update_status(order.id, OrderStatus::Delivered)
        .await
        .unwrap();
    assert!(again.rewards_credited);
    assert_eq!(h.user_by_id(seller.id).await.wallet_balance, dec!(900));
    assert_eq!(h.user_by_id(buyer.id).await.loyalty_points, 8);
}

#[tokio::test]
async fn test_concurrent_delivery_credits_once() {
    let h = Harness::new();
    let seller = h.seller().await;
    let buyer = h.buyer().await;
    let product = h.product(&seller, 500, 10).await;
    let order = h
        .orders
        .create_order(buyer.id, order_request(&product, 2, 200, PaymentMethod::CashOnDelivery))
        .await
        .unwrap();

    let mut handles = Vec::new();
    for _ in 0..4 {
        let orders = h.orders.clone();
        handles.push(tokio::spawn(async move {
            orders.update_status(order.id, OrderStatus::Delivered).await
        }));
    }
    for handle in handles {
        let _ = handle.await.unwrap();
    }

    let stored = h.orders.get_order(order.id).await.unwrap();
    assert_eq!(stored.status, OrderStatus::Delivered);
    assert_eq!(h.user_by_id(seller.id).await.wallet_balance, dec!(900));
    assert_eq!(h.user_by_id(buyer.id).await.loyalty_points, 8);
}

#[tokio::test]
async fn test_backward_transition_is_rejected() {
    let h = Harness::new();
    let seller = h.seller().await;
    let buyer = h.buyer().await;
    let product = h.product(&seller, 500, 10).await;
    let order = h
        .orders
        .create_order(buyer.id, order_request(&product, 1, 0, PaymentMethod::CashOnDelivery))
        .await
        .unwrap();

    h.orders
        .update_status(order.id, OrderStatus::Shipped)
        .await
        .unwrap();
    let result = h.orders.update_status(order.id, OrderStatus::Packed).await;

    assert!(matches!(result, Err(OrderError::InvalidTransition { .. })));
    let stored = h.orders.get_order(order.id).await.unwrap();
    assert_eq!(stored.status, OrderStatus::Shipped);
    assert_eq!(
        stored.status_history.last().map(|entry| entry.status),
        Some(OrderStatus::Shipped)
    );
}

// ============================================================================
// Cancellation and returns
// ============================================================================

#[tokio::test]
async fn test_cancel_without_restock_by_default() {
    let h = Harness::new();
    let seller = h.seller().await;
    let buyer = h.buyer().await;
    let product = h.product(&seller, 500, 5).await;
    let order = h
        .orders
        .create_order(buyer.id, order_request(&product, 2, 0, PaymentMethod::CashOnDelivery))
        .await
        .unwrap();

    let cancelled = h.orders.cancel_order(order.id, buyer.id).await.unwrap();

    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert!(cancelled.cancelled_at.is_some());
    assert_eq!(h.stock_of(&product).await, 3);

    let again = h.orders.cancel_order(order.id, buyer.id).await;
    assert!(matches!(again, Err(OrderError::AlreadyCancelled)));
}

#[tokio::test]
async fn test_cancel_restocks_when_enabled() {
    let h = Harness::with_policy(OrderPolicy {
        restock_on_cancel: true,
        ..OrderPolicy::default()
    });
    let seller = h.seller().await;
    let buyer = h.buyer().await;
    let product = h.product(&seller, 500, 5).await;
    let order = h
        .orders
        .create_order(buyer.id, order_request(&product, 2, 0, PaymentMethod::CashOnDelivery))
        .await
        .unwrap();

    h.orders.cancel_order(order.id, buyer.id).await.unwrap();

    assert_eq!(h.stock_of(&product).await, 5);
}

#[tokio::test]
async fn test_cancel_after_shipping_is_rejected() {
    let h = Harness::new();
    let seller = h.seller().await;
    let buyer = h.buyer().await;
    let product = h.product(&seller, 500, 5).await;
    let order = h
        .orders
        .create_order(buyer.id, order_request(&product, 1, 0, PaymentMethod::CashOnDelivery))
        .await
        .unwrap();
    h.orders
        .update_status(order.id, OrderStatus::Shipped)
        .await
        .unwrap();

    let result = h.orders.cancel_order(order.id, buyer.id).await;

    assert!(matches!(
        result,
        Err(OrderError::NotCancellable(OrderStatus::Shipped))
    ));
}

#[tokio::test]
async fn test_other_buyer_cannot_cancel() {
    let h = Harness::new();
    let seller = h.seller().await;
    let owner = h.buyer().await;
    let stranger = h.buyer().await;
    let product = h.product(&seller, 500, 5).await;
    let order = h
        .orders
        .create_order(owner.id, order_request(&product, 1, 0, PaymentMethod::CashOnDelivery))
        .await
        .unwrap();

    let result = h.orders.cancel_order(order.id, stranger.id).await;

    assert!(matches!(result, Err(OrderError::NotFound)));
    let stored = h.orders.get_order(order.id).await.unwrap();
    assert_eq!(stored.status, OrderStatus::Pending);
}

#[tokio::test]
async fn test_return_only_after_delivery() {
    let h = Harness::new();
    let seller = h.seller().await;
    let buyer = h.buyer().await;
    let product = h.product(&seller, 500, 5).await;
    let order = h
        .orders
        .create_order(buyer.id, order_request(&product, 1, 0, PaymentMethod::CashOnDelivery))
        .await
        .unwrap();

    let early = h.orders.request_return(order.id, buyer.id).await;
    assert!(matches!(early, Err(OrderError::ReturnNotAllowed)));

    h.orders
        .update_status(order.id, OrderStatus::Delivered)
        .await
        .unwrap();
    let returned = h.orders.request_return(order.id, buyer.id).await.unwrap();
    assert!(returned.is_return_requested);
    assert!(returned.return_requested_at.is_some());

    let twice = h.orders.request_return(order.id, buyer.id).await;
    assert!(matches!(twice, Err(OrderError::ReturnAlreadyRequested)));
}

// ============================================================================
// Admin queries
// ============================================================================

#[tokio::test]
async fn test_admin_listing_filters_by_status() {
    let h = Harness::new();
    let seller = h.seller().await;
    let buyer = h.buyer().await;
    let product = h.product(&seller, 500, 20).await;

    let mut ids = Vec::new();
    for _ in 0..3 {
        let order = h
            .orders
            .create_order(buyer.id, order_request(&product, 1, 0, PaymentMethod::CashOnDelivery))
            .await
            .unwrap();
        ids.push(order.id);
    }
    h.orders
        .update_status(ids[0], OrderStatus::Confirmed)
        .await
        .unwrap();

    let query = bazaar_server::order::ListOrdersQuery {
        status: Some(OrderStatus::Pending),
        ..Default::default()
    };
    let page = h.orders.list_orders(&query).await.unwrap();

    assert_eq!(page.pagination.total, 2);
    assert!(page.orders.iter().all(|o| o.status == OrderStatus::Pending));
}

#[tokio::test]
async fn test_csv_export_lists_every_order() {
    let h = Harness::new();
    let seller = h.seller().await;
    let buyer = h.buyer().await;
    let product = h.product(&seller, 500, 20).await;
    for _ in 0..2 {
        h.orders
            .create_order(buyer.id, order_request(&product, 1, 0, PaymentMethod::CashOnDelivery))
            .await
            .unwrap();
    }

    let csv = h.orders.export_csv().await.unwrap();
    let lines: Vec<&str> = csv.lines().collect();

    assert_eq!(lines[0], bazaar_server::order::CSV_HEADER);
    assert_eq!(lines.len(), 3);
    assert!(lines[1].contains("\"Asha Rao\""));
    assert!(lines[1].contains("\"PENDING\""));
}
