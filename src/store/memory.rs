//! In-process store
//!
//! A single mutex guards all collections, so each trait method is one
//! atomic step, the same guarantee `PgStore` gets from a transaction. Used by
//! tests and local demos.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use sqlx::types::chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{
    matches_search, AccountStore, CatalogStore, Effect, OrderStore, StoreError, StoreResult,
};
use crate::catalog::Product;
use crate::models::User;
use crate::order::{ListOrdersQuery, Order};

#[derive(Default)]
struct Collections {
    products: HashMap<Uuid, Product>,
    users: HashMap<Uuid, User>,
    orders: HashMap<Uuid, Order>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Collections>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn newest_first(mut orders: Vec<Order>) -> Vec<Order> {
    orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    orders
}

impl Collections {
    fn apply_effect(&mut self, effect: &Effect) {
        match effect {
            Effect::CreditWallet { seller_id, amount } => match self.users.get_mut(seller_id) {
                Some(seller) => seller.wallet_balance += *amount,
                None => tracing::warn!(%seller_id, "Wallet credit skipped: seller not found"),
            },
            Effect::CreditLoyalty { user_id, points } => match self.users.get_mut(user_id) {
                Some(user) => user.loyalty_points += *points,
                None => tracing::warn!(%user_id, "Loyalty credit skipped: user not found"),
            },
            Effect::Restock {
                product_id,
                sku,
                quantity,
            } => {
                let restocked = self.products.get_mut(product_id).and_then(|product| {
                    let variant = product.variant_mut(sku)?;
                    variant.stock += *quantity as i32;
                    product.recompute_stock();
                    Some(())
                });
                if restocked.is_none() {
                    tracing::warn!(%product_id, %sku, "Restock skipped: variant not found");
                }
            }
        }
    }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn get_product(&self, id: Uuid) -> StoreResult<Option<Product>> {
        Ok(self.inner.lock().products.get(&id).cloned())
    }

    async fn save_product(&self, product: &Product) -> StoreResult<()> {
        let mut product = product.clone();
        product.recompute_stock();
        self.inner.lock().products.insert(product.id, product);
        Ok(())
    }
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn get_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.inner.lock().users.get(&id).cloned())
    }

    async fn find_user_by_phone(&self, phone: &str) -> StoreResult<Option<User>> {
        Ok(self
            .inner
            .lock()
            .users
            .values()
            .find(|u| u.phone == phone)
            .cloned())
    }

    async fn insert_user(&self, user: &User) -> StoreResult<()> {
        let mut inner = self.inner.lock();
        if inner.users.values().any(|u| u.phone == user.phone) {
            return Err(StoreError::Duplicate("Account".to_string()));
        }
        inner.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn record_failed_login(
        &self,
        id: Uuid,
        max_attempts: i32,
        lock_until: DateTime<Utc>,
    ) -> StoreResult<()> {
        if let Some(user) = self.inner.lock().users.get_mut(&id) {
            user.failed_login_attempts += 1;
            if user.failed_login_attempts >= max_attempts {
                user.locked_until = Some(lock_until);
            }
            user.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn record_successful_login(&self, id: Uuid, at: DateTime<Utc>) -> StoreResult<()> {
        if let Some(user) = self.inner.lock().users.get_mut(&id) {
            user.failed_login_attempts = 0;
            user.locked_until = None;
            user.last_login = Some(at);
            user.updated_at = at;
        }
        Ok(())
    }

    async fn bump_token_version(&self, id: Uuid) -> StoreResult<i32> {
        let mut inner = self.inner.lock();
        let user = inner
            .users
            .get_mut(&id)
            .ok_or_else(|| StoreError::Backend(format!("user {} not found", id)))?;
        user.token_version += 1;
        Ok(user.token_version)
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn create_order(&self, order: &Order) -> StoreResult<()> {
        let mut inner = self.inner.lock();

        if inner.orders.contains_key(&order.id) {
            return Err(StoreError::Duplicate("Order".to_string()));
        }

        // Check every line against the stock left after earlier lines,
        // then decrement; nothing is touched unless all lines fit.
        let mut reserved: HashMap<(Uuid, String), i64> = HashMap::new();
        for item in &order.items {
            let product = inner
                .products
                .get(&item.product_id)
                .filter(|p| p.is_active)
                .ok_or(StoreError::ProductUnavailable(item.product_id))?;
            let variant = product
                .variant(&item.sku)
                .filter(|v| v.is_active)
                .ok_or(StoreError::ProductUnavailable(item.product_id))?;

            let key = (item.product_id, variant.sku.clone());
            let already = reserved.get(&key).copied().unwrap_or(0);
            let wanted = already + item.quantity as i64;
            if (variant.stock as i64) < wanted {
                return Err(StoreError::InsufficientStock {
                    product_id: item.product_id,
                    sku: variant.sku.clone(),
                });
            }
            reserved.insert(key, wanted);
        }

        for ((product_id, sku), quantity) in reserved {
            if let Some(product) = inner.products.get_mut(&product_id) {
                if let Some(variant) = product.variant_mut(&sku) {
                    variant.stock -= quantity as i32;
                }
                product.recompute_stock();
                product.updated_at = order.created_at;
            }
        }

        inner.orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn get_order(&self, id: Uuid) -> StoreResult<Option<Order>> {
        Ok(self.inner.lock().orders.get(&id).cloned())
    }

    async fn find_order_by_remote_order_id(
        &self,
        remote_order_id: &str,
    ) -> StoreResult<Option<Order>> {
        Ok(self
            .inner
            .lock()
            .orders
            .values()
            .find(|o| o.has_remote_order_id(remote_order_id))
            .cloned())
    }

    async fn list_orders_for_user(&self, user_id: Uuid) -> StoreResult<Vec<Order>> {
        let orders = self
            .inner
            .lock()
            .orders
            .values()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect();
        Ok(newest_first(orders))
    }

    async fn list_orders(&self, query: &ListOrdersQuery) -> StoreResult<(Vec<Order>, u64)> {
        let matching: Vec<Order> = self
            .inner
            .lock()
            .orders
            .values()
            .filter(|o| query.status.map(|s| o.status == s).unwrap_or(true))
            .filter(|o| {
                query
                    .search
                    .as_deref()
                    .map(|s| matches_search(o, s))
                    .unwrap_or(true)
            })
            .cloned()
            .collect();

        let total = matching.len() as u64;
        let page = newest_first(matching)
            .into_iter()
            .skip(query.offset() as usize)
            .take(query.limit() as usize)
            .collect();
        Ok((page, total))
    }

    async fn all_orders(&self) -> StoreResult<Vec<Order>> {
        let orders = self.inner.lock().orders.values().cloned().collect();
        Ok(newest_first(orders))
    }

    async fn compare_and_swap_order(
        &self,
        order: &Order,
        expected_version: i64,
        effects: &[Effect],
    ) -> StoreResult<bool> {
        let mut inner = self.inner.lock();

        match inner.orders.get(&order.id) {
            Some(current) if current.version == expected_version => {}
            Some(_) => return Ok(false),
            None => return Err(StoreError::Backend(format!("order {} not found", order.id))),
        }

        for effect in effects {
            inner.apply_effect(effect);
        }
        inner.orders.insert(order.id, order.clone());
        Ok(true)
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}
