//! PostgreSQL store
//!
//! Orders are kept as a JSONB document next to the columns used for lookups
//! and filtering. Stock and balance counters are only ever changed with
//! relative `UPDATE`s inside a transaction.

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::types::chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};
use uuid::Uuid;

use super::{AccountStore, CatalogStore, Effect, OrderStore, StoreError, StoreResult};
use crate::catalog::{Product, Variant};
use crate::models::User;
use crate::order::{ListOrdersQuery, Order};

const UNIQUE_VIOLATION: &str = "23505";

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: Uuid,
    seller_id: Uuid,
    title: String,
    price: Decimal,
    commission_percent: Decimal,
    max_order_qty: i32,
    is_active: bool,
    total_stock: i64,
    in_stock: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ProductRow {
    fn into_product(self, variants: Vec<Variant>) -> Product {
        Product {
            id: self.id,
            seller_id: self.seller_id,
            title: self.title,
            price: self.price,
            commission_percent: self.commission_percent,
            max_order_qty: self.max_order_qty.max(1) as u32,
            is_active: self.is_active,
            variants,
            total_stock: self.total_stock,
            in_stock: self.in_stock,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    e.as_database_error()
        .and_then(|db| db.code())
        .map(|code| code == UNIQUE_VIOLATION)
        .unwrap_or(false)
}

/// `ILIKE` pattern matching `fragment` anywhere, with wildcards escaped
fn contains_pattern(fragment: &str) -> String {
    let escaped = fragment
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

fn push_order_filters(qb: &mut QueryBuilder<'_, Postgres>, query: &ListOrdersQuery) {
    if let Some(status) = query.status {
        qb.push(" AND status = ").push_bind(status.as_str());
    }

    let search = query.search.as_deref().map(str::trim).unwrap_or("");
    if search.is_empty() {
        return;
    }
    match Uuid::parse_str(search) {
        Ok(id) => {
            qb.push(" AND (id = ")
                .push_bind(id)
                .push(" OR customer_phone ILIKE ")
                .push_bind(contains_pattern(search))
                .push(")");
        }
        Err(_) => {
            qb.push(" AND customer_phone ILIKE ")
                .push_bind(contains_pattern(search));
        }
    }
}

async fn recompute_product_stock(
    tx: &mut Transaction<'_, Postgres>,
    product_id: Uuid,
) -> StoreResult<()> {
    sqlx::query(
        r#"
        UPDATE products p
        SET total_stock = s.total, in_stock = s.total > 0, updated_at = NOW()
        FROM (
            SELECT COALESCE(SUM(stock), 0)::BIGINT AS total
            FROM product_variants
            WHERE product_id = $1
        ) s
        WHERE p.id = $1
        "#,
    )
    .bind(product_id)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

async fn apply_effect(tx: &mut Transaction<'_, Postgres>, effect: &Effect) -> StoreResult<()> {
    match effect {
        Effect::CreditWallet { seller_id, amount } => {
            let result = sqlx::query(
                r#"
                UPDATE users
                SET wallet_balance = wallet_balance + $2, updated_at = NOW()
                WHERE id = $1
                "#,
            )
            .bind(seller_id)
            .bind(amount)
            .execute(&mut **tx)
            .await?;
            if result.rows_affected() == 0 {
                tracing::warn!(%seller_id, "Wallet credit skipped: seller not found");
            }
        }
        Effect::CreditLoyalty { user_id, points } => {
            let result = sqlx::query(
                r#"
                UPDATE users
                SET loyalty_points = loyalty_points + $2, updated_at = NOW()
                WHERE id = $1
                "#,
            )
            .bind(user_id)
            .bind(points)
            .execute(&mut **tx)
            .await?;
            if result.rows_affected() == 0 {
                tracing::warn!(%user_id, "Loyalty credit skipped: user not found");
            }
        }
        Effect::Restock {
            product_id,
            sku,
            quantity,
        } => {
            let result = sqlx::query(
                r#"
                UPDATE product_variants
                SET stock = stock + $3
                WHERE product_id = $1 AND sku = $2
                "#,
            )
            .bind(product_id)
            .bind(sku)
            .bind(*quantity as i32)
            .execute(&mut **tx)
            .await?;
            if result.rows_affected() == 0 {
                tracing::warn!(%product_id, %sku, "Restock skipped: variant not found");
            } else {
                recompute_product_stock(tx, *product_id).await?;
            }
        }
    }
    Ok(())
}

#[async_trait]
impl CatalogStore for PgStore {
    async fn get_product(&self, id: Uuid) -> StoreResult<Option<Product>> {
        let row: Option<ProductRow> = sqlx::query_as(
            r#"
            SELECT id, seller_id, title, price, commission_percent, max_order_qty,
                   is_active, total_stock, in_stock, created_at, updated_at
            FROM products
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let variants: Vec<Variant> = sqlx::query_as(
            r#"
            SELECT sku, size, color, stock, price_override, is_active
            FROM product_variants
            WHERE product_id = $1
            ORDER BY sku
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(row.into_product(variants)))
    }

    async fn save_product(&self, product: &Product) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO products (id, seller_id, title, price, commission_percent, max_order_qty,
                                  is_active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (id) DO UPDATE
            SET title = EXCLUDED.title,
                price = EXCLUDED.price,
                commission_percent = EXCLUDED.commission_percent,
                max_order_qty = EXCLUDED.max_order_qty,
                is_active = EXCLUDED.is_active,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(product.id)
        .bind(product.seller_id)
        .bind(&product.title)
        .bind(product.price)
        .bind(product.commission_percent)
        .bind(product.max_order_qty as i32)
        .bind(product.is_active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM product_variants WHERE product_id = $1")
            .bind(product.id)
            .execute(&mut *tx)
            .await?;

        for variant in &product.variants {
            sqlx::query(
                r#"
                INSERT INTO product_variants (product_id, sku, size, color, stock, price_override, is_active)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(product.id)
            .bind(&variant.sku)
            .bind(&variant.size)
            .bind(&variant.color)
            .bind(variant.stock)
            .bind(variant.price_override)
            .bind(variant.is_active)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    StoreError::Duplicate(format!("Variant {}", variant.sku))
                } else {
                    e.into()
                }
            })?;
        }

        recompute_product_stock(&mut tx, product.id).await?;
        tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl AccountStore for PgStore {
    async fn get_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        let user = sqlx::query_as(
            r#"
            SELECT id, name, phone, password_hash, role, is_blocked, failed_login_attempts,
                   locked_until, token_version, last_login, loyalty_points, wallet_balance,
                   created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn find_user_by_phone(&self, phone: &str) -> StoreResult<Option<User>> {
        let user = sqlx::query_as(
            r#"
            SELECT id, name, phone, password_hash, role, is_blocked, failed_login_attempts,
                   locked_until, token_version, last_login, loyalty_points, wallet_balance,
                   created_at, updated_at
            FROM users
            WHERE phone = $1
            "#,
        )
        .bind(phone)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn insert_user(&self, user: &User) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO users (id, name, phone, password_hash, role, is_blocked,
                               failed_login_attempts, token_version, loyalty_points,
                               wallet_balance, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(user.id)
        .bind(&user.name)
        .bind(&user.phone)
        .bind(&user.password_hash)
        .bind(user.role)
        .bind(user.is_blocked)
        .bind(user.failed_login_attempts)
        .bind(user.token_version)
        .bind(user.loyalty_points)
        .bind(user.wallet_balance)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::Duplicate("Account".to_string())
            } else {
                e.into()
            }
        })?;
        Ok(())
    }

    async fn record_failed_login(
        &self,
        id: Uuid,
        max_attempts: i32,
        lock_until: DateTime<Utc>,
    ) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE users
            SET failed_login_attempts = failed_login_attempts + 1,
                locked_until = CASE
                    WHEN failed_login_attempts + 1 >= $2 THEN $3
                    ELSE locked_until
                END,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(max_attempts)
        .bind(lock_until)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn record_successful_login(&self, id: Uuid, at: DateTime<Utc>) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE users
            SET failed_login_attempts = 0, locked_until = NULL, last_login = $2, updated_at = $2
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn bump_token_version(&self, id: Uuid) -> StoreResult<i32> {
        let version: Option<i32> = sqlx::query_scalar(
            r#"
            UPDATE users
            SET token_version = token_version + 1, updated_at = NOW()
            WHERE id = $1
            RETURNING token_version
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        version.ok_or_else(|| StoreError::Backend(format!("user {} not found", id)))
    }
}

#[async_trait]
impl OrderStore for PgStore {
    async fn create_order(&self, order: &Order) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;

        // Sequential conditional decrements see each other's effects, so two
        // lines for the same variant are checked cumulatively. Any failure
        // drops the transaction and rolls everything back.
        for item in &order.items {
            let reserved = sqlx::query(
                r#"
                UPDATE product_variants v
                SET stock = v.stock - $3
                FROM products p
                WHERE v.product_id = $1
                  AND v.sku = $2
                  AND v.is_active
                  AND v.stock >= $3
                  AND p.id = v.product_id
                  AND p.is_active
                "#,
            )
            .bind(item.product_id)
            .bind(&item.sku)
            .bind(item.quantity as i32)
            .execute(&mut *tx)
            .await?;

            if reserved.rows_affected() == 0 {
                let available: bool = sqlx::query_scalar(
                    r#"
                    SELECT EXISTS (
                        SELECT 1
                        FROM product_variants v
                        JOIN products p ON p.id = v.product_id
                        WHERE v.product_id = $1 AND v.sku = $2 AND v.is_active AND p.is_active
                    )
                    "#,
                )
                .bind(item.product_id)
                .bind(&item.sku)
                .fetch_one(&mut *tx)
                .await?;

                return Err(if available {
                    StoreError::InsufficientStock {
                        product_id: item.product_id,
                        sku: item.sku.clone(),
                    }
                } else {
                    StoreError::ProductUnavailable(item.product_id)
                });
            }

            recompute_product_stock(&mut tx, item.product_id).await?;
        }

        sqlx::query(
            r#"
            INSERT INTO orders (id, user_id, status, payment_status, remote_order_id,
                                customer_phone, version, document, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(order.id)
        .bind(order.user_id)
        .bind(order.status.as_str())
        .bind(order.payment_status.as_str())
        .bind(order.remote_order_id())
        .bind(&order.customer.phone)
        .bind(order.version)
        .bind(Json(order))
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::Duplicate("Order".to_string())
            } else {
                e.into()
            }
        })?;

        tx.commit().await?;
        Ok(())
    }

    async fn get_order(&self, id: Uuid) -> StoreResult<Option<Order>> {
        let document: Option<Json<Order>> =
            sqlx::query_scalar("SELECT document FROM orders WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(document.map(|Json(order)| order))
    }

    async fn find_order_by_remote_order_id(
        &self,
        remote_order_id: &str,
    ) -> StoreResult<Option<Order>> {
        let document: Option<Json<Order>> = sqlx::query_scalar(
            r#"
            SELECT document FROM orders
            WHERE remote_order_id = $1
               OR document -> 'gateway_reference' -> 'superseded_remote_order_ids' ? $1
            LIMIT 1
            "#,
        )
        .bind(remote_order_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(document.map(|Json(order)| order))
    }

    async fn list_orders_for_user(&self, user_id: Uuid) -> StoreResult<Vec<Order>> {
        let documents: Vec<Json<Order>> = sqlx::query_scalar(
            "SELECT document FROM orders WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(documents.into_iter().map(|Json(order)| order).collect())
    }

    async fn list_orders(&self, query: &ListOrdersQuery) -> StoreResult<(Vec<Order>, u64)> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM orders WHERE TRUE");
        push_order_filters(&mut count, query);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut page = QueryBuilder::<Postgres>::new("SELECT document FROM orders WHERE TRUE");
        push_order_filters(&mut page, query);
        page.push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(query.limit() as i64)
            .push(" OFFSET ")
            .push_bind(query.offset() as i64);
        let documents: Vec<Json<Order>> = page.build_query_scalar().fetch_all(&self.pool).await?;

        Ok((
            documents.into_iter().map(|Json(order)| order).collect(),
            total.max(0) as u64,
        ))
    }

    async fn all_orders(&self) -> StoreResult<Vec<Order>> {
        let documents: Vec<Json<Order>> =
            sqlx::query_scalar("SELECT document FROM orders ORDER BY created_at DESC")
                .fetch_all(&self.pool)
                .await?;
        Ok(documents.into_iter().map(|Json(order)| order).collect())
    }

    async fn compare_and_swap_order(
        &self,
        order: &Order,
        expected_version: i64,
        effects: &[Effect],
    ) -> StoreResult<bool> {
        let mut tx = self.pool.begin().await?;

        let swapped = sqlx::query(
            r#"
            UPDATE orders
            SET status = $3, payment_status = $4, remote_order_id = $5,
                version = $6, document = $7, updated_at = $8
            WHERE id = $1 AND version = $2
            "#,
        )
        .bind(order.id)
        .bind(expected_version)
        .bind(order.status.as_str())
        .bind(order.payment_status.as_str())
        .bind(order.remote_order_id())
        .bind(order.version)
        .bind(Json(order))
        .bind(order.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::Duplicate("Gateway order reference".to_string())
            } else {
                e.into()
            }
        })?;

        if swapped.rows_affected() == 0 {
            let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM orders WHERE id = $1)")
                .bind(order.id)
                .fetch_one(&mut *tx)
                .await?;
            if !exists {
                return Err(StoreError::Backend(format!("order {} not found", order.id)));
            }
            return Ok(false);
        }

        for effect in effects {
            apply_effect(&mut tx, effect).await?;
        }

        tx.commit().await?;
        Ok(true)
    }

    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_pattern_escapes_wildcards() {
        assert_eq!(contains_pattern("98765"), "%98765%");
        assert_eq!(contains_pattern("50%_off"), "%50\\%\\_off%");
    }
}
