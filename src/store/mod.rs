//! Persistence boundary
//!
//! Every mutation of shared state (variant stock, order documents, wallet and
//! loyalty balances) goes through one of the atomic primitives below. There
//! is no read-then-write on counters in application code:
//!
//! - stock is reserved with a conditional decrement that fails instead of
//!   going negative, in the same transaction that inserts the order;
//! - an order document is replaced only if its `version` is still the one
//!   the caller read, and any ledger effects ride in that same transaction.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::types::chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::catalog::Product;
use crate::models::User;
use crate::order::{ListOrdersQuery, Order};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Insufficient stock for variant {sku} of product {product_id}")]
    InsufficientStock { product_id: Uuid, sku: String },

    #[error("Product {0} is not available")]
    ProductUnavailable(Uuid),

    #[error("{0} already exists")]
    Duplicate(String),

    #[error("Storage backend error: {0}")]
    Backend(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::Backend(e.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Balance or stock change applied atomically with an order write
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    CreditWallet { seller_id: Uuid, amount: Decimal },
    CreditLoyalty { user_id: Uuid, points: i64 },
    Restock { product_id: Uuid, sku: String, quantity: u32 },
}

#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn get_product(&self, id: Uuid) -> StoreResult<Option<Product>>;

    /// Insert or replace a product and its variants
    async fn save_product(&self, product: &Product) -> StoreResult<()>;
}

#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn get_user(&self, id: Uuid) -> StoreResult<Option<User>>;

    async fn find_user_by_phone(&self, phone: &str) -> StoreResult<Option<User>>;

    /// Fails with `Duplicate` when the phone is taken
    async fn insert_user(&self, user: &User) -> StoreResult<()>;

    /// Bump the failure counter; lock the account once it reaches `max_attempts`
    async fn record_failed_login(
        &self,
        id: Uuid,
        max_attempts: i32,
        lock_until: DateTime<Utc>,
    ) -> StoreResult<()>;

    async fn record_successful_login(&self, id: Uuid, at: DateTime<Utc>) -> StoreResult<()>;

    /// Invalidate every outstanding session; returns the new version
    async fn bump_token_version(&self, id: Uuid) -> StoreResult<i32>;
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Reserve stock for every line and insert the order, all or nothing
    async fn create_order(&self, order: &Order) -> StoreResult<()>;

    async fn get_order(&self, id: Uuid) -> StoreResult<Option<Order>>;

    async fn find_order_by_remote_order_id(&self, remote_order_id: &str)
        -> StoreResult<Option<Order>>;

    /// Newest first
    async fn list_orders_for_user(&self, user_id: Uuid) -> StoreResult<Vec<Order>>;

    /// One page plus the total match count
    async fn list_orders(&self, query: &ListOrdersQuery) -> StoreResult<(Vec<Order>, u64)>;

    /// Newest first, unpaginated
    async fn all_orders(&self) -> StoreResult<Vec<Order>>;

    /// Replace the order iff the stored version equals `expected_version`,
    /// applying `effects` in the same atomic step. Returns `false` when
    /// another writer got there first; nothing is applied in that case.
    async fn compare_and_swap_order(
        &self,
        order: &Order,
        expected_version: i64,
        effects: &[Effect],
    ) -> StoreResult<bool>;

    async fn ping(&self) -> StoreResult<()>;
}

/// Everything the services need from storage
pub trait Store: CatalogStore + AccountStore + OrderStore {}

impl<T: CatalogStore + AccountStore + OrderStore> Store for T {}

/// Case-insensitive phone fragment or exact id match, shared by both backends
pub(crate) fn matches_search(order: &Order, search: &str) -> bool {
    let search = search.trim();
    if search.is_empty() {
        return true;
    }
    if let Ok(id) = Uuid::parse_str(search) {
        if order.id == id {
            return true;
        }
    }
    order
        .customer
        .phone
        .to_lowercase()
        .contains(&search.to_lowercase())
}
