//! Product and variant models

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::types::chrono::{DateTime, Utc};
use uuid::Uuid;

/// Default platform cut for a product, in percent
pub const DEFAULT_COMMISSION_PERCENT: u32 = 10;

/// Default per-line quantity cap
pub const DEFAULT_MAX_ORDER_QTY: u32 = 5;

/// Product with its size/color variants
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Product {
    pub id: Uuid,
    pub seller_id: Uuid,
    pub title: String,
    pub price: Decimal,
    pub commission_percent: Decimal,
    pub max_order_qty: u32,
    pub is_active: bool,
    pub variants: Vec<Variant>,
    /// Sum of variant stock; recomputed, never written directly
    pub total_stock: i64,
    pub in_stock: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A specific size/color combination
#[derive(Debug, Serialize, Deserialize, Clone, sqlx::FromRow)]
pub struct Variant {
    pub sku: String,
    pub size: String,
    pub color: String,
    pub stock: i32,
    pub price_override: Option<Decimal>,
    pub is_active: bool,
}

impl Product {
    pub fn new(seller_id: Uuid, title: impl Into<String>, price: Decimal) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            seller_id,
            title: title.into(),
            price,
            commission_percent: Decimal::from(DEFAULT_COMMISSION_PERCENT),
            max_order_qty: DEFAULT_MAX_ORDER_QTY,
            is_active: true,
            variants: Vec::new(),
            total_stock: 0,
            in_stock: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_variant(mut self, variant: Variant) -> Self {
        self.variants.push(variant);
        self.recompute_stock();
        self
    }

    pub fn variant(&self, sku: &str) -> Option<&Variant> {
        self.variants.iter().find(|v| v.sku.eq_ignore_ascii_case(sku))
    }

    pub fn variant_mut(&mut self, sku: &str) -> Option<&mut Variant> {
        self.variants
            .iter_mut()
            .find(|v| v.sku.eq_ignore_ascii_case(sku))
    }

    /// Price charged for one unit of the given variant
    pub fn unit_price(&self, variant: &Variant) -> Decimal {
        variant.price_override.unwrap_or(self.price)
    }

    /// Refresh `total_stock`/`in_stock` from the variants
    pub fn recompute_stock(&mut self) {
        self.total_stock = self.variants.iter().map(|v| v.stock.max(0) as i64).sum();
        self.in_stock = self.total_stock > 0;
    }
}

impl Variant {
    pub fn new(size: impl Into<String>, color: impl Into<String>, stock: i32) -> Self {
        let size = size.into();
        let color = color.into();
        let sku = format!("{}-{}", size, color).to_uppercase();
        Self {
            sku,
            size,
            color,
            stock,
            price_override: None,
            is_active: true,
        }
    }

    pub fn with_sku(mut self, sku: impl Into<String>) -> Self {
        self.sku = sku.into().to_uppercase();
        self
    }
}
