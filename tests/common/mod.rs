//! Shared fixtures for the integration tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use uuid::Uuid;

use bazaar_server::auth::generate_session_token;
use bazaar_server::catalog::{Product, Variant};
use bazaar_server::config::{Config, Environment, GatewayConfig, OrderPolicy};
use bazaar_server::models::{User, UserRole};
use bazaar_server::order::{
    CreateOrderRequest, CustomerSnapshot, OrderService, PaymentMethod, RequestedItem,
};
use bazaar_server::payment::{
    signature, GatewayError, PaymentGateway, PaymentService, RemoteOrder, RemoteRefund,
};
use bazaar_server::state::AppState;
use bazaar_server::store::{AccountStore, CatalogStore, MemoryStore, Store};

pub const JWT_SECRET: &str = "integration-test-secret";
pub const KEY_SECRET: &str = "rzp_test_key_secret";
pub const WEBHOOK_SECRET: &str = "rzp_test_webhook_secret";

pub fn test_config() -> Config {
    Config {
        database_url: "postgresql://localhost/bazaar_test".to_string(),
        environment: Environment::Development,
        port: 0,
        db_max_connections: 1,
        rate_limit_rps: 1000,
        cors_allowed_origins: None,
        log_level: "warn".to_string(),
        jwt_secret: JWT_SECRET.to_string(),
        jwt_ttl_days: 7,
        max_login_attempts: 5,
        login_lock_minutes: 15,
        gateway: GatewayConfig {
            base_url: "http://gateway.invalid".to_string(),
            key_id: "rzp_test_key".to_string(),
            key_secret: KEY_SECRET.to_string(),
            webhook_secret: WEBHOOK_SECRET.to_string(),
            currency: "INR".to_string(),
            timeout_seconds: 1,
        },
        order_policy: OrderPolicy::default(),
    }
}

/// Gateway double that hands out unique ids and counts calls
#[derive(Default)]
pub struct ScriptedGateway {
    pub order_calls: AtomicUsize,
    pub refund_calls: AtomicUsize,
    pub fail_next: Mutex<bool>,
}

impl ScriptedGateway {
    pub fn order_calls(&self) -> usize {
        self.order_calls.load(Ordering::SeqCst)
    }

    pub fn refund_calls(&self) -> usize {
        self.refund_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentGateway for ScriptedGateway {
    fn key_id(&self) -> &str {
        "rzp_test_key"
    }

    async fn create_order(
        &self,
        amount_minor: i64,
        currency: &str,
        receipt: &str,
    ) -> Result<RemoteOrder, GatewayError> {
        if std::mem::take(&mut *self.fail_next.lock()) {
            return Err(GatewayError::Unavailable("scripted timeout".to_string()));
        }
        self.order_calls.fetch_add(1, Ordering::SeqCst);
        Ok(RemoteOrder {
            id: format!("order_test_{}", Uuid::new_v4().simple()),
            amount: amount_minor,
            currency: currency.to_string(),
            receipt: Some(receipt.to_string()),
        })
    }

    async fn refund(
        &self,
        payment_id: &str,
        amount_minor: i64,
    ) -> Result<RemoteRefund, GatewayError> {
        let n = self.refund_calls.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(RemoteRefund {
            id: format!("rfnd_test_{}", n),
            payment_id: payment_id.to_string(),
            amount: amount_minor,
            status: Some("processed".to_string()),
        })
    }
}

/// Everything a test needs, wired on one in-memory store
pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub gateway: Arc<ScriptedGateway>,
    pub orders: OrderService,
    pub payments: PaymentService,
    pub config: Config,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_policy(OrderPolicy::default())
    }

    pub fn with_policy(policy: OrderPolicy) -> Self {
        let mut config = test_config();
        config.order_policy = policy;

        let store = Arc::new(MemoryStore::new());
        let gateway = Arc::new(ScriptedGateway::default());
        let dyn_store: Arc<dyn Store> = store.clone();
        let orders = OrderService::new(dyn_store, config.order_policy.clone());
        let payments = PaymentService::new(orders.clone(), gateway.clone(), &config.gateway);

        Self {
            store,
            gateway,
            orders,
            payments,
            config,
        }
    }

    pub fn app_state(&self) -> AppState {
        AppState::new(self.store.clone(), self.gateway.clone(), self.config.clone())
    }

    pub async fn user(&self, name: &str, phone: &str, role: UserRole) -> User {
        let mut user = User::new_buyer(name.to_string(), phone.to_string(), "unused".to_string());
        user.role = role;
        self.store.insert_user(&user).await.unwrap();
        user
    }

    pub async fn buyer(&self) -> User {
        self.user("Asha", &unique_phone(), UserRole::Buyer).await
    }

    pub async fn seller(&self) -> User {
        self.user("Loom & Co", &unique_phone(), UserRole::Seller).await
    }

    pub async fn admin(&self) -> User {
        self.user("Ops", &unique_phone(), UserRole::Admin).await
    }

    /// One-variant product at `price` with 10% commission
    pub async fn product(&self, seller: &User, price: i64, stock: i32) -> Product {
        let product = Product::new(seller.id, "Block Print Kurta", Decimal::from(price))
            .with_variant(Variant::new("M", "Indigo", stock));
        self.store.save_product(&product).await.unwrap();
        product
    }

    pub async fn user_by_id(&self, id: Uuid) -> User {
        self.store.get_user(id).await.unwrap().unwrap()
    }

    pub async fn stock_of(&self, product: &Product) -> i32 {
        let stored = self.store.get_product(product.id).await.unwrap().unwrap();
        stored.variants[0].stock
    }
}

pub fn unique_phone() -> String {
    let digits: String = Uuid::new_v4()
        .as_u128()
        .to_string()
        .chars()
        .take(10)
        .collect();
    format!("+91{}", digits)
}

pub fn order_request(
    product: &Product,
    quantity: u32,
    discount: i64,
    payment_method: PaymentMethod,
) -> CreateOrderRequest {
    CreateOrderRequest {
        customer: CustomerSnapshot {
            name: "Asha Rao".to_string(),
            phone: "+919812345678".to_string(),
            address: "12 MG Road".to_string(),
            city: "Bengaluru".to_string(),
            postal_code: "560001".to_string(),
        },
        items: vec![RequestedItem {
            product_id: product.id,
            sku: product.variants[0].sku.clone(),
            quantity,
        }],
        discount: Decimal::from(discount),
        payment_method,
    }
}

pub fn session_token(user: &User) -> String {
    generate_session_token(user, JWT_SECRET, 7).unwrap()
}

pub fn client_signature(remote_order_id: &str, remote_payment_id: &str) -> String {
    signature::sign(
        KEY_SECRET,
        signature::payment_message(remote_order_id, remote_payment_id).as_bytes(),
    )
}

pub fn webhook_signature(body: &[u8]) -> String {
    signature::sign(WEBHOOK_SECRET, body)
}

pub fn captured_event(remote_order_id: &str, remote_payment_id: &str) -> Vec<u8> {
    serde_json::to_vec(&serde_json::json!({
        "entity": "event",
        "event": "payment.captured",
        "payload": {
            "payment": {
                "entity": {
                    "id": remote_payment_id,
                    "order_id": remote_order_id,
                    "status": "captured"
                }
            }
        }
    }))
    .unwrap()
}

pub fn failed_event(remote_order_id: &str, remote_payment_id: &str) -> Vec<u8> {
    serde_json::to_vec(&serde_json::json!({
        "entity": "event",
        "event": "payment.failed",
        "payload": {
            "payment": {
                "entity": {
                    "id": remote_payment_id,
                    "order_id": remote_order_id,
                    "status": "failed",
                    "error_code": "BAD_REQUEST_ERROR"
                }
            }
        }
    }))
    .unwrap()
}
