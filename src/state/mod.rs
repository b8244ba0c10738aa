//! Application state shared across handlers

use axum::extract::FromRef;
use std::sync::Arc;

use crate::auth::AuthService;
use crate::config::Config;
use crate::order::OrderService;
use crate::payment::{PaymentGateway, PaymentService};
use crate::store::Store;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub auth_service: AuthService,
    pub order_service: OrderService,
    pub payment_service: PaymentService,
    pub config: Arc<Config>,
}

impl AppState {
    /// Wire every service onto one store and gateway
    pub fn new(store: Arc<dyn Store>, gateway: Arc<dyn PaymentGateway>, config: Config) -> Self {
        let auth_service = AuthService::new(store.clone(), &config);
        let order_service = OrderService::new(store.clone(), config.order_policy.clone());
        let payment_service =
            PaymentService::new(order_service.clone(), gateway, &config.gateway);

        Self {
            store,
            auth_service,
            order_service,
            payment_service,
            config: Arc::new(config),
        }
    }

    pub fn with_auth_service(mut self, auth_service: AuthService) -> Self {
        self.auth_service = auth_service;
        self
    }
}

impl FromRef<AppState> for AuthService {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.auth_service.clone()
    }
}

impl FromRef<AppState> for OrderService {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.order_service.clone()
    }
}

impl FromRef<AppState> for PaymentService {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.payment_service.clone()
    }
}

impl FromRef<AppState> for Arc<dyn Store> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.store.clone()
    }
}

impl FromRef<AppState> for Arc<Config> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.config.clone()
    }
}
