//! Payment gateway adapter
//!
//! Talks to a Razorpay-compatible REST API over `reqwest` with basic auth.
//! Every call is bounded by the configured timeout and surfaces as a
//! retryable [`GatewayError`] instead of hanging the request.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::config::GatewayConfig;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Gateway unreachable: {0}")]
    Unavailable(String),

    #[error("Gateway rejected the request with status {0}")]
    Rejected(u16),

    #[error("Unexpected gateway response: {0}")]
    InvalidResponse(String),
}

/// Gateway-side order (the remote intent)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RemoteOrder {
    pub id: String,
    pub amount: i64,
    pub currency: String,
    #[serde(default)]
    pub receipt: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RemoteRefund {
    pub id: String,
    pub payment_id: String,
    pub amount: i64,
    #[serde(default)]
    pub status: Option<String>,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Public key handed to the checkout widget
    fn key_id(&self) -> &str;

    /// Create a remote order for `amount_minor` (paise)
    async fn create_order(
        &self,
        amount_minor: i64,
        currency: &str,
        receipt: &str,
    ) -> Result<RemoteOrder, GatewayError>;

    async fn refund(&self, payment_id: &str, amount_minor: i64)
        -> Result<RemoteRefund, GatewayError>;
}

pub struct RazorpayGateway {
    client: reqwest::Client,
    base_url: String,
    key_id: String,
    key_secret: String,
}

impl RazorpayGateway {
    pub fn new(config: &GatewayConfig) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| GatewayError::Unavailable(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            key_id: config.key_id.clone(),
            key_secret: config.key_secret.clone(),
        })
    }

    async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<T, GatewayError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .post(&url)
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(path = %path, error = %e, "Gateway request failed");
                GatewayError::Unavailable(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            tracing::warn!(
                path = %path,
                status = status.as_u16(),
                detail = %detail,
                "Gateway rejected request"
            );
            return Err(GatewayError::Rejected(status.as_u16()));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl PaymentGateway for RazorpayGateway {
    fn key_id(&self) -> &str {
        &self.key_id
    }

    async fn create_order(
        &self,
        amount_minor: i64,
        currency: &str,
        receipt: &str,
    ) -> Result<RemoteOrder, GatewayError> {
        self.post(
            "/v1/orders",
            serde_json::json!({
                "amount": amount_minor,
                "currency": currency,
                "receipt": receipt,
            }),
        )
        .await
    }

    async fn refund(
        &self,
        payment_id: &str,
        amount_minor: i64,
    ) -> Result<RemoteRefund, GatewayError> {
        self.post(
            &format!("/v1/payments/{}/refund", payment_id),
            serde_json::json!({ "amount": amount_minor }),
        )
        .await
    }
}
