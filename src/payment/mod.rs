//! Payment domain module
//!
//! Gateway intents, client-relayed confirmations, webhooks and refunds. All
//! order writes go through the order ledger, so a confirmation arriving on
//! both the client path and the webhook path is applied once.

pub mod gateway;
mod model;
pub mod settlement;
mod service;
pub mod signature;

pub use gateway::{GatewayError, PaymentGateway, RazorpayGateway, RemoteOrder, RemoteRefund};
pub use model::*;
pub use service::PaymentService;

use thiserror::Error;

use crate::order::OrderError;

#[derive(Error, Debug)]
pub enum PaymentError {
    #[error(transparent)]
    Order(#[from] OrderError),

    #[error("Order is already paid")]
    AlreadyPaid,

    #[error("Only paid orders can be refunded")]
    NotRefundable,

    #[error("Order is not payable online")]
    NotGatewayOrder,

    #[error("Order is cancelled")]
    OrderCancelled,

    #[error("Order has no payment intent")]
    NoIntent,

    #[error("Payment verification failed")]
    VerificationFailed,

    #[error("Invalid signature")]
    InvalidSignature,

    #[error("{0}")]
    MalformedEvent(String),

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}
