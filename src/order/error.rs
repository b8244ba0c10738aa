use thiserror::Error;
use uuid::Uuid;

use super::model::OrderStatus;
use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum OrderError {
    #[error("{0}")]
    Validation(String),

    #[error("Order not found")]
    NotFound,

    #[error("Product {0} not found")]
    ProductNotFound(Uuid),

    #[error("Cannot move order from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    #[error("Order can no longer be cancelled (status {0})")]
    NotCancellable(OrderStatus),

    #[error("Order is already cancelled")]
    AlreadyCancelled,

    #[error("Returns can only be requested for delivered orders")]
    ReturnNotAllowed,

    #[error("Return already requested")]
    ReturnAlreadyRequested,

    #[error("Order was modified concurrently, please retry")]
    Contention,

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<validator::ValidationErrors> for OrderError {
    fn from(err: validator::ValidationErrors) -> Self {
        OrderError::Validation(err.to_string())
    }
}
