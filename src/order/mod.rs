//! Order domain module
//!
//! Checkout pricing, the fulfillment state machine and the optimistic
//! write loop every later mutation goes through.

mod error;
pub mod ledger;
pub mod lifecycle;
mod model;
pub mod pricing;
mod service;

pub use error::OrderError;
pub use ledger::Outcome;
pub use model::*;
pub use service::{render_csv, OrderService, CSV_HEADER};
