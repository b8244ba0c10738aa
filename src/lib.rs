//! Bazaar Backend Library
//!
//! Order and payment lifecycle for a multi-vendor fashion marketplace:
//! checkout with atomic stock reservation, gateway intents, signed
//! confirmations and webhooks, refunds, and exactly-once seller payouts.

pub mod auth;
pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod order;
pub mod payment;
pub mod routes;
pub mod state;
pub mod store;
