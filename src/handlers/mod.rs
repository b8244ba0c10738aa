//! HTTP handlers for Bazaar API

pub mod auth;
pub mod health;
pub mod orders;
pub mod payment;
