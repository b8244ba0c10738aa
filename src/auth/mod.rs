//! Authentication module for Bazaar
//!
//! Phone + password accounts with bcrypt hashes, login throttling and
//! JWT sessions that can be revoked wholesale through `token_version`.

mod crypto;
mod jwt;
mod service;

pub use crypto::{hash_password_with_cost, verify_password};
pub use jwt::{generate_session_token, verify_token, Claims, JwtError};
pub use service::AuthService;

use thiserror::Error;

use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Session expired, please log in again")]
    SessionExpired,

    #[error(transparent)]
    Token(#[from] JwtError),

    #[error("Account is blocked")]
    AccountBlocked,

    #[error("Account temporarily locked after repeated failed logins")]
    AccountLocked,

    #[error("User not found")]
    UserNotFound,

    #[error("Phone number already registered")]
    PhoneTaken,

    #[error("Password hashing failed: {0}")]
    Hashing(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}
