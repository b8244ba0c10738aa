//! Session token generation and validation
//!
//! Tokens carry the account's `token_version`; bumping the stored version
//! invalidates every token issued before it.

use chrono::{Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{User, UserRole};

#[derive(Error, Debug)]
pub enum JwtError {
    #[error("Could not sign session token: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),

    #[error("Session token expired")]
    TokenExpired,

    #[error("Malformed session token: {0}")]
    Malformed(String),
}

/// Session claims
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Account id
    pub sub: String,
    pub role: String,
    /// Must equal the account's stored `token_version`
    pub token_version: i32,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    fn for_user(user: &User, ttl: Duration) -> Self {
        let issued = Utc::now();
        Self {
            sub: user.id.to_string(),
            role: user.role.as_str().to_string(),
            token_version: user.token_version,
            iat: issued.timestamp(),
            exp: (issued + ttl).timestamp(),
        }
    }

    pub fn user_id(&self) -> Result<Uuid, JwtError> {
        Uuid::parse_str(&self.sub).map_err(|e| JwtError::Malformed(e.to_string()))
    }

    pub fn role(&self) -> Result<UserRole, JwtError> {
        UserRole::parse(&self.role)
            .ok_or_else(|| JwtError::Malformed(format!("unknown role {}", self.role)))
    }
}

pub fn generate_session_token(user: &User, secret: &str, ttl_days: i64) -> Result<String, JwtError> {
    let claims = Claims::for_user(user, Duration::days(ttl_days));
    let token = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;
    Ok(token)
}

/// Check signature and expiry. The token version is compared by the caller
/// against the stored account.
pub fn verify_token(token: &str, secret: &str) -> Result<Claims, JwtError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;
    validation.set_required_spec_claims(&["exp", "sub"]);

    decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => JwtError::TokenExpired,
            _ => JwtError::Malformed(e.to_string()),
        })
}
