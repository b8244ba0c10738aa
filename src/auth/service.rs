//! Authentication service - accounts, login throttling and session checks

use chrono::Duration;
use sqlx::types::chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use super::crypto::{hash_password_with_cost, verify_password};
use super::jwt::{generate_session_token, verify_token, JwtError};
use super::AuthError;
use crate::config::Config;
use crate::models::{LoginRequest, RegisterRequest, User};
use crate::store::{Store, StoreError};

#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn Store>,
    jwt_secret: String,
    jwt_ttl_days: i64,
    max_login_attempts: i32,
    lock_duration: Duration,
    hash_cost: u32,
}

impl AuthService {
    pub fn new(store: Arc<dyn Store>, config: &Config) -> Self {
        Self {
            store,
            jwt_secret: config.jwt_secret.clone(),
            jwt_ttl_days: config.jwt_ttl_days,
            max_login_attempts: config.max_login_attempts,
            lock_duration: Duration::minutes(config.login_lock_minutes),
            hash_cost: bcrypt::DEFAULT_COST,
        }
    }

    /// Lower the bcrypt cost; only sensible in tests
    pub fn with_hash_cost(mut self, cost: u32) -> Self {
        self.hash_cost = cost;
        self
    }

    pub fn session_ttl_seconds(&self) -> i64 {
        self.jwt_ttl_days * 24 * 60 * 60
    }

    pub async fn register(&self, request: RegisterRequest) -> Result<User, AuthError> {
        if self.store.find_user_by_phone(&request.phone).await?.is_some() {
            return Err(AuthError::PhoneTaken);
        }

        let cost = self.hash_cost;
        let password = request.password;
        let password_hash =
            tokio::task::spawn_blocking(move || hash_password_with_cost(&password, cost))
                .await
                .map_err(|e| AuthError::Hashing(e.to_string()))??;

        let user = User::new_buyer(request.name.trim().to_string(), request.phone, password_hash);
        self.store.insert_user(&user).await.map_err(|e| match e {
            StoreError::Duplicate(_) => AuthError::PhoneTaken,
            other => other.into(),
        })?;

        tracing::info!(user_id = %user.id, "Account registered");
        Ok(user)
    }

    /// Check credentials and issue a session token
    pub async fn login(&self, request: LoginRequest) -> Result<(User, String), AuthError> {
        let now = Utc::now();
        let user = self
            .store
            .find_user_by_phone(&request.phone)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if user.is_blocked {
            return Err(AuthError::AccountBlocked);
        }
        if user.is_locked(now) {
            return Err(AuthError::AccountLocked);
        }

        let password = request.password;
        let hash = user.password_hash.clone();
        let valid = tokio::task::spawn_blocking(move || verify_password(&password, &hash))
            .await
            .map_err(|e| AuthError::Hashing(e.to_string()))?;

        if !valid {
            self.store
                .record_failed_login(user.id, self.max_login_attempts, now + self.lock_duration)
                .await?;
            tracing::warn!(
                user_id = %user.id,
                attempts = user.failed_login_attempts + 1,
                "Failed login attempt"
            );
            return Err(AuthError::InvalidCredentials);
        }

        self.store.record_successful_login(user.id, now).await?;
        let token = generate_session_token(&user, &self.jwt_secret, self.jwt_ttl_days)?;

        tracing::info!(user_id = %user.id, role = %user.role.as_str(), "User logged in");
        Ok((user, token))
    }

    /// Invalidate every session of the user
    pub async fn logout_all(&self, user_id: Uuid) -> Result<i32, AuthError> {
        let version = self.store.bump_token_version(user_id).await?;
        tracing::info!(user_id = %user_id, token_version = version, "All sessions revoked");
        Ok(version)
    }

    pub async fn get_user(&self, user_id: Uuid) -> Result<User, AuthError> {
        self.store
            .get_user(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)
    }

    /// Resolve a session token to a live, unblocked account
    pub async fn authenticate(&self, token: &str) -> Result<User, AuthError> {
        let claims = verify_token(token, &self.jwt_secret).map_err(|e| match e {
            JwtError::TokenExpired => AuthError::SessionExpired,
            other => AuthError::Token(other),
        })?;
        let user_id = claims.user_id()?;

        let user = self
            .store
            .get_user(user_id)
            .await?
            .ok_or(AuthError::SessionExpired)?;

        if user.is_blocked {
            return Err(AuthError::AccountBlocked);
        }
        if claims.token_version != user.token_version {
            return Err(AuthError::SessionExpired);
        }
        Ok(user)
    }
}
