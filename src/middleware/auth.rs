//! Authentication middleware
//!
//! Extractors that resolve the session token (the `token` cookie, or an
//! `Authorization: Bearer` header) to a live account and enforce roles.

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use axum_extra::{extract::cookie::CookieJar, TypedHeader};
use headers::{authorization::Bearer, Authorization};
use uuid::Uuid;

use crate::auth::AuthService;
use crate::error::ApiError;
use crate::models::UserRole;

/// Name of the HTTP-only session cookie
pub const SESSION_COOKIE: &str = "token";

/// Authenticated user extracted from the session token
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    pub role: UserRole,
    pub token_version: i32,
}

impl AuthenticatedUser {
    /// 403 unless the user's role grants `required`
    pub fn require(&self, required: UserRole) -> Result<(), ApiError> {
        if self.role.grants(required) {
            Ok(())
        } else {
            Err(ApiError::Forbidden(format!(
                "{} access required",
                required.as_str()
            )))
        }
    }
}

async fn session_token<S>(parts: &mut Parts, state: &S) -> Option<String>
where
    S: Send + Sync,
{
    let jar = CookieJar::from_headers(&parts.headers);
    if let Some(cookie) = jar.get(SESSION_COOKIE).filter(|c| !c.value().is_empty()) {
        return Some(cookie.value().to_string());
    }

    TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
        .await
        .ok()
        .map(|TypedHeader(Authorization(bearer))| bearer.token().to_string())
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    AuthService: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = session_token(parts, state)
            .await
            .ok_or_else(|| ApiError::Unauthorized("Not authenticated".to_string()))?;

        let auth_service = AuthService::from_ref(state);
        let user = auth_service.authenticate(&token).await?;

        Ok(AuthenticatedUser {
            user_id: user.id,
            role: user.role,
            token_version: user.token_version,
        })
    }
}

/// Requires the admin role
pub struct AdminUser(pub AuthenticatedUser);

#[async_trait]
impl<S> FromRequestParts<S> for AdminUser
where
    AuthService: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = AuthenticatedUser::from_request_parts(parts, state).await?;
        user.require(UserRole::Admin)?;
        Ok(AdminUser(user))
    }
}
