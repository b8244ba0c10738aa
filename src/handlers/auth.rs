//! Authentication HTTP handlers
//!
//! Phone + password login with the session token in an HTTP-only cookie.

use axum::{extract::State, http::StatusCode, Json};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use validator::Validate;

use crate::error::ApiError;
use crate::middleware::{AuthenticatedUser, SESSION_COOKIE};
use crate::models::{
    LoginRequest, LogoutAllResponse, MessageResponse, RegisterRequest, SessionResponse,
    UserResponse,
};
use crate::state::AppState;

fn session_cookie(token: String, ttl_seconds: i64, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::seconds(ttl_seconds))
        .build()
}

fn expired_session_cookie() -> Cookie<'static> {
    Cookie::build(SESSION_COOKIE).path("/").build()
}

/// POST /api/auth/register
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    request.validate()?;
    let user = state.auth_service.register(request).await?;
    Ok((StatusCode::CREATED, Json(user.into())))
}

/// POST /api/auth/login - Check credentials and set the session cookie
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(request): Json<LoginRequest>,
) -> Result<(CookieJar, Json<SessionResponse>), ApiError> {
    request.validate()?;
    let (user, token) = state.auth_service.login(request).await?;

    let ttl = state.auth_service.session_ttl_seconds();
    let secure = state.config.environment.is_production();
    let jar = jar.add(session_cookie(token.clone(), ttl, secure));

    Ok((
        jar,
        Json(SessionResponse {
            message: "Login successful".to_string(),
            token,
            expires_in: ttl,
            user: user.into(),
        }),
    ))
}

/// POST /api/auth/logout - Clear the session cookie
pub async fn logout(jar: CookieJar) -> (CookieJar, Json<MessageResponse>) {
    (
        jar.remove(expired_session_cookie()),
        Json(MessageResponse::new("Logged out")),
    )
}

/// POST /api/auth/logout-all - Revoke every session of the caller
pub async fn logout_all(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    jar: CookieJar,
) -> Result<(CookieJar, Json<LogoutAllResponse>), ApiError> {
    let token_version = state.auth_service.logout_all(user.user_id).await?;
    Ok((
        jar.remove(expired_session_cookie()),
        Json(LogoutAllResponse { token_version }),
    ))
}

/// GET /api/auth/me
pub async fn me(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<UserResponse>, ApiError> {
    let user = state.auth_service.get_user(user.user_id).await?;
    Ok(Json(user.into()))
}
