use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};
use serde::Serialize;
use tower_cookies::Cookies;
use uuid::Uuid;

use crate::{
    error::AppError,
    handlers::AppState,
    models::Role,
    utils::verify_token,
};

pub const AUTH_COOKIE: &str = "auth_token";

/// Identity resolved from the session token, available to handlers as an extension.
#[derive(Debug, Clone, Serialize)]
pub struct CurrentUser {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
}

/// Candidate session tokens: the `auth_token` cookie first, then a bearer header.
pub fn session_tokens(cookies: &Cookies, headers: &HeaderMap) -> Vec<String> {
    let cookie = cookies.get(AUTH_COOKIE).map(|cookie| cookie.value().to_string());
    let bearer = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string());

    cookie
        .into_iter()
        .chain(bearer)
        .filter(|token| !token.is_empty())
        .collect()
}

/// First candidate token that verifies wins, so a stale cookie does not shadow a valid
/// bearer header.
pub fn resolve_user(state: &AppState, cookies: &Cookies, headers: &HeaderMap) -> Option<CurrentUser> {
    session_tokens(cookies, headers).into_iter().find_map(|token| {
        let claims = verify_token(&token, &state.config.jwt_secret)
            .map_err(|err| log::debug!("Rejected session token: {}", err))
            .ok()?;

        Some(CurrentUser {
            id: claims.user_id()?,
            email: claims.email,
            role: claims.role,
        })
    })
}

pub async fn require_auth(
    State(state): State<AppState>,
    cookies: Cookies,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let user = resolve_user(&state, &cookies, request.headers())
        .ok_or(AppError::Unauthorized("Unauthorized"))?;

    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}
