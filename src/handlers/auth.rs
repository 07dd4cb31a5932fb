use axum::{extract::State, Extension, Json};
use serde_json::{json, Value};
use tower_cookies::{cookie::SameSite, Cookie, Cookies};

use super::{message, AppState, JsonBody};
use crate::{
    error::{AppError, AppResult},
    middleware::{CurrentUser, AUTH_COOKIE},
    models::{LoginRequest, UserResponse},
    utils::{create_token, verify_password},
};

pub async fn login(
    State(state): State<AppState>,
    cookies: Cookies,
    JsonBody(form): JsonBody<LoginRequest>,
) -> AppResult<Json<Value>> {
    let email = form.email.map(|e| e.trim().to_lowercase()).filter(|e| !e.is_empty());
    let password = form.password.filter(|p| !p.is_empty());
    let (email, password) = match (email, password) {
        (Some(email), Some(password)) => (email, password),
        _ => return Err(AppError::validation("Email and password are required")),
    };

    let user = state
        .store()
        .find_user_by_email(&email)
        .await?
        .ok_or(AppError::Unauthorized("Invalid credentials"))?;

    if !verify_password(&password, &user.password_hash).unwrap_or(false) {
        log::info!("Failed login for {}", email);
        return Err(AppError::Unauthorized("Invalid credentials"));
    }

    let ttl_hours = state.config.session_ttl_hours;
    let token = create_token(&user, &state.config.jwt_secret, ttl_hours)
        .map_err(|err| AppError::Internal(format!("failed to sign session token: {}", err)))?;

    // Set secure HTTP-only cookie with JWT token
    let cookie = Cookie::build((AUTH_COOKIE, token.clone()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Strict)
        .secure(state.config.cookie_secure)
        .max_age(time::Duration::hours(ttl_hours))
        .build();
    cookies.add(cookie);

    log::info!("User {} logged in", user.email);
    Ok(Json(json!({
        "user": UserResponse::from(user),
        "token": token,
    })))
}

pub async fn logout(cookies: Cookies) -> Json<Value> {
    cookies.remove(Cookie::build((AUTH_COOKIE, "")).path("/").build());
    message("Logged out successfully")
}

pub async fn me(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> AppResult<Json<Value>> {
    let user = state
        .store()
        .find_user(current.id)
        .await?
        .ok_or(AppError::NotFound("User"))?;

    Ok(Json(json!({ "user": UserResponse::from(user) })))
}
