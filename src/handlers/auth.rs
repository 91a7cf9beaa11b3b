// src/handlers/auth.rs

use axum::{Json, body::Bytes, extract::State, http::HeaderMap, http::StatusCode};

use admin_auth_api::{
    ChangePasswordRequest, LoginRequest, LoginResponse, LogoutRequest, MessageResponse,
    RefreshTokenRequest, RefreshTokenResponse, RegisterRequest, UpdateProfileRequest, UserEnvelope,
};

use super::{client_ip, credential_key, device_info, throttle};
use crate::app::AppState;
use crate::auth::extractors::AuthUser;
use crate::error::AppError;

pub async fn register(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<LoginResponse>), AppError> {
    throttle(state.limiter.as_ref(), &credential_key(&headers, &payload.email))?;

    let response = state.service.register(payload, &device_info(&headers))?;
    tracing::info!(email = %response.user.email, "User registered");
    Ok((StatusCode::CREATED, Json(response)))
}

pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    throttle(state.limiter.as_ref(), &credential_key(&headers, &payload.email))?;

    let response = state.service.login(&payload, &device_info(&headers))?;
    tracing::info!(email = %response.user.email, "User logged in");
    Ok(Json(response))
}

pub async fn refresh(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<RefreshTokenRequest>,
) -> Result<Json<RefreshTokenResponse>, AppError> {
    // No email to key on before verification; the address alone buckets it,
    // under the looser refresh policy
    throttle(state.refresh_limiter.as_ref(), &client_ip(&headers))?;

    let response = state
        .service
        .refresh(&payload.refresh_token, &device_info(&headers))?;
    Ok(Json(response))
}

/// Requires a live access token; once past the guard the revocation itself
/// always reports 200. The body is parsed leniently: a missing, empty or
/// malformed body logs out nothing but still succeeds, so clients can drop
/// local state unconditionally.
pub async fn logout(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    body: Bytes,
) -> Json<MessageResponse> {
    let refresh_token = serde_json::from_slice::<LogoutRequest>(&body)
        .ok()
        .and_then(|payload| payload.refresh_token);

    state.service.logout(refresh_token.as_deref());
    tracing::info!(user_id = %user.id, "User logged out");
    Json(MessageResponse::ok("Logged out successfully"))
}

pub async fn logout_all(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Json<MessageResponse> {
    state.service.logout_all(user.id);
    tracing::info!(user_id = %user.id, "All sessions revoked");
    Json(MessageResponse::ok("Logged out from all devices"))
}

pub async fn me(AuthUser(user): AuthUser) -> Json<UserEnvelope> {
    Json(UserEnvelope { user: user.into() })
}

pub async fn update_profile(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<Json<UserEnvelope>, AppError> {
    let updated = state.service.update_profile(&user, payload)?;
    Ok(Json(UserEnvelope { user: updated }))
}

pub async fn change_password(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    state
        .service
        .change_password(&user, &payload.current_password, &payload.new_password)?;

    tracing::info!(user_id = %user.id, "Password changed, all sessions revoked");
    Ok(Json(MessageResponse::ok(
        "Password changed successfully. Please log in again.",
    )))
}
