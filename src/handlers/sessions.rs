use axum::{
    Json,
    extract::{Path, State},
};
use uuid::Uuid;

use admin_auth_api::{CleanupResponse, MessageResponse, SessionListResponse};

use crate::app::AppState;
use crate::auth::extractors::{AdminUser, AuthUser};
use crate::error::AppError;

pub async fn list_sessions(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<SessionListResponse>, AppError> {
    Ok(Json(state.service.list_sessions(user.id)?))
}

pub async fn revoke_session(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(session_id): Path<Uuid>,
) -> Result<Json<MessageResponse>, AppError> {
    state.service.revoke_session(user.id, session_id)?;
    Ok(Json(MessageResponse::ok("Session revoked")))
}

/// Admin-only garbage collection of expired and revoked records.
pub async fn cleanup_sessions(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
) -> Result<Json<CleanupResponse>, AppError> {
    let removed = state.service.cleanup_sessions()?;
    tracing::info!(admin_id = %admin.id, removed, "Session cleanup completed");
    Ok(Json(CleanupResponse {
        success: true,
        removed,
    }))
}
