// src/error.rs

use admin_auth_api::ErrorResponse;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// Application error taxonomy. Expected failures (bad credentials, expired
/// tokens, conflicts) are structured results the handlers map to status
/// codes; only genuinely unexpected conditions become 500s.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AppError {
    // === Credential errors (uniform 401, no account enumeration) ===
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("Account has been deactivated")]
    AccountDeactivated,

    // === Access token errors ===
    #[error("Access token is required")]
    MissingToken,
    #[error("Invalid access token")]
    InvalidToken,
    #[error("Access token has expired")]
    TokenExpired,

    // === Refresh session errors (revoked/rotated/expired/never existed: one shape) ===
    #[error("Invalid or expired refresh token")]
    InvalidRefreshToken,

    // === Authorization ===
    #[error("Insufficient permissions")]
    Forbidden,

    // === Conflicts & validation ===
    #[error("Email is already taken")]
    EmailTaken,
    #[error("Invalid email format")]
    InvalidEmail,
    #[error("Password too weak: {0}")]
    WeakPassword(String),
    #[error("Current password is incorrect")]
    WrongPassword,
    #[error("Validation error: {0}")]
    Validation(String),

    // === Not found ===
    #[error("Not found: {0}")]
    NotFound(String),

    // === Rate limiting ===
    #[error("Too many authentication attempts. Please try again later.")]
    TooManyAttempts { retry_after_secs: u64 },

    // === Internal errors (detail logged, not surfaced) ===
    #[error("Database error: {0}")]
    Database(String),
    #[error("Password hashing failed: {0}")]
    Hashing(String),
    #[error("Token generation failed: {0}")]
    TokenGeneration(String),
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// (status, machine-readable code, public message, retry-after, internal detail)
    fn error_info(&self) -> (StatusCode, &'static str, String, Option<u64>, Option<String>) {
        match self {
            // 401 Unauthorized
            AppError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                "INVALID_CREDENTIALS",
                self.to_string(),
                None,
                None,
            ),
            AppError::AccountDeactivated => (
                StatusCode::UNAUTHORIZED,
                "ACCOUNT_DEACTIVATED",
                self.to_string(),
                None,
                None,
            ),
            AppError::MissingToken => (
                StatusCode::UNAUTHORIZED,
                "MISSING_TOKEN",
                self.to_string(),
                None,
                None,
            ),
            AppError::InvalidToken => (
                StatusCode::UNAUTHORIZED,
                "INVALID_TOKEN",
                self.to_string(),
                None,
                None,
            ),
            // Distinct code so clients can attempt a silent refresh
            AppError::TokenExpired => (
                StatusCode::UNAUTHORIZED,
                "TOKEN_EXPIRED",
                self.to_string(),
                None,
                None,
            ),
            AppError::InvalidRefreshToken => (
                StatusCode::UNAUTHORIZED,
                "INVALID_REFRESH_TOKEN",
                self.to_string(),
                None,
                None,
            ),

            // 403 Forbidden: identity established, role insufficient
            AppError::Forbidden => (
                StatusCode::FORBIDDEN,
                "FORBIDDEN",
                self.to_string(),
                None,
                None,
            ),

            // 400 Bad Request
            AppError::EmailTaken => (
                StatusCode::BAD_REQUEST,
                "EMAIL_TAKEN",
                "User with this email already exists".to_string(),
                None,
                None,
            ),
            AppError::InvalidEmail => (
                StatusCode::BAD_REQUEST,
                "INVALID_EMAIL",
                self.to_string(),
                None,
                None,
            ),
            AppError::WeakPassword(msg) => (
                StatusCode::BAD_REQUEST,
                "WEAK_PASSWORD",
                msg.clone(),
                None,
                None,
            ),
            AppError::WrongPassword => (
                StatusCode::BAD_REQUEST,
                "WRONG_PASSWORD",
                self.to_string(),
                None,
                None,
            ),
            AppError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
                msg.clone(),
                None,
                None,
            ),

            // 404 Not Found
            AppError::NotFound(msg) => {
                (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone(), None, None)
            }

            // 429 Too Many Requests
            AppError::TooManyAttempts { retry_after_secs } => (
                StatusCode::TOO_MANY_REQUESTS,
                "TOO_MANY_ATTEMPTS",
                self.to_string(),
                Some(*retry_after_secs),
                None,
            ),

            // 500 Internal Server Error
            AppError::Database(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "DATABASE_ERROR",
                "An error occurred with the database".to_string(),
                None,
                Some(msg.clone()),
            ),
            AppError::Hashing(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "HASHING_ERROR",
                "An error occurred while processing your request".to_string(),
                None,
                Some(msg.clone()),
            ),
            AppError::TokenGeneration(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "TOKEN_ERROR",
                "An error occurred while generating token".to_string(),
                None,
                Some(msg.clone()),
            ),
            AppError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal server error occurred".to_string(),
                None,
                Some(msg.clone()),
            ),
        }
    }

    // === Constructor helpers ===
    pub fn not_found(msg: impl Into<String>) -> Self {
        AppError::NotFound(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        AppError::Internal(msg.into())
    }

    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        self.error_info().0
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_code, message, retry_after, internal_detail) = self.error_info();

        if let Some(ref detail) = internal_detail {
            tracing::error!(error_code, %status, %detail, "Internal server error");
        }

        let body = Json(ErrorResponse {
            error: error_code.to_string(),
            message,
            retry_after,
            details: None,
        });

        (status, body).into_response()
    }
}

// === Conversions from lower-level error types ===

impl From<crate::store::RepositoryError> for AppError {
    fn from(err: crate::store::RepositoryError) -> Self {
        use crate::store::RepositoryError;

        match err {
            RepositoryError::NotFound(msg) => AppError::not_found(msg),
            RepositoryError::UniqueTokenExhausted => AppError::TokenGeneration(err.to_string()),
            RepositoryError::Pool(msg)
            | RepositoryError::UniqueViolation(msg)
            | RepositoryError::ForeignKeyViolation(msg)
            | RepositoryError::Database(msg) => AppError::Database(msg),
        }
    }
}

impl From<crate::auth::password::PasswordError> for AppError {
    fn from(err: crate::auth::password::PasswordError) -> Self {
        AppError::Hashing(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_errors_map_to_401() {
        assert_eq!(
            AppError::InvalidCredentials.status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AppError::AccountDeactivated.status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AppError::InvalidRefreshToken.status_code(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn forbidden_is_403_not_401() {
        assert_eq!(AppError::Forbidden.status_code(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn email_taken_is_400() {
        assert_eq!(AppError::EmailTaken.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn rate_limit_maps_to_429_with_retry_after() {
        let err = AppError::TooManyAttempts { retry_after_secs: 42 };
        assert_eq!(err.status_code(), StatusCode::TOO_MANY_REQUESTS);

        let (_, _, _, retry_after, _) = err.error_info();
        assert_eq!(retry_after, Some(42));
    }

    #[test]
    fn store_errors_map_to_500() {
        let err: AppError = crate::store::RepositoryError::Pool("down".to_string()).into();
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn not_found_into_response_sets_404_status() {
        let response = AppError::not_found("Session not found").into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
