//! Request guards. `AuthUser` resolves the bearer token into a live user on
//! every request; handlers taking it as an argument are authenticated by
//! construction.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

use crate::app::AppState;
use crate::db::models::user::{Role, User};
use crate::error::AppError;

fn bearer_token(parts: &Parts) -> Result<&str, AppError> {
    let header = parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or(AppError::MissingToken)?;

    header.strip_prefix("Bearer ").ok_or(AppError::MissingToken)
}

/// The authenticated caller. Rejects with 401 when the token is missing,
/// malformed, expired, or resolves to a missing or deactivated account.
pub struct AuthUser(pub User);

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;
        let user = state.service.authenticate(token)?;
        Ok(AuthUser(user))
    }
}

/// Identity when present, `None` otherwise. Never rejects: endpoints using
/// this behave identically for anonymous and badly-authenticated callers.
pub struct OptionalAuthUser(pub Option<User>);

impl FromRequestParts<AppState> for OptionalAuthUser {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = bearer_token(parts)
            .ok()
            .and_then(|token| state.service.authenticate(token).ok());
        Ok(OptionalAuthUser(user))
    }
}

/// `AuthUser` plus a role check: authentication failures stay 401, an
/// authenticated non-admin gets 403.
pub struct AdminUser(pub User);

impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let AuthUser(user) = AuthUser::from_request_parts(parts, state).await?;
        if user.role != Role::Admin {
            return Err(AppError::Forbidden);
        }
        Ok(AdminUser(user))
    }
}
