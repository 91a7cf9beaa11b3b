// src/auth/services.rs

use std::sync::Arc;

use chrono::{Duration, Utc};
use uuid::Uuid;

use admin_auth_api::{
    LoginRequest, LoginResponse, RefreshTokenResponse, RegisterRequest, SessionListResponse,
    UpdateProfileRequest, UserResponse,
};

use crate::auth::jwt::{TokenCodec, TokenError};
use crate::auth::password::PasswordManager;
use crate::db::models::user::{NewUser, Role, UpdateUser, User};
use crate::error::AppError;
use crate::store::{DeviceInfo, SessionStore, UserStore};

const WEAK_PASSWORD_MESSAGE: &str =
    "Password must be at least 8 characters with uppercase, lowercase and numbers";

/// Session Orchestrator: composes the token codec and the stores into the
/// observable authentication behavior (issuance, rotation, revocation).
pub struct SessionService {
    codec: TokenCodec,
    users: Arc<dyn UserStore>,
    sessions: Arc<dyn SessionStore>,
    refresh_ttl_days: i64,
}

impl SessionService {
    pub fn new(
        codec: TokenCodec,
        users: Arc<dyn UserStore>,
        sessions: Arc<dyn SessionStore>,
        refresh_ttl_days: i64,
    ) -> Self {
        Self {
            codec,
            users,
            sessions,
            refresh_ttl_days,
        }
    }

    /// Registration: duplicate email is a 400, then the token-issuance tail
    /// runs exactly as for login (no separate login step required).
    pub fn register(
        &self,
        request: RegisterRequest,
        device: &DeviceInfo,
    ) -> Result<LoginResponse, AppError> {
        let email = normalize_email(&request.email);
        if !is_valid_email(&email) {
            return Err(AppError::InvalidEmail);
        }
        let name = request.name.trim();
        if name.is_empty() {
            return Err(AppError::validation("Name is required"));
        }
        if !PasswordManager::is_strong(&request.password) {
            return Err(AppError::WeakPassword(WEAK_PASSWORD_MESSAGE.to_string()));
        }

        if self.users.find_by_email(&email)?.is_some() {
            return Err(AppError::EmailTaken);
        }

        let password_hash = PasswordManager::hash(&request.password)?;
        let user = self.users.create(&NewUser {
            email,
            name: name.to_string(),
            password_hash,
            role: Role::User,
        })?;

        self.issue_for(user, device)
    }

    /// Login. Unknown email and wrong password produce the identical error;
    /// the caller cannot probe which accounts exist.
    pub fn login(
        &self,
        request: &LoginRequest,
        device: &DeviceInfo,
    ) -> Result<LoginResponse, AppError> {
        let email = normalize_email(&request.email);

        let Some(user) = self.users.find_by_email(&email)? else {
            return Err(AppError::InvalidCredentials);
        };
        if !user.is_active {
            return Err(AppError::AccountDeactivated);
        }
        if !PasswordManager::verify_secret(&request.password, &user.password_hash)? {
            return Err(AppError::InvalidCredentials);
        }

        self.issue_for(user, device)
    }

    /// Exchanges a refresh token for a new pair, rotating the backing record:
    /// a refresh token is single-use, and reuse after rotation fails even
    /// while the JWT itself is cryptographically live.
    pub fn refresh(
        &self,
        refresh_jwt: &str,
        device: &DeviceInfo,
    ) -> Result<RefreshTokenResponse, AppError> {
        // Any verification failure collapses into one 401
        let claims = self
            .codec
            .verify_refresh(refresh_jwt)
            .map_err(|_| AppError::InvalidRefreshToken)?;

        // The record, not the JWT, decides whether the session is alive
        let record = self
            .sessions
            .find_valid(claims.token_id)?
            .ok_or(AppError::InvalidRefreshToken)?;
        if record.user_id != claims.sub {
            return Err(AppError::InvalidRefreshToken);
        }

        let user = match self.users.find_by_id(record.user_id)? {
            Some(user) if user.is_active => user,
            _ => {
                // Dead user: retire the session immediately
                if let Err(e) = self.sessions.revoke(record.id) {
                    tracing::warn!("Failed to revoke session {} for dead user: {e}", record.id);
                }
                return Err(AppError::InvalidRefreshToken);
            }
        };

        // Best effort, not on the validity path
        if let Err(e) = self.sessions.touch_last_used(record.id) {
            tracing::warn!("Failed to touch last_used on session {}: {e}", record.id);
        }

        // Create the replacement first, then revoke the predecessor. A crash
        // in between leaves the old record live until its own expiry, which
        // is the accepted bound on double-use.
        let (access_token, refresh_token) = self.mint_pair(&user, device)?;
        self.sessions.revoke(record.id)?;

        Ok(RefreshTokenResponse {
            access_token,
            refresh_token,
            expires_in: self.codec.access_ttl_seconds(),
        })
    }

    /// Revokes the session behind a refresh token (JWT or raw opaque value).
    /// Logout must always appear to succeed: every failure is swallowed.
    pub fn logout(&self, refresh_token: Option<&str>) {
        let Some(token) = refresh_token else { return };

        let record_id = match self.codec.verify_refresh(token) {
            Ok(claims) => Some(claims.token_id),
            // Not a (valid) JWT: fall back to a raw opaque token lookup
            Err(_) => match self.sessions.find_by_token(token) {
                Ok(record) => record.map(|r| r.id),
                Err(e) => {
                    tracing::warn!("Logout token lookup failed: {e}");
                    None
                }
            },
        };

        if let Some(id) = record_id
            && let Err(e) = self.sessions.revoke(id)
        {
            tracing::warn!("Logout failed to revoke session {id}: {e}");
        }
    }

    /// Revokes every session of the user. Always succeeds observably.
    pub fn logout_all(&self, user_id: Uuid) {
        if let Err(e) = self.sessions.revoke_all_for_user(user_id) {
            tracing::error!("Logout-all failed for user {user_id}: {e}");
        }
    }

    /// Stateless-then-stateful gate used by the auth guard: verifies the
    /// bearer access token and resolves it to an active user.
    pub fn authenticate(&self, access_token: &str) -> Result<User, AppError> {
        let claims = self.codec.verify_access(access_token).map_err(|e| match e {
            TokenError::Expired => AppError::TokenExpired,
            _ => AppError::InvalidToken,
        })?;

        let user = self
            .users
            .find_by_id(claims.sub)?
            .ok_or(AppError::InvalidToken)?;
        if !user.is_active {
            return Err(AppError::AccountDeactivated);
        }
        Ok(user)
    }

    /// Password change always invalidates every existing session, including
    /// the one making the request.
    pub fn change_password(
        &self,
        user: &User,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), AppError> {
        if !PasswordManager::verify_secret(current_password, &user.password_hash)? {
            return Err(AppError::WrongPassword);
        }
        if !PasswordManager::is_strong(new_password) {
            return Err(AppError::WeakPassword(WEAK_PASSWORD_MESSAGE.to_string()));
        }

        let new_hash = PasswordManager::hash(new_password)?;
        self.users.update_password(user.id, &new_hash)?;
        self.sessions.revoke_all_for_user(user.id)?;
        Ok(())
    }

    pub fn update_profile(
        &self,
        user: &User,
        request: UpdateProfileRequest,
    ) -> Result<UserResponse, AppError> {
        let mut changes = UpdateUser::default();

        if let Some(name) = request.name {
            let name = name.trim().to_string();
            if name.is_empty() {
                return Err(AppError::validation("Name cannot be empty"));
            }
            changes.name = Some(name);
        }

        if let Some(email) = request.email {
            let email = normalize_email(&email);
            if !is_valid_email(&email) {
                return Err(AppError::InvalidEmail);
            }
            if email != user.email {
                if self.users.find_by_email(&email)?.is_some() {
                    return Err(AppError::EmailTaken);
                }
                changes.email = Some(email);
                // A new address starts unverified
                changes.email_verified = Some(false);
            }
        }

        if changes.name.is_none() && changes.email.is_none() {
            return Ok(user.clone().into());
        }

        let updated = self.users.update_profile(user.id, &changes)?;
        Ok(updated.into())
    }

    pub fn list_sessions(&self, user_id: Uuid) -> Result<SessionListResponse, AppError> {
        let sessions = self
            .sessions
            .list_active_for_user(user_id)?
            .into_iter()
            .map(Into::into)
            .collect();
        Ok(SessionListResponse { sessions })
    }

    /// Revokes one of the caller's own sessions; 404 when the id does not
    /// resolve within their records.
    pub fn revoke_session(&self, user_id: Uuid, session_id: Uuid) -> Result<(), AppError> {
        let record = self
            .sessions
            .find_for_user(session_id, user_id)?
            .ok_or_else(|| AppError::not_found("Session not found"))?;

        self.sessions.revoke(record.id)?;
        Ok(())
    }

    /// Garbage collection of expired and revoked records. Space reclamation
    /// only; validity never depends on this running.
    pub fn cleanup_sessions(&self) -> Result<usize, AppError> {
        Ok(self.sessions.cleanup()?)
    }

    /// Issuance tail shared by login and register: persist the session
    /// record, mint the pair, record the login.
    fn issue_for(&self, user: User, device: &DeviceInfo) -> Result<LoginResponse, AppError> {
        let (access_token, refresh_token) = self.mint_pair(&user, device)?;
        self.users.update_last_login(user.id)?;

        Ok(LoginResponse {
            user: user.into(),
            access_token,
            refresh_token,
            expires_in: self.codec.access_ttl_seconds(),
        })
    }

    fn mint_pair(&self, user: &User, device: &DeviceInfo) -> Result<(String, String), AppError> {
        let expires_at = Utc::now() + Duration::days(self.refresh_ttl_days);
        let record = self.sessions.create(user.id, device, expires_at)?;

        let access_token = self
            .codec
            .mint_access(user.id, &user.email, user.role)
            .map_err(|e| AppError::TokenGeneration(e.to_string()))?;
        let refresh_token = self
            .codec
            .mint_refresh(record.id, user.id)
            .map_err(|e| AppError::TokenGeneration(e.to_string()))?;

        Ok((access_token, refresh_token))
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Shape check only, deliverability is the mail system's problem: non-empty
/// local part, single `@`, domain with an interior dot, no whitespace.
fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !email.contains(char::is_whitespace)
}
