//! In-memory store implementations.
//!
//! Used by the test suite and as the fallback backend when `DATABASE_URL` is
//! not configured (single-process development mode). Semantics mirror the
//! Postgres repositories exactly: validity is computed from fields, revocation
//! is monotonic, token values are unique.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::db::models::refresh_token::RefreshToken;
use crate::db::models::user::{NewUser, UpdateUser, User};
use crate::store::{
    DeviceInfo, MAX_TOKEN_ATTEMPTS, RepositoryError, SessionStore, TokenGenerator, UserStore,
    generate_opaque_token,
};

#[derive(Default)]
pub struct MemoryUserStore {
    users: Mutex<HashMap<Uuid, User>>,
}

impl MemoryUserStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Uuid, User>> {
        self.users.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    #[cfg(test)]
    pub fn set_active(&self, id: Uuid, is_active: bool) {
        if let Some(user) = self.lock().get_mut(&id) {
            user.is_active = is_active;
        }
    }
}

impl UserStore for MemoryUserStore {
    fn create(&self, new_user: &NewUser) -> Result<User, RepositoryError> {
        let mut users = self.lock();

        if users.values().any(|u| u.email == new_user.email) {
            return Err(RepositoryError::UniqueViolation(format!(
                "users_email_key: {}",
                new_user.email
            )));
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            email: new_user.email.clone(),
            name: new_user.name.clone(),
            password_hash: new_user.password_hash.clone(),
            role: new_user.role,
            is_active: true,
            email_verified: false,
            created_at: now,
            updated_at: now,
            last_login_at: None,
        };
        users.insert(user.id, user.clone());
        Ok(user)
    }

    fn find_by_id(&self, id: Uuid) -> Result<Option<User>, RepositoryError> {
        Ok(self.lock().get(&id).cloned())
    }

    fn find_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError> {
        Ok(self.lock().values().find(|u| u.email == email).cloned())
    }

    fn update_profile(&self, id: Uuid, changes: &UpdateUser) -> Result<User, RepositoryError> {
        let mut users = self.lock();
        let user = users
            .get_mut(&id)
            .ok_or_else(|| RepositoryError::NotFound("Record not found".to_string()))?;

        if let Some(name) = &changes.name {
            user.name.clone_from(name);
        }
        if let Some(email) = &changes.email {
            user.email.clone_from(email);
        }
        if let Some(email_verified) = changes.email_verified {
            user.email_verified = email_verified;
        }
        if let Some(last_login_at) = changes.last_login_at {
            user.last_login_at = last_login_at;
        }
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    fn update_password(&self, id: Uuid, password_hash: &str) -> Result<(), RepositoryError> {
        let mut users = self.lock();
        let user = users
            .get_mut(&id)
            .ok_or_else(|| RepositoryError::NotFound("Record not found".to_string()))?;
        user.password_hash = password_hash.to_string();
        user.updated_at = Utc::now();
        Ok(())
    }

    fn update_last_login(&self, id: Uuid) -> Result<(), RepositoryError> {
        let mut users = self.lock();
        let user = users
            .get_mut(&id)
            .ok_or_else(|| RepositoryError::NotFound("Record not found".to_string()))?;
        user.last_login_at = Some(Utc::now());
        user.updated_at = Utc::now();
        Ok(())
    }
}

pub struct MemorySessionStore {
    records: Mutex<HashMap<Uuid, RefreshToken>>,
    token_gen: TokenGenerator,
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::with_token_generator(Box::new(generate_opaque_token))
    }
}

impl MemorySessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_token_generator(token_gen: TokenGenerator) -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            token_gen,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Uuid, RefreshToken>> {
        self.records.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    #[cfg(test)]
    pub fn force_expire(&self, id: Uuid) {
        if let Some(record) = self.lock().get_mut(&id) {
            record.expires_at = Utc::now() - chrono::Duration::hours(1);
        }
    }
}

impl SessionStore for MemorySessionStore {
    fn create(
        &self,
        user_id: Uuid,
        device: &DeviceInfo,
        expires_at: DateTime<Utc>,
    ) -> Result<RefreshToken, RepositoryError> {
        let mut records = self.lock();

        for _ in 0..MAX_TOKEN_ATTEMPTS {
            let token = (self.token_gen)();
            if records.values().any(|r| r.token == token) {
                continue;
            }

            let now = Utc::now();
            let record = RefreshToken {
                id: Uuid::new_v4(),
                user_id,
                token,
                expires_at,
                is_revoked: false,
                user_agent: device.user_agent.clone(),
                ip: device.ip.clone(),
                last_used_at: now,
                created_at: now,
                updated_at: now,
            };
            records.insert(record.id, record.clone());
            return Ok(record);
        }

        Err(RepositoryError::UniqueTokenExhausted)
    }

    fn find_valid(&self, id: Uuid) -> Result<Option<RefreshToken>, RepositoryError> {
        Ok(self.lock().get(&id).filter(|r| r.is_valid()).cloned())
    }

    fn find_by_token(&self, token: &str) -> Result<Option<RefreshToken>, RepositoryError> {
        Ok(self.lock().values().find(|r| r.token == token).cloned())
    }

    fn find_for_user(
        &self,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<RefreshToken>, RepositoryError> {
        Ok(self.lock().get(&id).filter(|r| r.user_id == user_id).cloned())
    }

    fn touch_last_used(&self, id: Uuid) -> Result<(), RepositoryError> {
        let mut records = self.lock();
        let record = records
            .get_mut(&id)
            .ok_or_else(|| RepositoryError::NotFound("Record not found".to_string()))?;
        record.last_used_at = Utc::now();
        record.updated_at = Utc::now();
        Ok(())
    }

    fn revoke(&self, id: Uuid) -> Result<(), RepositoryError> {
        if let Some(record) = self.lock().get_mut(&id) {
            record.is_revoked = true;
            record.updated_at = Utc::now();
        }
        Ok(())
    }

    fn revoke_all_for_user(&self, user_id: Uuid) -> Result<(), RepositoryError> {
        let now = Utc::now();
        for record in self.lock().values_mut() {
            if record.user_id == user_id && !record.is_revoked {
                record.is_revoked = true;
                record.updated_at = now;
            }
        }
        Ok(())
    }

    fn list_active_for_user(&self, user_id: Uuid) -> Result<Vec<RefreshToken>, RepositoryError> {
        let mut sessions: Vec<RefreshToken> = self
            .lock()
            .values()
            .filter(|r| r.user_id == user_id && r.is_valid())
            .cloned()
            .collect();
        sessions.sort_by(|a, b| b.last_used_at.cmp(&a.last_used_at));
        Ok(sessions)
    }

    fn cleanup(&self) -> Result<usize, RepositoryError> {
        let mut records = self.lock();
        let before = records.len();
        records.retain(|_, r| r.is_valid());
        Ok(before - records.len())
    }
}
