use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::db::models::refresh_token::{NewRefreshToken, RefreshToken};
use crate::db::schema::refresh_tokens;
use crate::db::{DbConnection, DbPool};
use crate::store::{
    DeviceInfo, MAX_TOKEN_ATTEMPTS, RepositoryError, SessionStore, TokenGenerator,
    generate_opaque_token,
};

/// Postgres-backed [`SessionStore`]. The `token` column carries a unique
/// constraint; creation relies on it for collision detection.
pub struct PgSessionStore {
    pool: DbPool,
    token_gen: TokenGenerator,
}

impl PgSessionStore {
    #[must_use]
    pub fn new(pool: DbPool) -> Self {
        Self::with_token_generator(pool, Box::new(generate_opaque_token))
    }

    #[must_use]
    pub fn with_token_generator(pool: DbPool, token_gen: TokenGenerator) -> Self {
        Self { pool, token_gen }
    }

    fn conn(&self) -> Result<DbConnection, RepositoryError> {
        self.pool.get().map_err(Into::into)
    }
}

impl SessionStore for PgSessionStore {
    fn create(
        &self,
        user_id: Uuid,
        device: &DeviceInfo,
        expires_at: DateTime<Utc>,
    ) -> Result<RefreshToken, RepositoryError> {
        let mut conn = self.conn()?;

        for _ in 0..MAX_TOKEN_ATTEMPTS {
            let new_token = NewRefreshToken {
                user_id,
                token: (self.token_gen)(),
                expires_at,
                user_agent: device.user_agent.clone(),
                ip: device.ip.clone(),
            };

            match diesel::insert_into(refresh_tokens::table)
                .values(&new_token)
                .get_result::<RefreshToken>(&mut conn)
                .map_err(RepositoryError::from)
            {
                Ok(record) => return Ok(record),
                // Token collision: retry with a fresh value
                Err(RepositoryError::UniqueViolation(_)) => continue,
                Err(e) => return Err(e),
            }
        }

        Err(RepositoryError::UniqueTokenExhausted)
    }

    fn find_valid(&self, id: Uuid) -> Result<Option<RefreshToken>, RepositoryError> {
        let mut conn = self.conn()?;

        refresh_tokens::table
            .filter(refresh_tokens::id.eq(id))
            .filter(refresh_tokens::is_revoked.eq(false))
            .filter(refresh_tokens::expires_at.gt(Utc::now()))
            .first::<RefreshToken>(&mut conn)
            .optional()
            .map_err(Into::into)
    }

    fn find_by_token(&self, token: &str) -> Result<Option<RefreshToken>, RepositoryError> {
        let mut conn = self.conn()?;

        refresh_tokens::table
            .filter(refresh_tokens::token.eq(token))
            .first::<RefreshToken>(&mut conn)
            .optional()
            .map_err(Into::into)
    }

    fn find_for_user(
        &self,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<RefreshToken>, RepositoryError> {
        let mut conn = self.conn()?;

        refresh_tokens::table
            .filter(refresh_tokens::id.eq(id))
            .filter(refresh_tokens::user_id.eq(user_id))
            .first::<RefreshToken>(&mut conn)
            .optional()
            .map_err(Into::into)
    }

    fn touch_last_used(&self, id: Uuid) -> Result<(), RepositoryError> {
        let mut conn = self.conn()?;

        diesel::update(refresh_tokens::table.filter(refresh_tokens::id.eq(id)))
            .set(refresh_tokens::last_used_at.eq(Utc::now()))
            .execute(&mut conn)?;

        Ok(())
    }

    fn revoke(&self, id: Uuid) -> Result<(), RepositoryError> {
        let mut conn = self.conn()?;

        diesel::update(refresh_tokens::table.filter(refresh_tokens::id.eq(id)))
            .set(refresh_tokens::is_revoked.eq(true))
            .execute(&mut conn)?;

        Ok(())
    }

    fn revoke_all_for_user(&self, user_id: Uuid) -> Result<(), RepositoryError> {
        let mut conn = self.conn()?;

        diesel::update(
            refresh_tokens::table
                .filter(refresh_tokens::user_id.eq(user_id))
                .filter(refresh_tokens::is_revoked.eq(false)),
        )
        .set(refresh_tokens::is_revoked.eq(true))
        .execute(&mut conn)?;

        Ok(())
    }

    fn list_active_for_user(&self, user_id: Uuid) -> Result<Vec<RefreshToken>, RepositoryError> {
        let mut conn = self.conn()?;

        refresh_tokens::table
            .filter(refresh_tokens::user_id.eq(user_id))
            .filter(refresh_tokens::is_revoked.eq(false))
            .filter(refresh_tokens::expires_at.gt(Utc::now()))
            .order(refresh_tokens::last_used_at.desc())
            .load::<RefreshToken>(&mut conn)
            .map_err(Into::into)
    }

    fn cleanup(&self) -> Result<usize, RepositoryError> {
        let mut conn = self.conn()?;

        diesel::delete(
            refresh_tokens::table.filter(
                refresh_tokens::expires_at
                    .lt(Utc::now())
                    .or(refresh_tokens::is_revoked.eq(true)),
            ),
        )
        .execute(&mut conn)
        .map_err(Into::into)
    }
}
