use chrono::Utc;
use diesel::prelude::*;
use uuid::Uuid;

use crate::db::models::user::{NewUser, UpdateUser, User};
use crate::db::schema::users;
use crate::db::{DbConnection, DbPool};
use crate::store::{RepositoryError, UserStore};

/// Postgres-backed [`UserStore`].
pub struct PgUserStore {
    pool: DbPool,
}

impl PgUserStore {
    #[must_use]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn conn(&self) -> Result<DbConnection, RepositoryError> {
        self.pool.get().map_err(Into::into)
    }
}

impl UserStore for PgUserStore {
    fn create(&self, new_user: &NewUser) -> Result<User, RepositoryError> {
        let mut conn = self.conn()?;

        diesel::insert_into(users::table)
            .values(new_user)
            .get_result::<User>(&mut conn)
            .map_err(Into::into)
    }

    fn find_by_id(&self, id: Uuid) -> Result<Option<User>, RepositoryError> {
        let mut conn = self.conn()?;

        users::table
            .filter(users::id.eq(id))
            .first::<User>(&mut conn)
            .optional()
            .map_err(Into::into)
    }

    fn find_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError> {
        let mut conn = self.conn()?;

        users::table
            .filter(users::email.eq(email))
            .first::<User>(&mut conn)
            .optional()
            .map_err(Into::into)
    }

    fn update_profile(&self, id: Uuid, changes: &UpdateUser) -> Result<User, RepositoryError> {
        let mut conn = self.conn()?;

        diesel::update(users::table.filter(users::id.eq(id)))
            .set(changes)
            .get_result::<User>(&mut conn)
            .map_err(Into::into)
    }

    fn update_password(&self, id: Uuid, password_hash: &str) -> Result<(), RepositoryError> {
        let mut conn = self.conn()?;

        diesel::update(users::table.filter(users::id.eq(id)))
            .set(users::password_hash.eq(password_hash))
            .execute(&mut conn)?;

        Ok(())
    }

    fn update_last_login(&self, id: Uuid) -> Result<(), RepositoryError> {
        let mut conn = self.conn()?;

        diesel::update(users::table.filter(users::id.eq(id)))
            .set(users::last_login_at.eq(Some(Utc::now())))
            .execute(&mut conn)?;

        Ok(())
    }
}
