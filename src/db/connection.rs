use anyhow::{Context, Result};
use diesel::PgConnection;
use diesel::r2d2::ConnectionManager;

use super::DbPool;

/// Builds the r2d2 connection pool. The pool is created once in `main` and
/// handed to the Postgres store implementations.
pub fn create_pool(database_url: &str) -> Result<DbPool> {
    let manager = ConnectionManager::<PgConnection>::new(database_url);

    diesel::r2d2::Pool::builder()
        .max_size(5)
        .build(manager)
        .context("Failed to create database pool")
}
