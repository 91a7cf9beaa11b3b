//! Storage seams of the session core.
//!
//! `UserStore` and `SessionStore` are the only ways the orchestrator touches
//! persistent state. Postgres implementations live in `crate::db::repositories`;
//! in-memory implementations (used in tests and when no `DATABASE_URL` is
//! configured) live in [`memory`].

pub mod error;
pub mod memory;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::db::models::refresh_token::RefreshToken;
use crate::db::models::user::{NewUser, UpdateUser, User};
pub use error::RepositoryError;

/// Opaque metadata captured at token issuance, for session listing only.
/// Never used for authorization decisions.
#[derive(Debug, Clone, Default)]
pub struct DeviceInfo {
    pub user_agent: Option<String>,
    pub ip: Option<String>,
}

/// Bounded attempts when generating a unique opaque token value.
pub const MAX_TOKEN_ATTEMPTS: usize = 10;

/// Source of opaque token values held by the session stores. Production wiring
/// uses [`generate_opaque_token`]; tests substitute a colliding source.
pub type TokenGenerator = Box<dyn Fn() -> String + Send + Sync>;

/// Returns a 384-bit random value encoded as base64url (64 characters).
/// The raw value is stored server-side; uniqueness is enforced by the store.
#[must_use]
pub fn generate_opaque_token() -> String {
    use base64::Engine;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;

    let mut bytes = [0u8; 48];
    rand::Rng::fill(&mut rand::thread_rng(), &mut bytes[..]);
    URL_SAFE_NO_PAD.encode(bytes)
}

pub trait UserStore: Send + Sync {
    fn create(&self, new_user: &NewUser) -> Result<User, RepositoryError>;
    fn find_by_id(&self, id: Uuid) -> Result<Option<User>, RepositoryError>;
    fn find_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError>;
    fn update_profile(&self, id: Uuid, changes: &UpdateUser) -> Result<User, RepositoryError>;
    fn update_password(&self, id: Uuid, password_hash: &str) -> Result<(), RepositoryError>;
    fn update_last_login(&self, id: Uuid) -> Result<(), RepositoryError>;
}

/// Durable record of issued refresh sessions; sole authority on whether a
/// refresh session is currently usable.
pub trait SessionStore: Send + Sync {
    /// Persists a new record with a freshly generated unique opaque token.
    /// Fails with [`RepositoryError::UniqueTokenExhausted`] after
    /// [`MAX_TOKEN_ATTEMPTS`] collisions.
    fn create(
        &self,
        user_id: Uuid,
        device: &DeviceInfo,
        expires_at: DateTime<Utc>,
    ) -> Result<RefreshToken, RepositoryError>;

    /// Returns the record only if it exists, is not revoked and is not expired.
    /// Callers cannot distinguish "never existed" from "expired/revoked".
    fn find_valid(&self, id: Uuid) -> Result<Option<RefreshToken>, RepositoryError>;

    /// Lookup by the raw opaque token value, regardless of validity.
    fn find_by_token(&self, token: &str) -> Result<Option<RefreshToken>, RepositoryError>;

    /// Lookup by id scoped to an owner, regardless of validity.
    fn find_for_user(&self, id: Uuid, user_id: Uuid)
    -> Result<Option<RefreshToken>, RepositoryError>;

    fn touch_last_used(&self, id: Uuid) -> Result<(), RepositoryError>;

    /// Sets `is_revoked`. Idempotent; revocation never reverts.
    fn revoke(&self, id: Uuid) -> Result<(), RepositoryError>;

    fn revoke_all_for_user(&self, user_id: Uuid) -> Result<(), RepositoryError>;

    /// Active records for a user, most recently used first.
    fn list_active_for_user(&self, user_id: Uuid) -> Result<Vec<RefreshToken>, RepositoryError>;

    /// Deletes expired and revoked records. Space reclamation only: validity is
    /// computed from fields, and absence still means invalid.
    fn cleanup(&self) -> Result<usize, RepositoryError>;
}
