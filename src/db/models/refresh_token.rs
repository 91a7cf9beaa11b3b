use chrono::{DateTime, Utc};
use diesel::{Insertable, Queryable, Selectable};
use uuid::Uuid;

use crate::db::schema::refresh_tokens;
use admin_auth_api::{DeviceInfoResponse, SessionResponse};

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = refresh_tokens)]
pub struct NewRefreshToken {
    pub user_id: Uuid,
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user_agent: Option<String>,
    pub ip: Option<String>,
}

/// One issued refresh session. The record, not the refresh JWT, is the source
/// of truth for whether the session is still alive.
#[derive(Queryable, Selectable, Debug, Clone)]
#[diesel(table_name = refresh_tokens)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct RefreshToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub is_revoked: bool,
    pub user_agent: Option<String>,
    pub ip: Option<String>,
    pub last_used_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RefreshToken {
    /// Valid iff not revoked and not past expiry. Re-checked on every use;
    /// JWT signature validity alone is never sufficient.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.is_revoked && self.expires_at > Utc::now()
    }
}

impl From<RefreshToken> for SessionResponse {
    fn from(record: RefreshToken) -> Self {
        SessionResponse {
            id: record.id,
            device_info: DeviceInfoResponse {
                user_agent: record.user_agent,
                ip: record.ip,
            },
            last_used_at: record.last_used_at,
            created_at: record.created_at,
            expires_at: record.expires_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn record(is_revoked: bool, expires_in: Duration) -> RefreshToken {
        let now = Utc::now();
        RefreshToken {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            token: "tok".to_string(),
            expires_at: now + expires_in,
            is_revoked,
            user_agent: None,
            ip: None,
            last_used_at: now,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn live_record_is_valid() {
        assert!(record(false, Duration::days(7)).is_valid());
    }

    #[test]
    fn revoked_record_is_invalid_even_before_expiry() {
        assert!(!record(true, Duration::days(7)).is_valid());
    }

    #[test]
    fn expired_record_is_invalid() {
        assert!(!record(false, Duration::hours(-1)).is_valid());
    }
}
