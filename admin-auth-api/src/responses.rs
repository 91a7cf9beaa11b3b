use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: String,
    pub email_verified: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct LoginResponse {
    pub user: UserResponse,
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct RefreshTokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
}

/// Envelope for endpoints whose success shape is `{user}`.
#[derive(Serialize, Deserialize, Debug)]
pub struct UserEnvelope {
    pub user: UserResponse,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct DeviceInfoResponse {
    pub user_agent: Option<String>,
    pub ip: Option<String>,
}

/// One active refresh session, for session-listing/audit only.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SessionResponse {
    pub id: Uuid,
    pub device_info: DeviceInfoResponse,
    pub last_used_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct SessionListResponse {
    pub sessions: Vec<SessionResponse>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

impl MessageResponse {
    #[must_use]
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug)]
pub struct CleanupResponse {
    pub success: bool,
    pub removed: usize,
}
