pub mod auth;
pub mod health;
pub mod sessions;

use axum::http::{HeaderMap, header::USER_AGENT};

use crate::auth::rate_limit::{RateDecision, RateLimiter};
use crate::error::AppError;
use crate::store::DeviceInfo;

/// First hop of `x-forwarded-for`, or a stable placeholder. Behind the
/// expected reverse proxy this is the client; without one every caller
/// shares a bucket, which only makes the limiter stricter.
fn client_ip(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(|ip| ip.trim().to_string())
        .filter(|ip| !ip.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

fn device_info(headers: &HeaderMap) -> DeviceInfo {
    DeviceInfo {
        user_agent: headers
            .get(USER_AGENT)
            .and_then(|value| value.to_str().ok())
            .map(ToString::to_string),
        ip: Some(client_ip(headers)),
    }
}

/// Consults a limiter before a credential-bearing attempt. The attempt is
/// counted whether or not the credentials turn out to be valid.
fn throttle(limiter: &dyn RateLimiter, key: &str) -> Result<(), AppError> {
    match limiter.check(key) {
        RateDecision::Allowed => Ok(()),
        RateDecision::Limited { retry_after } => Err(AppError::TooManyAttempts {
            retry_after_secs: retry_after.as_secs().max(1),
        }),
    }
}

/// Login and register bucket on ip + attempted email, so one address probing
/// one account cannot also lock out its other targets' buckets.
fn credential_key(headers: &HeaderMap, email: &str) -> String {
    format!("{}:{}", client_ip(headers), email.trim().to_lowercase())
}
