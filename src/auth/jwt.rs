use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::models::user::Role;

pub const ISSUER: &str = "auth-server";
pub const AUDIENCE: &str = "auth-client";

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("Token generation failed: {0}")]
    GenerationFailed(jsonwebtoken::errors::Error),
    #[error("Token expired")]
    Expired,
    #[error("Token verification failed: {0}")]
    VerificationFailed(jsonwebtoken::errors::Error),
    #[error("Unexpected token kind")]
    KindMismatch,
}

/// Tag embedded in every payload and checked after signature verification, so
/// a misconfiguration sharing secrets cannot silently cause kind confusion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AccessClaims {
    pub sub: Uuid,
    pub email: String,
    pub role: Role,
    pub kind: TokenKind,
    pub iss: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RefreshClaims {
    pub sub: Uuid,
    /// Id of the backing `RefreshToken` record. The record, looked up on every
    /// refresh, is the authoritative validity check.
    pub token_id: Uuid,
    pub kind: TokenKind,
    pub iss: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}

/// Mints and verifies the two token kinds. Access and refresh tokens are
/// signed with distinct secrets and are never verifiable with each other's.
#[derive(Clone)]
pub struct TokenCodec {
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenCodec {
    #[must_use]
    pub fn new(
        access_secret: &str,
        refresh_secret: &str,
        access_ttl_minutes: i64,
        refresh_ttl_days: i64,
    ) -> Self {
        Self {
            access_encoding: EncodingKey::from_secret(access_secret.as_ref()),
            access_decoding: DecodingKey::from_secret(access_secret.as_ref()),
            refresh_encoding: EncodingKey::from_secret(refresh_secret.as_ref()),
            refresh_decoding: DecodingKey::from_secret(refresh_secret.as_ref()),
            access_ttl: Duration::minutes(access_ttl_minutes),
            // Slack over the record's own expires_at; the record stays the
            // authoritative expiry, the claim is a redundant bound.
            refresh_ttl: Duration::days(refresh_ttl_days) + Duration::hours(1),
        }
    }

    /// Access token lifetime in seconds, reported to clients as `expires_in`.
    #[must_use]
    pub fn access_ttl_seconds(&self) -> i64 {
        self.access_ttl.num_seconds()
    }

    pub fn mint_access(
        &self,
        user_id: Uuid,
        email: &str,
        role: Role,
    ) -> Result<String, TokenError> {
        let now = Utc::now();
        let claims = AccessClaims {
            sub: user_id,
            email: email.to_string(),
            role,
            kind: TokenKind::Access,
            iss: ISSUER.to_string(),
            aud: AUDIENCE.to_string(),
            iat: now.timestamp(),
            exp: (now + self.access_ttl).timestamp(),
        };

        encode(&Header::default(), &claims, &self.access_encoding)
            .map_err(TokenError::GenerationFailed)
    }

    pub fn mint_refresh(&self, token_id: Uuid, user_id: Uuid) -> Result<String, TokenError> {
        let now = Utc::now();
        let claims = RefreshClaims {
            sub: user_id,
            token_id,
            kind: TokenKind::Refresh,
            iss: ISSUER.to_string(),
            aud: AUDIENCE.to_string(),
            iat: now.timestamp(),
            exp: (now + self.refresh_ttl).timestamp(),
        };

        encode(&Header::default(), &claims, &self.refresh_encoding)
            .map_err(TokenError::GenerationFailed)
    }

    pub fn verify_access(&self, token: &str) -> Result<AccessClaims, TokenError> {
        let data = decode::<AccessClaims>(token, &self.access_decoding, &Self::validation())
            .map_err(map_verification_error)?;

        if data.claims.kind != TokenKind::Access {
            return Err(TokenError::KindMismatch);
        }
        Ok(data.claims)
    }

    pub fn verify_refresh(&self, token: &str) -> Result<RefreshClaims, TokenError> {
        let data = decode::<RefreshClaims>(token, &self.refresh_decoding, &Self::validation())
            .map_err(map_verification_error)?;

        if data.claims.kind != TokenKind::Refresh {
            return Err(TokenError::KindMismatch);
        }
        Ok(data.claims)
    }

    fn validation() -> Validation {
        let mut validation = Validation::default();
        validation.set_issuer(&[ISSUER]);
        validation.set_audience(&[AUDIENCE]);
        validation
    }
}

fn map_verification_error(err: jsonwebtoken::errors::Error) -> TokenError {
    match err.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => TokenError::Expired,
        _ => TokenError::VerificationFailed(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_codec() -> TokenCodec {
        TokenCodec::new("access_secret_for_tests", "refresh_secret_for_tests", 15, 7)
    }

    #[test]
    fn mint_and_verify_access_roundtrip() {
        let codec = make_codec();
        let user_id = Uuid::new_v4();

        let token = codec
            .mint_access(user_id, "alice@example.com", Role::Admin)
            .expect("mint");
        let claims = codec.verify_access(&token).expect("verify");

        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.email, "alice@example.com");
        assert_eq!(claims.role, Role::Admin);
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn mint_and_verify_refresh_roundtrip() {
        let codec = make_codec();
        let token_id = Uuid::new_v4();
        let user_id = Uuid::new_v4();

        let token = codec.mint_refresh(token_id, user_id).expect("mint");
        let claims = codec.verify_refresh(&token).expect("verify");

        assert_eq!(claims.token_id, token_id);
        assert_eq!(claims.sub, user_id);
    }

    #[test]
    fn expired_access_token_reports_expired_not_invalid() {
        // Negative TTL puts exp well past the default leeway
        let codec = TokenCodec::new("access_secret_for_tests", "refresh_secret_for_tests", -60, 7);
        let token = codec
            .mint_access(Uuid::new_v4(), "a@example.com", Role::User)
            .expect("mint");

        assert!(matches!(codec.verify_access(&token), Err(TokenError::Expired)));
    }

    #[test]
    fn tokens_are_not_interchangeable_across_kinds() {
        let codec = make_codec();
        let access = codec
            .mint_access(Uuid::new_v4(), "a@example.com", Role::User)
            .expect("mint");
        let refresh = codec.mint_refresh(Uuid::new_v4(), Uuid::new_v4()).expect("mint");

        assert!(codec.verify_refresh(&access).is_err());
        assert!(codec.verify_access(&refresh).is_err());
    }

    #[test]
    fn kind_tag_blocks_confusion_even_with_shared_secrets() {
        // Deliberately misconfigured codec: same secret for both kinds
        let codec = TokenCodec::new("one_shared_secret", "one_shared_secret", 15, 7);
        let refresh = codec.mint_refresh(Uuid::new_v4(), Uuid::new_v4()).expect("mint");

        assert!(matches!(
            codec.verify_access(&refresh),
            Err(TokenError::KindMismatch | TokenError::VerificationFailed(_))
        ));
    }

    #[test]
    fn garbage_input_fails_verification() {
        let codec = make_codec();
        assert!(matches!(
            codec.verify_access("not.a.jwt"),
            Err(TokenError::VerificationFailed(_))
        ));
    }

    #[test]
    fn wrong_secret_fails_verification() {
        let codec = make_codec();
        let other = TokenCodec::new("different_access_secret", "different_refresh_secret", 15, 7);

        let token = codec
            .mint_access(Uuid::new_v4(), "a@example.com", Role::User)
            .expect("mint");
        assert!(other.verify_access(&token).is_err());
    }
}
