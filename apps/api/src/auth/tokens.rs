//! Signed tokens for sessions, email verification and password reset.
//!
//! Every token is an HS256 JWT carrying a `purpose` claim; a token issued for
//! one purpose is never accepted for another.

use chrono::{Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use uuid::Uuid;

use crate::config::Config;

const VERIFY_EMAIL_DAYS: i64 = 3;
const PASSWORD_RESET_DAYS: i64 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenPurpose {
    Access,
    Refresh,
    VerifyEmail,
    PasswordReset,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub jti: Uuid,
    pub iat: i64,
    pub exp: i64,
    pub purpose: TokenPurpose,
    /// Password-hash fingerprint; set on reset tokens only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pwd: Option<String>,
}

impl Claims {
    /// Seconds until expiry, never negative.
    pub fn remaining_secs(&self) -> u64 {
        u64::try_from(self.exp - Utc::now().timestamp()).unwrap_or(0)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("Token is expired")]
    Expired,

    #[error("Token is invalid")]
    Invalid,

    #[error("Token has wrong type")]
    WrongPurpose,
}

#[derive(Debug, Serialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

/// Issues and verifies every token the API hands out.
#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenService {
    pub fn new(config: &Config) -> Self {
        Self::with_lifetimes(
            &config.jwt_secret,
            Duration::minutes(config.access_token_minutes),
            Duration::days(config.refresh_token_days),
        )
    }

    pub fn with_lifetimes(secret: &str, access_ttl: Duration, refresh_ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            access_ttl,
            refresh_ttl,
        }
    }

    fn lifetime(&self, purpose: TokenPurpose) -> Duration {
        match purpose {
            TokenPurpose::Access => self.access_ttl,
            TokenPurpose::Refresh => self.refresh_ttl,
            TokenPurpose::VerifyEmail => Duration::days(VERIFY_EMAIL_DAYS),
            TokenPurpose::PasswordReset => Duration::days(PASSWORD_RESET_DAYS),
        }
    }

    fn issue(
        &self,
        user_id: Uuid,
        purpose: TokenPurpose,
        pwd: Option<String>,
    ) -> Result<String, TokenError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id,
            jti: Uuid::new_v4(),
            iat: now.timestamp(),
            exp: (now + self.lifetime(purpose)).timestamp(),
            purpose,
            pwd,
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|_| TokenError::Invalid)
    }

    pub fn issue_pair(&self, user_id: Uuid) -> Result<TokenPair, TokenError> {
        Ok(TokenPair {
            access: self.issue(user_id, TokenPurpose::Access, None)?,
            refresh: self.issue(user_id, TokenPurpose::Refresh, None)?,
        })
    }

    pub fn issue_access(&self, user_id: Uuid) -> Result<String, TokenError> {
        self.issue(user_id, TokenPurpose::Access, None)
    }

    pub fn issue_email_verification(&self, user_id: Uuid) -> Result<String, TokenError> {
        self.issue(user_id, TokenPurpose::VerifyEmail, None)
    }

    /// Reset tokens are bound to the current password hash, so they stop
    /// working once the password changes.
    pub fn issue_password_reset(
        &self,
        user_id: Uuid,
        password_hash: &str,
    ) -> Result<String, TokenError> {
        self.issue(
            user_id,
            TokenPurpose::PasswordReset,
            Some(password_fingerprint(password_hash)),
        )
    }

    pub fn verify(&self, token: &str, expected: TokenPurpose) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        let claims = decode::<Claims>(token, &self.decoding, &validation)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid,
            })?
            .claims;

        if claims.purpose != expected {
            return Err(TokenError::WrongPurpose);
        }
        Ok(claims)
    }
}

/// Short hex digest of a password hash.
pub fn password_fingerprint(password_hash: &str) -> String {
    let digest = format!("{:x}", Sha256::digest(password_hash.as_bytes()));
    digest[..16].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> TokenService {
        TokenService::with_lifetimes("test-secret", Duration::minutes(60), Duration::days(7))
    }

    #[test]
    fn test_pair_round_trips_with_purpose() {
        let svc = service();
        let user = Uuid::new_v4();
        let pair = svc.issue_pair(user).unwrap();

        let access = svc.verify(&pair.access, TokenPurpose::Access).unwrap();
        assert_eq!(access.sub, user);
        let refresh = svc.verify(&pair.refresh, TokenPurpose::Refresh).unwrap();
        assert_ne!(access.jti, refresh.jti);
        assert!(refresh.remaining_secs() > 6 * 24 * 3600);
    }

    #[test]
    fn test_purpose_is_enforced() {
        let svc = service();
        let pair = svc.issue_pair(Uuid::new_v4()).unwrap();
        assert_eq!(
            svc.verify(&pair.refresh, TokenPurpose::Access).unwrap_err(),
            TokenError::WrongPurpose
        );
        let verify = svc.issue_email_verification(Uuid::new_v4()).unwrap();
        assert_eq!(
            svc.verify(&verify, TokenPurpose::PasswordReset).unwrap_err(),
            TokenError::WrongPurpose
        );
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let svc = TokenService::with_lifetimes(
            "test-secret",
            Duration::seconds(-120),
            Duration::days(7),
        );
        let token = svc.issue_access(Uuid::new_v4()).unwrap();
        assert_eq!(
            svc.verify(&token, TokenPurpose::Access).unwrap_err(),
            TokenError::Expired
        );
    }

    #[test]
    fn test_foreign_signature_is_invalid() {
        let token = service().issue_access(Uuid::new_v4()).unwrap();
        let other =
            TokenService::with_lifetimes("other-secret", Duration::minutes(60), Duration::days(7));
        assert_eq!(
            other.verify(&token, TokenPurpose::Access).unwrap_err(),
            TokenError::Invalid
        );
        assert_eq!(
            other.verify("not-a-jwt", TokenPurpose::Access).unwrap_err(),
            TokenError::Invalid
        );
    }

    #[test]
    fn test_reset_token_carries_fingerprint() {
        let svc = service();
        let token = svc
            .issue_password_reset(Uuid::new_v4(), "$argon2id$v=19$hash")
            .unwrap();
        let claims = svc.verify(&token, TokenPurpose::PasswordReset).unwrap();
        assert_eq!(
            claims.pwd.as_deref(),
            Some(password_fingerprint("$argon2id$v=19$hash").as_str())
        );
        assert_ne!(
            password_fingerprint("$argon2id$v=19$hash"),
            password_fingerprint("$argon2id$v=19$other")
        );
    }
}
