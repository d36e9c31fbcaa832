//! Signed access / refresh credentials.
//!
//! Tokens are HS256 JWTs carrying [`JwtClaims`]. Time checks are done by
//! [`validate_claims`] against an explicit `now`, not by the JWT library,
//! so expiry behaviour is deterministic under test.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use storefront_core::UserId;

use crate::claims::{JwtClaims, TokenKind, TokenValidationError, validate_claims};

pub const DEFAULT_ACCESS_TTL_SECS: i64 = 300;
pub const DEFAULT_REFRESH_TTL_SECS: i64 = 86_400;

/// An access token plus the refresh token that can renew it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CredentialPair {
    pub access: String,
    pub refresh: String,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// Bad signature, wrong algorithm, or not a JWT at all.
    #[error("token is invalid")]
    Invalid,

    #[error(transparent)]
    Claims(#[from] TokenValidationError),

    #[error("token encoding failed: {0}")]
    Encoding(String),
}

/// Issues credentials for an authenticated user.
pub trait CredentialIssuer: Send + Sync {
    fn issue(
        &self,
        user_id: UserId,
        username: &str,
        now: DateTime<Utc>,
    ) -> Result<CredentialPair, TokenError>;

    /// Exchange a valid refresh token for a new access token.
    fn refresh(&self, refresh_token: &str, now: DateTime<Utc>) -> Result<String, TokenError>;
}

/// Verifies presented tokens.
pub trait TokenValidator: Send + Sync {
    fn validate(
        &self,
        token: &str,
        expected: TokenKind,
        now: DateTime<Utc>,
    ) -> Result<JwtClaims, TokenError>;
}

/// Shared-secret (HMAC-SHA256) implementation of both credential traits.
#[derive(Clone)]
pub struct Hs256Credentials {
    encoding: EncodingKey,
    decoding: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl core::fmt::Debug for Hs256Credentials {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Hs256Credentials")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish_non_exhaustive()
    }
}

impl Hs256Credentials {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            access_ttl: Duration::seconds(DEFAULT_ACCESS_TTL_SECS),
            refresh_ttl: Duration::seconds(DEFAULT_REFRESH_TTL_SECS),
        }
    }

    pub fn with_ttls(mut self, access_ttl: Duration, refresh_ttl: Duration) -> Self {
        self.access_ttl = access_ttl;
        self.refresh_ttl = refresh_ttl;
        self
    }

    fn sign(
        &self,
        user_id: UserId,
        username: &str,
        kind: TokenKind,
        now: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        let ttl = match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        };
        let claims = JwtClaims {
            sub: user_id,
            username: username.to_string(),
            kind,
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
            jti: Uuid::now_v7(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| TokenError::Encoding(e.to_string()))
    }
}

impl CredentialIssuer for Hs256Credentials {
    fn issue(
        &self,
        user_id: UserId,
        username: &str,
        now: DateTime<Utc>,
    ) -> Result<CredentialPair, TokenError> {
        Ok(CredentialPair {
            access: self.sign(user_id, username, TokenKind::Access, now)?,
            refresh: self.sign(user_id, username, TokenKind::Refresh, now)?,
        })
    }

    fn refresh(&self, refresh_token: &str, now: DateTime<Utc>) -> Result<String, TokenError> {
        let claims = self.validate(refresh_token, TokenKind::Refresh, now)?;
        self.sign(claims.sub, &claims.username, TokenKind::Access, now)
    }
}

impl TokenValidator for Hs256Credentials {
    fn validate(
        &self,
        token: &str,
        expected: TokenKind,
        now: DateTime<Utc>,
    ) -> Result<JwtClaims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.required_spec_claims.clear();

        let data = decode::<JwtClaims>(token, &self.decoding, &validation).map_err(|e| {
            tracing::debug!(error = %e, "token rejected");
            TokenError::Invalid
        })?;
        validate_claims(&data.claims, expected, now)?;
        Ok(data.claims)
    }
}
