//! Signed session tokens.
//!
//! Tokens are compact JWS strings signed with HMAC-SHA256 over a shared
//! secret. The payload is a fixed-shape [`SessionClaims`] record; decoding
//! fails closed when any field is missing or has the wrong type.
//!
//! # Failure Kinds
//!
//! [`TokenError`] distinguishes why verification failed so the kind can be
//! logged and counted. The HTTP layer collapses every kind into the same
//! `401 Unauthorized` response.
//!
//! # Expiry
//!
//! Expiry is checked by the codec itself with zero leeway: a token issued at
//! `t0` with time-to-live `ttl` verifies for `t0 <= now < t0 + ttl` and is
//! rejected from `t0 + ttl` onwards.

use std::fmt;
use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The only accepted signing algorithm.
pub const TOKEN_ALGORITHM: Algorithm = Algorithm::HS256;

/// Identity fields carried by a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: i64,
    pub name: String,
    pub email: String,
}

/// Claims embedded in every session token.
///
/// Immutable once signed. A new set is minted on login, on refresh and
/// after a password change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Numeric user id of the subject
    pub user_id: i64,
    /// Display name
    pub name: String,
    /// Email address
    pub email: String,
    /// Subject must change their password before doing anything else
    pub needs_password_update: bool,
    /// Issued-at, seconds since the Unix epoch
    pub iat: i64,
    /// Expiry, seconds since the Unix epoch
    pub exp: i64,
}

impl SessionClaims {
    /// The identity portion of the claims.
    pub fn identity(&self) -> Identity {
        Identity {
            user_id: self.user_id,
            name: self.name.clone(),
            email: self.email.clone(),
        }
    }

    /// Whether the claims are expired at `now` (Unix seconds).
    pub fn is_expired_at(&self, now: i64) -> bool {
        now >= self.exp
    }
}

/// Why a token could not be issued or verified.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenError {
    #[error("token is malformed")]
    Malformed,

    #[error("token signature does not match")]
    BadSignature,

    #[error("token has expired")]
    Expired,

    #[error("token uses an unsupported algorithm")]
    UnsupportedAlgorithm,

    #[error("token could not be signed")]
    Signing,
}

impl TokenError {
    /// Stable label for logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenError::Malformed => "malformed",
            TokenError::BadSignature => "bad_signature",
            TokenError::Expired => "expired",
            TokenError::UnsupportedAlgorithm => "unsupported_algorithm",
            TokenError::Signing => "signing",
        }
    }
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::InvalidSignature => TokenError::BadSignature,
            ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName => {
                TokenError::UnsupportedAlgorithm
            }
            ErrorKind::ExpiredSignature => TokenError::Expired,
            _ => TokenError::Malformed,
        }
    }
}

/// Issues and verifies session tokens with a shared secret.
///
/// Holds no mutable state; cloning is cheap enough to keep one per
/// application and share it behind an `Arc`.
#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCodec")
            .field("algorithm", &TOKEN_ALGORITHM)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl TokenCodec {
    /// Create a codec for `secret` whose tokens live for `ttl` by default.
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        let mut validation = Validation::new(TOKEN_ALGORITHM);
        // Expiry is enforced in `verify_at` against an explicit clock.
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.required_spec_claims.clear();

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            ttl,
        }
    }

    /// Default time-to-live for issued tokens.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a token for `identity` with the default time-to-live.
    pub fn issue(&self, identity: &Identity, action_required: bool) -> Result<String, TokenError> {
        self.issue_with_ttl(identity, action_required, self.ttl)
    }

    /// Issue a token for `identity` that expires `ttl` from now.
    pub fn issue_with_ttl(
        &self,
        identity: &Identity,
        action_required: bool,
        ttl: Duration,
    ) -> Result<String, TokenError> {
        self.issue_at(identity, action_required, ttl, Utc::now().timestamp())
    }

    /// Issue a token as if the current time were `issued_at` (Unix seconds).
    pub fn issue_at(
        &self,
        identity: &Identity,
        action_required: bool,
        ttl: Duration,
        issued_at: i64,
    ) -> Result<String, TokenError> {
        let ttl_secs = i64::try_from(ttl.as_secs()).map_err(|_| TokenError::Signing)?;
        let claims = SessionClaims {
            user_id: identity.user_id,
            name: identity.name.clone(),
            email: identity.email.clone(),
            needs_password_update: action_required,
            iat: issued_at,
            exp: issued_at.saturating_add(ttl_secs),
        };

        encode(&Header::new(TOKEN_ALGORITHM), &claims, &self.encoding_key)
            .map_err(|_| TokenError::Signing)
    }

    /// Verify `token` against the current time.
    pub fn verify(&self, token: &str) -> Result<SessionClaims, TokenError> {
        self.verify_at(token, Utc::now().timestamp())
    }

    /// Verify `token` as if the current time were `now` (Unix seconds).
    ///
    /// On success the embedded claims are returned unchanged.
    pub fn verify_at(&self, token: &str, now: i64) -> Result<SessionClaims, TokenError> {
        let data = decode::<SessionClaims>(token, &self.decoding_key, &self.validation)?;

        if data.claims.is_expired_at(now) {
            return Err(TokenError::Expired);
        }

        Ok(data.claims)
    }
}
