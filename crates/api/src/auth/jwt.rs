//! Credential signer
//!
//! Mints and verifies the two token shapes the service uses:
//!
//! - **Session tokens** — stateless bearer credentials signed with the
//!   base secret, 7 days by default, delivered as an HTTP-only cookie by
//!   the HTTP layer.
//! - **Action tokens** — one-shot credentials for email verification,
//!   password reset and OAuth-gated deletion. The signing key is the base
//!   secret concatenated with the subject id, so a stolen token cannot be
//!   replayed against a ledger entry that belongs to someone else.
//!
//! Verification failures are deliberately indistinguishable: signature
//! mismatch, expiry and malformed input all collapse to `ApiError::Auth`
//! so the endpoint never acts as an oracle for why a token failed.

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};

/// Default session lifetime: 7 days.
pub const SESSION_TTL_SECONDS: i64 = 7 * 24 * 60 * 60;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject user id.
    pub sub: Uuid,
    /// Issued-at (unix seconds).
    pub iat: i64,
    /// Expiry (unix seconds).
    pub exp: i64,
}

#[derive(Clone)]
pub struct TokenSigner {
    secret: String,
}

impl TokenSigner {
    pub fn new(secret: &str) -> Self {
        Self {
            secret: secret.to_string(),
        }
    }

    fn sign(&self, key: &[u8], subject: Uuid, ttl_seconds: i64) -> ApiResult<String> {
        let now = OffsetDateTime::now_utc().unix_timestamp();
        let claims = Claims {
            sub: subject,
            iat: now,
            exp: now + ttl_seconds,
        };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(key)).map_err(|e| {
            tracing::error!(error = %e, "token signing failed");
            ApiError::Dependency
        })
    }

    fn check(&self, key: &[u8], token: &str) -> ApiResult<Uuid> {
        let validation = Validation::new(Algorithm::HS256);
        decode::<Claims>(token, &DecodingKey::from_secret(key), &validation)
            .map(|data| data.claims.sub)
            .map_err(|_| ApiError::Auth)
    }

    /// Per-subject signing key for action tokens.
    fn action_key(&self, subject: Uuid) -> Vec<u8> {
        let mut key = self.secret.as_bytes().to_vec();
        key.extend_from_slice(subject.to_string().as_bytes());
        key
    }

    /// Mint a session token for `subject` with the default 7-day expiry.
    pub fn issue_session(&self, subject: Uuid) -> ApiResult<String> {
        self.sign(self.secret.as_bytes(), subject, SESSION_TTL_SECONDS)
    }

    /// Mint an action token bound to `subject`, valid for `ttl_seconds`.
    /// Never becomes a cookie; the caller pairs it with a ledger entry.
    pub fn issue_action(&self, subject: Uuid, ttl_seconds: i64) -> ApiResult<String> {
        self.sign(&self.action_key(subject), subject, ttl_seconds)
    }

    /// Verify a session token and return the embedded subject id.
    pub fn verify_session(&self, token: &str) -> ApiResult<Uuid> {
        self.check(self.secret.as_bytes(), token)
    }

    /// Verify an action token against the candidate subject obtained from
    /// the ledger. The per-subject key can only be reconstructed once the
    /// ledger has produced a subject, which is why action verification
    /// always goes through the ledger first.
    pub fn verify_action(&self, token: &str, subject: Uuid) -> ApiResult<Uuid> {
        let verified = self.check(&self.action_key(subject), token)?;
        if verified != subject {
            return Err(ApiError::Auth);
        }
        Ok(verified)
    }
}
