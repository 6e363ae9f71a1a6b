//! Fixed-window rate limiter
//!
//! Counts requests per identity in the key-value store. The counter key
//! gets its TTL on the request that takes it from 0 to 1, anchoring the
//! window to the first request rather than sliding it. Two concurrent
//! first requests can each set the TTL; that shifts the window edge by at
//! most one request and is accepted.
//!
//! On store failure the limiter **fails open**: the request proceeds and
//! the error is logged. Throttling infrastructure being down must never
//! block legitimate traffic — the opposite of the fail-closed stance the
//! session and ledger paths take.

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::auth::middleware::AuthUser;
use crate::kv::{Kv, KvStore};
use crate::state::AppState;

/// Per-route limiter configuration.
#[derive(Debug, Clone)]
pub struct RateLimitPolicy {
    /// Counter key prefix, e.g. `rate:forgot`.
    pub prefix: &'static str,
    pub window_ms: u64,
    pub max_requests: i64,
}

impl RateLimitPolicy {
    pub const fn new(prefix: &'static str, window_ms: u64, max_requests: i64) -> Self {
        Self {
            prefix,
            window_ms,
            max_requests,
        }
    }

    pub fn window_seconds(&self) -> u64 {
        self.window_ms.div_ceil(1000)
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum Decision {
    Allowed,
    Limited { retry_after_secs: i64 },
}

#[derive(Clone)]
pub struct RateLimiter<S: KvStore = Kv> {
    kv: S,
}

impl<S: KvStore> RateLimiter<S> {
    pub fn new(kv: S) -> Self {
        Self { kv }
    }

    /// Count one request for `identity` under `policy`.
    pub async fn allow(
        &self,
        identity: &str,
        policy: &RateLimitPolicy,
    ) -> Result<Decision, redis::RedisError> {
        let key = format!("{}:{}", policy.prefix, identity);
        let window_secs = policy.window_seconds();

        let count = self.kv.increment(&key).await?;

        // First request in the window anchors it.
        if count == 1 {
            self.kv.expire(&key, window_secs as i64).await?;
        }

        if count > policy.max_requests {
            let ttl = self.kv.time_to_live(&key).await?;
            // TTL can race to -1/-2 if the window just expired; fall back
            // to the full window length rather than reporting garbage.
            let retry_after_secs = if ttl > 0 { ttl } else { window_secs as i64 };
            return Ok(Decision::Limited { retry_after_secs });
        }

        Ok(Decision::Allowed)
    }
}

/// Client identity for throttling: the authenticated subject when the
/// auth middleware ran before us, else the client network address taken
/// from the proxy headers, else the peer address of the connection
/// itself. Without any of these every caller would share one bucket.
fn resolve_identity(request: &Request) -> String {
    if let Some(user) = request.extensions().get::<AuthUser>() {
        return user.subject.to_string();
    }

    for header in ["X-Forwarded-For", "X-Real-IP"] {
        if let Some(value) = request.headers().get(header).and_then(|h| h.to_str().ok()) {
            if let Some(ip) = value.split(',').next() {
                let ip = ip.trim();
                if !ip.is_empty() {
                    return ip.to_string();
                }
            }
        }
    }

    if let Some(ConnectInfo(addr)) = request.extensions().get::<ConnectInfo<SocketAddr>>() {
        return addr.ip().to_string();
    }

    "unknown".to_string()
}

/// Axum middleware enforcing `policy` for the wrapped routes.
pub async fn rate_limit(
    State((state, policy)): State<(AppState, RateLimitPolicy)>,
    request: Request,
    next: Next,
) -> Response {
    let identity = resolve_identity(&request);

    match state.rate_limiter.allow(&identity, &policy).await {
        Ok(Decision::Allowed) => next.run(request).await,
        Ok(Decision::Limited { retry_after_secs }) => {
            tracing::info!(
                identity = %identity,
                prefix = policy.prefix,
                retry_after_secs,
                "rate limited"
            );
            let body = Json(json!({
                "message": "Too many requests",
                "retryAfter": retry_after_secs,
            }));
            (StatusCode::TOO_MANY_REQUESTS, body).into_response()
        }
        Err(e) => {
            // Fail open: never block traffic on limiter infrastructure.
            tracing::error!(error = %e, prefix = policy.prefix, "rate limiter store error, failing open");
            next.run(request).await
        }
    }
}
