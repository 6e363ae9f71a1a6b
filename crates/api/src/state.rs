//! Shared application state
//!
//! One `AppState` is built at startup and cloned into every handler.
//! Every component receives its configuration explicitly here; nothing
//! reads the environment after this point.

use sqlx::PgPool;

use crate::auth::jwt::TokenSigner;
use crate::auth::ledger::TokenLedger;
use crate::auth::oauth::GoogleOauth;
use crate::cache::Cache;
use crate::config::Config;
use crate::email::Mailer;
use crate::kv::Kv;
use crate::ratelimit::RateLimiter;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub pool: PgPool,
    pub signer: TokenSigner,
    pub ledger: TokenLedger,
    pub cache: Cache,
    pub rate_limiter: RateLimiter,
    pub mailer: Mailer,
    pub oauth: GoogleOauth,
}

impl AppState {
    pub fn new(config: Config, pool: PgPool, kv: Kv) -> Self {
        let signer = TokenSigner::new(&config.jwt_secret);
        let ledger = TokenLedger::new(kv.clone());
        let cache = Cache::new(kv.clone());
        let rate_limiter = RateLimiter::new(kv);
        let mailer = Mailer::new(
            &config.resend_api_key,
            &config.email_from,
            config.test_email.clone(),
        );
        let oauth = GoogleOauth::new(
            &config.google_client_id,
            &config.google_client_secret,
            &config.google_redirect_url,
        );

        Self {
            config,
            pool,
            signer,
            ledger,
            cache,
            rate_limiter,
            mailer,
            oauth,
        }
    }
}
