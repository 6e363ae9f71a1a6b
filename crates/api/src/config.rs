//! Application configuration
//!
//! Everything comes from the environment once at startup and is passed
//! into constructors explicitly; request-handling code never reads env
//! vars on its own.

use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    /// Address the HTTP server binds to.
    pub bind_address: String,
    /// Postgres connection string.
    pub database_url: String,
    /// Redis connection string.
    pub redis_url: String,
    /// Base secret for session and action token signing.
    pub jwt_secret: String,
    /// Whether session cookies carry the `Secure` attribute.
    /// Driven by APP_ENV=production.
    pub cookie_secure: bool,
    /// Public origin + base path used to build links embedded in emails,
    /// e.g. `https://api.example.com/api/v1`.
    pub public_base_url: String,
    /// Mail API key; empty disables outbound mail (logged, not fatal).
    pub resend_api_key: String,
    /// From address for transactional mail.
    pub email_from: String,
    /// When set, all outbound mail is redirected here (dev/test override).
    pub test_email: Option<String>,
    /// Google OAuth client credentials.
    pub google_client_id: String,
    pub google_client_secret: String,
    /// Redirect URL registered with Google for the callback.
    pub google_redirect_url: String,
    /// Comma-separated CORS origin allowlist.
    pub allowed_origins: Vec<String>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let jwt_secret = env::var("JWT_SECRET")
            .map_err(|_| anyhow::anyhow!("JWT_SECRET must be set"))?;
        if jwt_secret.len() < 32 {
            anyhow::bail!("JWT_SECRET must be at least 32 bytes");
        }

        let database_url = env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?;

        let app_env = env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        Ok(Self {
            bind_address: env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3001".to_string()),
            database_url,
            redis_url: env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string()),
            jwt_secret,
            cookie_secure: app_env == "production",
            public_base_url: env::var("PUBLIC_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:3001/api/v1".to_string()),
            resend_api_key: env::var("RESEND_API_KEY").unwrap_or_default(),
            email_from: env::var("EMAIL_FROM")
                .unwrap_or_else(|_| "Kampus <no-reply@kampus.dev>".to_string()),
            test_email: env::var("TEST_EMAIL").ok().filter(|s| !s.is_empty()),
            google_client_id: env::var("GOOGLE_CLIENT_ID").unwrap_or_default(),
            google_client_secret: env::var("GOOGLE_CLIENT_SECRET").unwrap_or_default(),
            google_redirect_url: env::var("GOOGLE_REDIRECT_URL").unwrap_or_else(|_| {
                "http://localhost:3001/api/v1/auth/google/callback".to_string()
            }),
            allowed_origins: env::var("ALLOWED_ORIGINS")
                .unwrap_or_else(|_| "http://localhost:3000".to_string())
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        })
    }
}
