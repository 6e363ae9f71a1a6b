// Shared crate clippy configuration
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Kampus shared infrastructure
//!
//! Connection bootstrap for the backing stores, shared by the API server
//! and any future background workers. Both stores are connected with a
//! bounded exponential-backoff retry: a dependency that never comes up is
//! fatal at startup, but a slow container start is not.

use std::time::Duration;

use redis::aio::ConnectionManager;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::Retry;

/// Maximum connection attempts before bootstrap gives up.
const MAX_CONNECT_ATTEMPTS: usize = 5;

/// Base delay for the exponential backoff between attempts.
const CONNECT_BACKOFF_BASE_MS: u64 = 250;

fn backoff() -> impl Iterator<Item = Duration> {
    ExponentialBackoff::from_millis(CONNECT_BACKOFF_BASE_MS)
        .map(jitter)
        .take(MAX_CONNECT_ATTEMPTS)
}

/// Create the Postgres connection pool.
///
/// Retries with exponential backoff; only the steady-state request path is
/// retry-free, startup is allowed to wait for the store.
pub async fn create_pool(database_url: &str) -> anyhow::Result<PgPool> {
    let pool = Retry::spawn(backoff(), || async {
        PgPoolOptions::new()
            .max_connections(10)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "Postgres connection attempt failed, retrying");
                e
            })
    })
    .await?;

    tracing::info!("Postgres pool created");
    Ok(pool)
}

/// Create the Redis connection manager.
///
/// The `ConnectionManager` reconnects on its own after startup; the retry
/// here only covers the initial handshake.
pub async fn create_redis(redis_url: &str) -> anyhow::Result<ConnectionManager> {
    let client = redis::Client::open(redis_url)?;

    let manager = Retry::spawn(backoff(), || async {
        ConnectionManager::new(client.clone()).await.map_err(|e| {
            tracing::warn!(error = %e, "Redis connection attempt failed, retrying");
            e
        })
    })
    .await?;

    tracing::info!("Redis connection established");
    Ok(manager)
}

/// Apply pending database migrations from the workspace `migrations/`
/// directory. Runs at startup, before the server binds.
pub async fn run_migrations(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("../../migrations").run(pool).await?;
    tracing::info!("database migrations applied");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_is_bounded() {
        let delays: Vec<_> = backoff().collect();
        assert_eq!(delays.len(), MAX_CONNECT_ATTEMPTS);
    }

    #[test]
    fn backoff_grows() {
        // Jitter only shrinks a delay, so the raw strategy bounds it above.
        let raw: Vec<_> = ExponentialBackoff::from_millis(CONNECT_BACKOFF_BASE_MS)
            .take(MAX_CONNECT_ATTEMPTS)
            .collect();
        for pair in raw.windows(2) {
            assert!(pair[1] >= pair[0]);
        }
    }
}
