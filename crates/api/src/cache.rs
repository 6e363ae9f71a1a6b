//! Read-through response cache
//!
//! Memoizes read results under a logical key with a caller-supplied TTL.
//! A miss pays the full compute cost synchronously; there is no negative
//! caching and no stale-while-revalidate. Invalidation walks the keyspace
//! with a cursor-based SCAN in bounded batches and deletes every match in
//! one go.

use std::future::Future;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{ApiError, ApiResult};
use crate::kv::{Kv, KvStore};

/// Keys examined per SCAN round-trip.
const SCAN_BATCH_SIZE: usize = 100;

/// Upper bound on SCAN round-trips per invalidation. A healthy server
/// terminates the cursor long before this; the guard exists so a
/// corrupted cursor sequence cannot loop forever.
const MAX_SCAN_ROUNDS: usize = 10_000;

#[derive(Clone)]
pub struct Cache<S: KvStore = Kv> {
    kv: S,
}

impl<S: KvStore> Cache<S> {
    pub fn new(kv: S) -> Self {
        Self { kv }
    }

    /// Return the cached value for `key`, or run `compute`, store its
    /// JSON-serialized result for `ttl_seconds` and return it.
    pub async fn cached<T, F, Fut>(&self, key: &str, ttl_seconds: u64, compute: F) -> ApiResult<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = ApiResult<T>>,
    {
        if let Some(raw) = self.kv.get(key).await? {
            match serde_json::from_str(&raw) {
                Ok(value) => return Ok(value),
                Err(e) => {
                    // Shape drift after a deploy; drop the entry and recompute.
                    tracing::warn!(key = %key, error = %e, "discarding undeserializable cache entry");
                    self.kv.delete(key).await?;
                }
            }
        }

        let value = compute().await?;
        let raw = serde_json::to_string(&value).map_err(|e| {
            tracing::error!(key = %key, error = %e, "failed to serialize cache value");
            ApiError::Dependency
        })?;
        self.kv.set_with_expiry(key, ttl_seconds, &raw).await?;
        Ok(value)
    }

    /// Delete every key matching `pattern` (glob syntax).
    ///
    /// Drains the SCAN cursor fully before deleting: stopping at a partial
    /// scan could miss keys. Zero matches is a no-op.
    pub async fn invalidate(&self, pattern: &str) -> ApiResult<()> {
        let mut cursor = 0u64;
        let mut keys: Vec<String> = Vec::new();

        for round in 0.. {
            if round >= MAX_SCAN_ROUNDS {
                tracing::error!(pattern = %pattern, "cache invalidation scan did not terminate");
                return Err(ApiError::Dependency);
            }

            let (next, batch) = self.kv.scan_matching(cursor, pattern, SCAN_BATCH_SIZE).await?;
            keys.extend(batch);
            cursor = next;
            if cursor == 0 {
                break;
            }
        }

        if !keys.is_empty() {
            tracing::debug!(pattern = %pattern, count = keys.len(), "invalidating cache entries");
            self.kv.delete_many(&keys).await?;
        }

        Ok(())
    }
}

/// Cache key for a user's own profile view.
pub fn self_profile_key(user_id: uuid::Uuid) -> String {
    format!("users:self:{user_id}")
}

/// Cache key for the public view of a profile.
pub fn public_profile_key(user_id: uuid::Uuid) -> String {
    format!("users:public:{user_id}")
}

/// Glob matching every cached variant for one subject.
pub fn profile_pattern(user_id: uuid::Uuid) -> String {
    format!("users:*:{user_id}")
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::kv::memory::MemoryKv;
    use uuid::Uuid;

    #[tokio::test]
    async fn warm_cache_computes_once() {
        let cache = Cache::new(MemoryKv::new());
        let computes = AtomicUsize::new(0);

        for _ in 0..3 {
            let value: String = cache
                .cached("users:self:abc", 60, || async {
                    computes.fetch_add(1, Ordering::SeqCst);
                    Ok("profile".to_string())
                })
                .await
                .unwrap();
            assert_eq!(value, "profile");
        }

        assert_eq!(computes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn invalidate_forces_recompute() {
        let cache = Cache::new(MemoryKv::new());
        let id = Uuid::new_v4();
        let computes = AtomicUsize::new(0);

        let compute = || async {
            computes.fetch_add(1, Ordering::SeqCst);
            Ok(computes.load(Ordering::SeqCst))
        };

        let first: usize = cache
            .cached(&self_profile_key(id), 60, compute)
            .await
            .unwrap();
        cache.invalidate(&profile_pattern(id)).await.unwrap();
        let second: usize = cache
            .cached(&self_profile_key(id), 60, compute)
            .await
            .unwrap();

        assert_eq!(first, 1);
        assert_eq!(second, 2);
    }

    #[tokio::test]
    async fn invalidate_removes_every_matching_variant() {
        let cache = Cache::new(MemoryKv::new());
        let id = Uuid::new_v4();
        let other = Uuid::new_v4();
        let computes = AtomicUsize::new(0);

        let compute = || async {
            computes.fetch_add(1, Ordering::SeqCst);
            Ok("v".to_string())
        };
        let _: String = cache.cached(&self_profile_key(id), 60, compute).await.unwrap();
        let _: String = cache.cached(&public_profile_key(id), 60, compute).await.unwrap();
        let _: String = cache.cached(&self_profile_key(other), 60, compute).await.unwrap();
        assert_eq!(computes.load(Ordering::SeqCst), 3);

        cache.invalidate(&profile_pattern(id)).await.unwrap();

        // Both shapes for `id` recompute; the other subject stays warm.
        let _: String = cache.cached(&self_profile_key(id), 60, compute).await.unwrap();
        let _: String = cache.cached(&public_profile_key(id), 60, compute).await.unwrap();
        let _: String = cache.cached(&self_profile_key(other), 60, compute).await.unwrap();
        assert_eq!(computes.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn profile_pattern_covers_both_variants() {
        let id = Uuid::new_v4();
        let pattern = profile_pattern(id);

        // Both concrete keys share the prefix/suffix the glob matches on.
        let self_key = self_profile_key(id);
        let public_key = public_profile_key(id);
        assert!(self_key.starts_with("users:") && self_key.ends_with(&id.to_string()));
        assert!(public_key.starts_with("users:") && public_key.ends_with(&id.to_string()));
        assert_eq!(pattern, format!("users:*:{id}"));
    }

    #[test]
    fn scan_guard_is_generous() {
        // 10k rounds x 100 keys per round covers a million keys.
        assert!(MAX_SCAN_ROUNDS * SCAN_BATCH_SIZE >= 1_000_000);
    }
}
