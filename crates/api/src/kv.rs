//! Key-value store access
//!
//! `KvStore` is the seam between the auth core and its backing store:
//! expiring writes, atomic increment and cursor-based keyspace scans.
//! The ledger, limiter and cache are generic over it, defaulting to the
//! Redis-backed `Kv`; tests swap in `memory::MemoryKv`.
//!
//! The `ConnectionManager` is cheap to clone and reconnects on its own,
//! so `Kv` is `Clone` and lives in application state.

use std::future::Future;

use redis::aio::ConnectionManager;
use redis::AsyncCommands;

/// Operations the auth core needs from the key-value store.
pub trait KvStore: Clone + Send + Sync + 'static {
    fn get(
        &self,
        key: &str,
    ) -> impl Future<Output = Result<Option<String>, redis::RedisError>> + Send;

    fn set_with_expiry(
        &self,
        key: &str,
        ttl_seconds: u64,
        value: &str,
    ) -> impl Future<Output = Result<(), redis::RedisError>> + Send;

    fn delete(&self, key: &str) -> impl Future<Output = Result<(), redis::RedisError>> + Send;

    fn delete_many(
        &self,
        keys: &[String],
    ) -> impl Future<Output = Result<(), redis::RedisError>> + Send;

    fn increment(&self, key: &str) -> impl Future<Output = Result<i64, redis::RedisError>> + Send;

    fn expire(
        &self,
        key: &str,
        ttl_seconds: i64,
    ) -> impl Future<Output = Result<(), redis::RedisError>> + Send;

    /// Remaining TTL in seconds. Redis semantics: `-1` when the key has
    /// no expiry, `-2` when it does not exist.
    fn time_to_live(
        &self,
        key: &str,
    ) -> impl Future<Output = Result<i64, redis::RedisError>> + Send;

    /// One SCAN round: `(next_cursor, matching_keys)`. A returned cursor
    /// of `0` means the scan is complete.
    fn scan_matching(
        &self,
        cursor: u64,
        pattern: &str,
        batch: usize,
    ) -> impl Future<Output = Result<(u64, Vec<String>), redis::RedisError>> + Send;
}

#[derive(Clone)]
pub struct Kv {
    conn: ConnectionManager,
}

impl Kv {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }
}

impl KvStore for Kv {
    async fn get(&self, key: &str) -> Result<Option<String>, redis::RedisError> {
        let mut conn = self.conn.clone();
        conn.get(key).await
    }

    async fn set_with_expiry(
        &self,
        key: &str,
        ttl_seconds: u64,
        value: &str,
    ) -> Result<(), redis::RedisError> {
        let mut conn = self.conn.clone();
        conn.set_ex(key, value, ttl_seconds).await
    }

    async fn delete(&self, key: &str) -> Result<(), redis::RedisError> {
        let mut conn = self.conn.clone();
        conn.del(key).await
    }

    async fn delete_many(&self, keys: &[String]) -> Result<(), redis::RedisError> {
        if keys.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.clone();
        conn.del(keys).await
    }

    async fn increment(&self, key: &str) -> Result<i64, redis::RedisError> {
        let mut conn = self.conn.clone();
        conn.incr(key, 1).await
    }

    async fn expire(&self, key: &str, ttl_seconds: i64) -> Result<(), redis::RedisError> {
        let mut conn = self.conn.clone();
        conn.expire(key, ttl_seconds).await
    }

    async fn time_to_live(&self, key: &str) -> Result<i64, redis::RedisError> {
        let mut conn = self.conn.clone();
        conn.ttl(key).await
    }

    async fn scan_matching(
        &self,
        cursor: u64,
        pattern: &str,
        batch: usize,
    ) -> Result<(u64, Vec<String>), redis::RedisError> {
        let mut conn = self.conn.clone();
        redis::cmd("SCAN")
            .arg(cursor)
            .arg("MATCH")
            .arg(pattern)
            .arg("COUNT")
            .arg(batch)
            .query_async(&mut conn)
            .await
    }
}

#[cfg(test)]
pub(crate) mod memory {
    //! In-memory store double with Redis-shaped TTL semantics.

    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};
    use std::time::{Duration, Instant};

    use super::KvStore;

    struct Entry {
        value: String,
        expires_at: Option<Instant>,
    }

    impl Entry {
        fn is_expired(&self) -> bool {
            self.expires_at.is_some_and(|at| at <= Instant::now())
        }
    }

    #[derive(Clone, Default)]
    pub struct MemoryKv {
        entries: Arc<Mutex<HashMap<String, Entry>>>,
    }

    impl MemoryKv {
        pub fn new() -> Self {
            Self::default()
        }

        fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Entry>> {
            match self.entries.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            }
        }
    }

    /// Glob match supporting only `*`, the single wildcard the cache
    /// patterns use.
    fn glob_match(pattern: &str, key: &str) -> bool {
        let mut rest = key;
        let mut parts = pattern.split('*');

        let Some(first) = parts.next() else {
            return key.is_empty();
        };
        let Some(stripped) = rest.strip_prefix(first) else {
            return false;
        };
        rest = stripped;

        let mut trailing_wildcard = pattern.ends_with('*');
        for part in parts {
            if part.is_empty() {
                trailing_wildcard = true;
                continue;
            }
            match rest.find(part) {
                Some(idx) => rest = &rest[idx + part.len()..],
                None => return false,
            }
            trailing_wildcard = pattern.ends_with('*');
        }

        trailing_wildcard || rest.is_empty()
    }

    impl KvStore for MemoryKv {
        async fn get(&self, key: &str) -> Result<Option<String>, redis::RedisError> {
            let mut entries = self.lock();
            if entries.get(key).is_some_and(Entry::is_expired) {
                entries.remove(key);
            }
            Ok(entries.get(key).map(|e| e.value.clone()))
        }

        async fn set_with_expiry(
            &self,
            key: &str,
            ttl_seconds: u64,
            value: &str,
        ) -> Result<(), redis::RedisError> {
            self.lock().insert(
                key.to_string(),
                Entry {
                    value: value.to_string(),
                    expires_at: Some(Instant::now() + Duration::from_secs(ttl_seconds)),
                },
            );
            Ok(())
        }

        async fn delete(&self, key: &str) -> Result<(), redis::RedisError> {
            self.lock().remove(key);
            Ok(())
        }

        async fn delete_many(&self, keys: &[String]) -> Result<(), redis::RedisError> {
            let mut entries = self.lock();
            for key in keys {
                entries.remove(key);
            }
            Ok(())
        }

        async fn increment(&self, key: &str) -> Result<i64, redis::RedisError> {
            let mut entries = self.lock();
            if entries.get(key).is_some_and(Entry::is_expired) {
                entries.remove(key);
            }
            let next = entries
                .get(key)
                .and_then(|e| e.value.parse::<i64>().ok())
                .unwrap_or(0)
                + 1;
            let expires_at = entries.get(key).and_then(|e| e.expires_at);
            entries.insert(
                key.to_string(),
                Entry {
                    value: next.to_string(),
                    expires_at,
                },
            );
            Ok(next)
        }

        async fn expire(&self, key: &str, ttl_seconds: i64) -> Result<(), redis::RedisError> {
            if let Some(entry) = self.lock().get_mut(key) {
                entry.expires_at =
                    Some(Instant::now() + Duration::from_secs(ttl_seconds.max(0) as u64));
            }
            Ok(())
        }

        async fn time_to_live(&self, key: &str) -> Result<i64, redis::RedisError> {
            let mut entries = self.lock();
            if entries.get(key).is_some_and(Entry::is_expired) {
                entries.remove(key);
            }
            let Some(entry) = entries.get(key) else {
                return Ok(-2);
            };
            let Some(expires_at) = entry.expires_at else {
                return Ok(-1);
            };
            let remaining = expires_at.saturating_duration_since(Instant::now());
            // Round up so a freshly-set TTL reads back whole.
            Ok(remaining.as_millis().div_ceil(1000) as i64)
        }

        async fn scan_matching(
            &self,
            _cursor: u64,
            pattern: &str,
            _batch: usize,
        ) -> Result<(u64, Vec<String>), redis::RedisError> {
            let keys = self
                .lock()
                .iter()
                .filter(|(_, e)| !e.is_expired())
                .filter(|(k, _)| glob_match(pattern, k))
                .map(|(k, _)| k.clone())
                .collect();
            Ok((0, keys))
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn glob_star_matches_middle_segment() {
            assert!(glob_match("users:*:abc", "users:self:abc"));
            assert!(glob_match("users:*:abc", "users:public:abc"));
            assert!(!glob_match("users:*:abc", "users:self:def"));
            assert!(!glob_match("users:*:abc", "posts:self:abc"));
        }

        #[test]
        fn glob_without_star_is_exact() {
            assert!(glob_match("rate:forgot:1.2.3.4", "rate:forgot:1.2.3.4"));
            assert!(!glob_match("rate:forgot", "rate:forgot:1.2.3.4"));
        }

        #[test]
        fn trailing_star_matches_any_suffix() {
            assert!(glob_match("listing:abc:*", "listing:abc:recent"));
            assert!(glob_match("users:*", "users:self:abc"));
        }

        #[tokio::test]
        async fn expired_entries_read_as_absent() {
            let kv = MemoryKv::new();
            kv.set_with_expiry("k", 0, "v").await.unwrap();
            assert_eq!(kv.get("k").await.unwrap(), None);
            assert_eq!(kv.time_to_live("k").await.unwrap(), -2);
        }
    }
}
