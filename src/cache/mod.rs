//! Identity cache (cache-aside).
//!
//! # Responsibilities
//! - Hold recently resolved users so authentication can skip the repository
//! - Never be authoritative: every failure reads as a miss
//!
//! # Data Flow
//! ```text
//! IdentityResolver
//!     → UserCache::get ("user:{id}")
//!         hit  → User
//!         miss / error → repository read → UserCache::set (fire-and-forget)
//! ```
//!
//! # Design Decisions
//! - The backend is chosen once at construction (`CacheBackend`); callers
//!   never branch on which one is active
//! - TTL = base + uniform jitter in [0, jitter) so entries written together
//!   do not expire together
//! - Every backend call runs under the store-call deadline

pub mod memory;

use std::time::Duration;

use rand::Rng;

use crate::config::{CacheConfig, TimeoutConfig};
use crate::observability::metrics;
use crate::resilience::{with_deadline, DeadlineExceeded};
use crate::store::User;

pub use memory::MemoryBackend;

const USER_KEY_PREFIX: &str = "user:";

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache payload could not be encoded or decoded: {0}")]
    Codec(#[from] serde_json::Error),
    #[error("cache call timed out")]
    Timeout(#[from] DeadlineExceeded),
}

/// Storage behind the identity cache.
#[derive(Debug)]
pub enum CacheBackend {
    Memory(MemoryBackend),
    /// Always misses, never fails.
    Disabled,
}

impl CacheBackend {
    async fn get(&self, key: &str) -> Option<Vec<u8>> {
        match self {
            CacheBackend::Memory(m) => m.get(key),
            CacheBackend::Disabled => None,
        }
    }

    async fn set(&self, key: String, payload: Vec<u8>, ttl: Duration) {
        if let CacheBackend::Memory(m) = self {
            m.set(key, payload, ttl);
        }
    }

    async fn delete(&self, key: &str) {
        if let CacheBackend::Memory(m) = self {
            m.delete(key);
        }
    }
}

/// Counters shown on the operator cache route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct CacheStats {
    /// "memory" or "disabled".
    pub backend: &'static str,
    pub entries: usize,
}

/// Cache-aside store for `User` records.
#[derive(Debug)]
pub struct UserCache {
    backend: CacheBackend,
    ttl: Duration,
    jitter: Duration,
    call_deadline: Duration,
}

impl UserCache {
    pub fn new(
        backend: CacheBackend,
        ttl: Duration,
        jitter: Duration,
        call_deadline: Duration,
    ) -> Self {
        Self {
            backend,
            ttl,
            jitter,
            call_deadline,
        }
    }

    pub fn from_config(cache: &CacheConfig, timeouts: &TimeoutConfig) -> Self {
        let backend = if cache.enabled {
            CacheBackend::Memory(MemoryBackend::new())
        } else {
            CacheBackend::Disabled
        };
        tracing::info!(
            enabled = cache.enabled,
            ttl_secs = cache.ttl_secs,
            jitter_secs = cache.jitter_secs,
            "Identity cache configured"
        );
        Self::new(
            backend,
            Duration::from_secs(cache.ttl_secs),
            Duration::from_secs(cache.jitter_secs),
            timeouts.store_call(),
        )
    }

    /// A cache that always misses.
    pub fn disabled() -> Self {
        Self::new(CacheBackend::Disabled, Duration::ZERO, Duration::ZERO, Duration::from_secs(5))
    }

    fn key(id: i64) -> String {
        format!("{USER_KEY_PREFIX}{id}")
    }

    fn ttl_with_jitter(&self) -> Duration {
        let jitter_ms = self.jitter.as_millis() as u64;
        if jitter_ms == 0 {
            return self.ttl;
        }
        self.ttl
            .saturating_add(Duration::from_millis(rand::thread_rng().gen_range(0..jitter_ms)))
    }

    /// Look up a user. Misses and failures are indistinguishable to the caller.
    pub async fn get(&self, id: i64) -> Option<User> {
        let key = Self::key(id);
        match self.try_get(&key).await {
            Ok(Some(user)) => {
                metrics::record_cache_lookup("hit");
                Some(user)
            }
            Ok(None) => {
                metrics::record_cache_lookup("miss");
                None
            }
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Cache read failed, treating as miss");
                metrics::record_cache_lookup("error");
                if matches!(e, CacheError::Codec(_)) {
                    self.backend.delete(&key).await;
                }
                None
            }
        }
    }

    async fn try_get(&self, key: &str) -> Result<Option<User>, CacheError> {
        let payload = with_deadline(self.call_deadline, self.backend.get(key)).await?;
        match payload {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Store a user. Failures are logged and swallowed.
    pub async fn set(&self, user: &User) {
        if let Err(e) = self.try_set(user).await {
            tracing::warn!(user_id = user.id, error = %e, "Cache write failed");
        }
    }

    async fn try_set(&self, user: &User) -> Result<(), CacheError> {
        let payload = serde_json::to_vec(user)?;
        let ttl = self.ttl_with_jitter();
        let write = self.backend.set(Self::key(user.id), payload, ttl);
        with_deadline(self.call_deadline, write).await?;
        Ok(())
    }

    /// Evict a user, e.g. after activation or deletion.
    pub async fn delete(&self, id: i64) -> Result<(), CacheError> {
        with_deadline(self.call_deadline, self.backend.delete(&Self::key(id))).await?;
        Ok(())
    }

    /// Drop every entry. Returns how many were removed.
    pub fn flush(&self) -> usize {
        match &self.backend {
            CacheBackend::Memory(m) => m.clear(),
            CacheBackend::Disabled => 0,
        }
    }

    pub fn stats(&self) -> CacheStats {
        match &self.backend {
            CacheBackend::Memory(m) => {
                m.purge_expired();
                CacheStats {
                    backend: "memory",
                    entries: m.len(),
                }
            }
            CacheBackend::Disabled => CacheStats {
                backend: "disabled",
                entries: 0,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn user(id: i64) -> User {
        User {
            id,
            username: format!("user{id}"),
            email: format!("user{id}@example.com"),
            created_at: Utc::now(),
            is_active: true,
            role: "user".to_string(),
        }
    }

    fn memory_cache() -> UserCache {
        UserCache::new(
            CacheBackend::Memory(MemoryBackend::new()),
            Duration::from_secs(600),
            Duration::from_secs(30),
            Duration::from_secs(5),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_lives_for_base_ttl() {
        let cache = memory_cache();
        let alice = user(42);
        assert!(cache.get(42).await.is_none());

        cache.set(&alice).await;
        tokio::time::advance(Duration::from_secs(9 * 60)).await;
        assert_eq!(cache.get(42).await, Some(alice));

        tokio::time::advance(Duration::from_secs(2 * 60)).await;
        assert!(cache.get(42).await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_jitter_stays_below_bound() {
        let cache = memory_cache();
        for _ in 0..100 {
            let ttl = cache.ttl_with_jitter();
            assert!(ttl >= Duration::from_secs(600));
            assert!(ttl < Duration::from_secs(630));
        }
    }

    #[tokio::test]
    async fn test_disabled_backend_always_misses() {
        let cache = UserCache::disabled();
        cache.set(&user(1)).await;
        assert!(cache.get(1).await.is_none());
        assert!(cache.delete(1).await.is_ok());
        assert_eq!(cache.stats(), CacheStats { backend: "disabled", entries: 0 });
    }

    #[tokio::test]
    async fn test_corrupt_entry_reads_as_miss_and_is_evicted() {
        let cache = memory_cache();
        if let CacheBackend::Memory(m) = &cache.backend {
            m.set(UserCache::key(7), b"{not json".to_vec(), Duration::from_secs(60));
        }
        assert!(cache.get(7).await.is_none());
        assert_eq!(cache.stats().entries, 0);
    }

    #[tokio::test]
    async fn test_delete_and_flush() {
        let cache = memory_cache();
        cache.set(&user(1)).await;
        cache.set(&user(2)).await;

        cache.delete(1).await.unwrap();
        assert!(cache.get(1).await.is_none());
        assert_eq!(cache.get(2).await.map(|u| u.id), Some(2));

        assert_eq!(cache.flush(), 1);
        assert_eq!(cache.stats(), CacheStats { backend: "memory", entries: 0 });
    }
}
