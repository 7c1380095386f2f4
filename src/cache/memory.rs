//! In-process TTL store holding serialized values.

use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;

#[derive(Debug, Clone)]
struct Entry {
    payload: Vec<u8>,
    expires_at: Instant,
}

/// Concurrent key/value map with passive expiry. Expired entries are
/// dropped on the read that discovers them or by `purge_expired`.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: DashMap<String, Entry>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        let now = Instant::now();
        if let Some(entry) = self.entries.get(key) {
            if entry.expires_at > now {
                return Some(entry.payload.clone());
            }
        }
        self.entries.remove_if(key, |_, e| e.expires_at <= now);
        None
    }

    /// Store `payload` for `ttl`. A TTL past the clock's range is not stored.
    pub fn set(&self, key: String, payload: Vec<u8>, ttl: Duration) {
        let Some(expires_at) = Instant::now().checked_add(ttl) else {
            tracing::warn!(
                key = %key,
                ttl_secs = ttl.as_secs(),
                "Cache TTL out of range, entry not stored"
            );
            return;
        };
        self.entries.insert(key, Entry { payload, expires_at });
    }

    pub fn delete(&self, key: &str) {
        self.entries.remove(key);
    }

    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, e| e.expires_at > now);
        before - self.entries.len()
    }

    pub fn clear(&self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        count
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_entry_expires_passively() {
        let backend = MemoryBackend::new();
        backend.set("k".into(), b"v".to_vec(), Duration::from_secs(5));

        tokio::time::advance(Duration::from_secs(4)).await;
        assert_eq!(backend.get("k"), Some(b"v".to_vec()));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(backend.get("k"), None);
        assert!(backend.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_and_clear() {
        let backend = MemoryBackend::new();
        backend.set("short".into(), vec![1], Duration::from_secs(1));
        backend.set("long".into(), vec![2], Duration::from_secs(60));

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(backend.purge_expired(), 1);
        assert_eq!(backend.len(), 1);
        assert_eq!(backend.clear(), 1);
        assert!(backend.get("long").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_overwrites_and_resets_ttl() {
        let backend = MemoryBackend::new();
        backend.set("k".into(), vec![1], Duration::from_secs(2));
        tokio::time::advance(Duration::from_secs(1)).await;
        backend.set("k".into(), vec![2], Duration::from_secs(2));
        tokio::time::advance(Duration::from_millis(1500)).await;
        assert_eq!(backend.get("k"), Some(vec![2]));
    }

    #[tokio::test]
    async fn test_unrepresentable_ttl_is_not_stored() {
        let backend = MemoryBackend::new();
        backend.set("k".into(), vec![1], Duration::MAX);
        assert!(backend.is_empty());
    }
}
