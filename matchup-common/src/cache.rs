//! In-process key-value cache with per-entry TTL
//!
//! Stands in for the key-value cache capability the rating engine consumes:
//! `get` / `set_with_ttl` / `delete` over string keys and JSON string
//! values. Keys are composed explicitly by callers (`pool:{session}`,
//! `grid:{session}`); a miss always means "recompute", never an error.
//! Entries expire lazily on read; mutation sites delete or refill entries
//! directly rather than waiting for expiry.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Default entry lifetime, matching the engine's cache horizon.
pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

struct Entry {
    value: String,
    expires_at: Instant,
}

/// Shared TTL cache. Cheap to clone; clones share the same store.
#[derive(Clone, Default)]
pub struct Cache {
    entries: Arc<RwLock<HashMap<String, Entry>>>,
}

impl Cache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a live entry. Expired entries are removed and reported as
    /// a miss.
    pub async fn get(&self, key: &str) -> Option<String> {
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some(entry) if entry.expires_at > Instant::now() => {
                    return Some(entry.value.clone());
                }
                Some(_) => {} // expired, fall through to removal
                None => return None,
            }
        }

        self.entries.write().await.remove(key);
        None
    }

    /// Insert or replace an entry with the given lifetime.
    pub async fn set_with_ttl(&self, key: impl Into<String>, value: impl Into<String>, ttl: Duration) {
        let entry = Entry {
            value: value.into(),
            expires_at: Instant::now() + ttl,
        };
        self.entries.write().await.insert(key.into(), entry);
    }

    /// Remove an entry. Removing an absent key is a no-op.
    pub async fn delete(&self, key: &str) {
        self.entries.write().await.remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_then_get_round_trip() {
        let cache = Cache::new();
        cache.set_with_ttl("pool:abc", "[1,2,3]", DEFAULT_TTL).await;
        assert_eq!(cache.get("pool:abc").await.as_deref(), Some("[1,2,3]"));
    }

    #[tokio::test]
    async fn miss_on_absent_key() {
        let cache = Cache::new();
        assert!(cache.get("grid:missing").await.is_none());
    }

    #[tokio::test]
    async fn expired_entry_is_a_miss() {
        let cache = Cache::new();
        cache
            .set_with_ttl("pool:short", "[]", Duration::from_millis(10))
            .await;
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(cache.get("pool:short").await.is_none());
    }

    #[tokio::test]
    async fn delete_removes_entry() {
        let cache = Cache::new();
        cache.set_with_ttl("grid:abc", "[[]]", DEFAULT_TTL).await;
        cache.delete("grid:abc").await;
        assert!(cache.get("grid:abc").await.is_none());
    }

    #[tokio::test]
    async fn overwrite_replaces_value() {
        let cache = Cache::new();
        cache.set_with_ttl("pool:abc", "[1]", DEFAULT_TTL).await;
        cache.set_with_ttl("pool:abc", "[2]", DEFAULT_TTL).await;
        assert_eq!(cache.get("pool:abc").await.as_deref(), Some("[2]"));
    }

    #[tokio::test]
    async fn clones_share_the_store() {
        let cache = Cache::new();
        let clone = cache.clone();
        clone.set_with_ttl("pool:abc", "[1]", DEFAULT_TTL).await;
        assert_eq!(cache.get("pool:abc").await.as_deref(), Some("[1]"));
    }
}
