//! Session records over an external keyed cache.
//!
//! The store owns no expiry logic; record lifetime is delegated entirely to
//! the cache collaborator's eviction policy.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::warn;
use uuid::Uuid;

use super::principal::UserSnapshot;

/// Contract for the keyed cache collaborator. Implementations own expiry and
/// eviction; per-key get/set/delete are treated as atomic.
#[async_trait]
pub trait SessionCache: Send + Sync {
    async fn get(&self, key: &str) -> Option<String>;
    async fn set(&self, key: &str, value: String);
    async fn delete(&self, key: &str) -> bool;
}

/// In-process cache used by the server binary and tests.
#[derive(Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionCache for MemoryCache {
    async fn get(&self, key: &str) -> Option<String> {
        self.entries.read().get(key).cloned()
    }

    async fn set(&self, key: &str, value: String) {
        self.entries.write().insert(key.to_string(), value);
    }

    async fn delete(&self, key: &str) -> bool {
        self.entries.write().remove(key).is_some()
    }
}

/// Maps session identifiers to serialized user snapshots.
#[derive(Clone)]
pub struct SessionStore {
    cache: Arc<dyn SessionCache>,
}

impl SessionStore {
    pub fn new(cache: Arc<dyn SessionCache>) -> Self {
        Self { cache }
    }

    /// Allocate a fresh session identifier and store the snapshot under it.
    pub async fn create(&self, user: &UserSnapshot) -> anyhow::Result<String> {
        let session_id = Uuid::new_v4().to_string();
        let snapshot = serde_json::to_string(user)?;
        self.cache.set(&session_id, snapshot).await;
        Ok(session_id)
    }

    /// Unparseable records read as absent; the cache entry is not trusted
    /// beyond what deserializes.
    pub async fn read(&self, session_id: &str) -> Option<UserSnapshot> {
        let raw = self.cache.get(session_id).await?;
        match serde_json::from_str(&raw) {
            Ok(user) => Some(user),
            Err(e) => {
                warn!(target: "auth", "unreadable session record sid={} err={}", session_id, e);
                None
            }
        }
    }

    /// True if a record existed and was removed.
    pub async fn remove(&self, session_id: &str) -> bool {
        self.cache.delete(session_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> SessionStore {
        SessionStore::new(Arc::new(MemoryCache::new()))
    }

    #[tokio::test]
    async fn create_then_read_returns_snapshot() {
        let store = store();
        let user = UserSnapshot { id: "u1".into(), name: Some("Ada".into()), email: None };
        let sid = store.create(&user).await.unwrap();
        assert_eq!(store.read(&sid).await, Some(user));
    }

    #[tokio::test]
    async fn distinct_sessions_get_distinct_ids() {
        let store = store();
        let user = UserSnapshot::new("u1");
        let a = store.create(&user).await.unwrap();
        let b = store.create(&user).await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn remove_is_idempotent() {
        let store = store();
        let sid = store.create(&UserSnapshot::new("u1")).await.unwrap();
        assert!(store.remove(&sid).await);
        assert!(!store.remove(&sid).await);
        assert_eq!(store.read(&sid).await, None);
    }

    #[tokio::test]
    async fn corrupt_record_reads_as_absent() {
        let cache = Arc::new(MemoryCache::new());
        cache.set("sid-x", "not json".to_string()).await;
        let store = SessionStore::new(cache);
        assert_eq!(store.read("sid-x").await, None);
    }
}
