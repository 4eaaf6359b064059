use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio::time::Instant;

use super::cache::{AuthCache, CacheError};

/// Process-local [`AuthCache`] with per-entry expiry.
///
/// Expired entries are dropped lazily when they are next written.
#[derive(Debug, Default)]
pub struct MemoryAuthCache {
    entries: RwLock<HashMap<String, Instant>>,
}

impl MemoryAuthCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AuthCache for MemoryAuthCache {
    async fn get(&self, key: &str) -> Result<bool, CacheError> {
        let entries = self.entries.read().await;
        Ok(entries
            .get(key)
            .is_some_and(|expires_at| *expires_at > Instant::now()))
    }

    async fn set(&self, key: &str, ttl: Duration) -> Result<(), CacheError> {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        entries.retain(|_, expires_at| *expires_at > now);
        entries.insert(key.to_string(), now + ttl);
        Ok(())
    }
}
