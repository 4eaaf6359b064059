use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    #[error("auth cache unavailable: {0}")]
    Unavailable(String),
    #[error("auth cache error: {0}")]
    Backend(String),
}

/// Store of recently validated auth keys.
///
/// Entries are written by whatever validates tokens against the identity
/// service; the gate only reads them. Presence of an unexpired entry means
/// the token is authorized.
#[async_trait]
pub trait AuthCache: Send + Sync {
    /// Whether an unexpired entry exists for `key`.
    async fn get(&self, key: &str) -> Result<bool, CacheError>;

    /// Insert or refresh `key` for `ttl`.
    async fn set(&self, key: &str, ttl: Duration) -> Result<(), CacheError>;
}
