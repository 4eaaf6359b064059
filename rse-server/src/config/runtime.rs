//! Validated runtime configuration.

use std::net::SocketAddr;
use std::time::Duration;

use rse_core::auth::KeyFormat;
use rse_core::config::{PollLimits, RetentionConfig, RetryConfig};

use super::file::{CacheBackend, StoreBackend};

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub listen: SocketAddr,
    pub test_mode: bool,
    pub store: StoreSettings,
    pub first_event: i64,
    /// Reloadable.
    pub retention: RetentionConfig,
    /// Reloadable.
    pub poll: PollLimits,
    pub retry: RetryConfig,
    pub key_format: KeyFormat,
    pub cache: CacheSettings,
}

#[derive(Debug, Clone, Copy)]
pub struct StoreSettings {
    pub backend: StoreBackend,
    pub max_connections: u32,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub backend: CacheBackend,
    pub seed_tokens: Vec<String>,
    pub seed_ttl: Duration,
}
