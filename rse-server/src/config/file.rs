//! TOML file configuration structures.
//!
//! These structs directly map to the `rse-config.toml` file format. Every
//! section may be omitted.

use rse_core::retry::RetryPolicy;
use serde::Deserialize;
use std::net::{Ipv4Addr, SocketAddr};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub server: ServerSection,
    pub store: StoreSection,
    pub events: EventsSection,
    pub poll: PollSection,
    pub allocator: AllocatorSection,
    pub auth: AuthSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerSection {
    pub listen: SocketAddr,
    /// Relaxes token and client uuid requirements and enables `GET /all`.
    pub test_mode: bool,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from((Ipv4Addr::UNSPECIFIED, 8080)),
            test_mode: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreSection {
    pub backend: StoreBackend,
    pub max_connections: u32,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Postgres,
            max_connections: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EventsSection {
    /// Events older than this are deleted by the retention sweeper.
    pub ttl_seconds: u64,
    /// Value the fallback id counter starts from on a fresh database.
    pub first_event: i64,
    pub sweep_interval_seconds: u64,
}

impl Default for EventsSection {
    fn default() -> Self {
        Self {
            ttl_seconds: 130,
            first_event: 0,
            sweep_interval_seconds: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PollSection {
    pub default_max_events: u32,
    pub max_events_ceiling: u32,
}

impl Default for PollSection {
    fn default() -> Self {
        Self {
            default_max_events: 200,
            max_events_ceiling: 500,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AllocatorSection {
    pub contention: RetryPolicy,
    pub connectivity: RetryPolicy,
}

impl Default for AllocatorSection {
    fn default() -> Self {
        Self {
            contention: RetryPolicy::ID_CONTENTION,
            connectivity: RetryPolicy::CONNECTIVITY,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuthSection {
    pub token_prefix: String,
    /// Keys (prefix + token) at least this long are replaced by their
    /// SHA-512 digest.
    pub hashing_threshold: usize,
    pub cache: AuthCacheSection,
}

impl Default for AuthSection {
    fn default() -> Self {
        Self {
            token_prefix: "auth-token-".to_string(),
            hashing_threshold: 250,
            cache: AuthCacheSection::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    #[default]
    Memory,
    Postgres,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuthCacheSection {
    pub backend: CacheBackend,
    /// Raw tokens written to the cache at startup.
    pub seed_tokens: Vec<String>,
    pub seed_ttl_seconds: u64,
}

impl Default for AuthCacheSection {
    fn default() -> Self {
        Self {
            backend: CacheBackend::Memory,
            seed_tokens: Vec::new(),
            seed_ttl_seconds: 24 * 60 * 60,
        }
    }
}
