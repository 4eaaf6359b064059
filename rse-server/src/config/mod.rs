//! Configuration module for rse-server.
//!
//! Handles loading configuration from the TOML file, CLI overrides and
//! environment variables.

pub mod file;
pub mod runtime;

use crate::config::file::FileConfig;
use crate::config::runtime::{CacheSettings, RuntimeConfig, StoreSettings};
use rse_core::auth::KeyFormat;
use rse_core::config::{PollLimits, RetentionConfig, RetryConfig};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("DATABASE_URL environment variable not set")]
    MissingDatabaseUrl,
}

/// Reads, validates and converts the config file.
pub struct ConfigLoader {
    config_path: PathBuf,
    listen_override: Option<SocketAddr>,
}

impl ConfigLoader {
    pub fn new(config_path: impl AsRef<Path>, listen_override: Option<SocketAddr>) -> Self {
        Self {
            config_path: config_path.as_ref().to_path_buf(),
            listen_override,
        }
    }

    /// Load the configuration. A missing file means all defaults.
    pub fn load(&self) -> Result<RuntimeConfig, ConfigError> {
        let file_config = match std::fs::read_to_string(&self.config_path) {
            Ok(content) => toml::from_str(&content)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    "Config file {:?} not found, using defaults",
                    self.config_path
                );
                FileConfig::default()
            }
            Err(e) => return Err(e.into()),
        };
        self.build(file_config)
    }

    /// Reload the configuration (used during SIGHUP).
    pub fn reload(&self) -> Result<RuntimeConfig, ConfigError> {
        self.load()
    }

    pub fn build(&self, mut file_config: FileConfig) -> Result<RuntimeConfig, ConfigError> {
        if let Some(listen) = self.listen_override {
            file_config.server.listen = listen;
        }
        validate(&file_config)?;

        let FileConfig {
            server,
            store,
            events,
            poll,
            allocator,
            auth,
        } = file_config;

        Ok(RuntimeConfig {
            listen: server.listen,
            test_mode: server.test_mode,
            store: StoreSettings {
                backend: store.backend,
                max_connections: store.max_connections,
            },
            first_event: events.first_event,
            retention: RetentionConfig {
                ttl: Duration::from_secs(events.ttl_seconds),
                sweep_interval: Duration::from_secs(events.sweep_interval_seconds),
            },
            poll: PollLimits {
                default_max_events: poll.default_max_events,
                max_events_ceiling: poll.max_events_ceiling,
            },
            retry: RetryConfig {
                contention: allocator.contention,
                connectivity: allocator.connectivity,
            },
            key_format: KeyFormat {
                prefix: auth.token_prefix,
                hashing_threshold: auth.hashing_threshold,
            },
            cache: CacheSettings {
                backend: auth.cache.backend,
                seed_tokens: auth.cache.seed_tokens,
                seed_ttl: Duration::from_secs(auth.cache.seed_ttl_seconds),
            },
        })
    }
}

fn validate(config: &FileConfig) -> Result<(), ConfigError> {
    let invalid = |msg: &str| Err(ConfigError::ValidationError(msg.to_string()));

    if config.store.max_connections == 0 {
        return invalid("store.max_connections must be at least 1");
    }
    if config.events.ttl_seconds == 0 {
        return invalid("events.ttl_seconds must be positive");
    }
    if config.events.sweep_interval_seconds == 0 {
        return invalid("events.sweep_interval_seconds must be positive");
    }
    if config.events.first_event < 0 {
        return invalid("events.first_event must not be negative");
    }
    if config.poll.default_max_events == 0 || config.poll.max_events_ceiling == 0 {
        return invalid("poll limits must be at least 1");
    }
    if config.poll.default_max_events > config.poll.max_events_ceiling {
        return invalid("poll.default_max_events exceeds poll.max_events_ceiling");
    }
    if config.allocator.contention.max_attempts == 0
        || config.allocator.connectivity.max_attempts == 0
    {
        return invalid("allocator max_attempts must be at least 1");
    }
    if config.auth.cache.seed_tokens.iter().any(String::is_empty) {
        return invalid("auth.cache.seed_tokens must not contain empty tokens");
    }
    Ok(())
}

/// Get the database URL from the environment.
pub fn get_database_url() -> Result<String, ConfigError> {
    std::env::var("DATABASE_URL").map_err(|_| ConfigError::MissingDatabaseUrl)
}

/// Optional read replica for polls.
pub fn get_replica_url() -> Option<String> {
    std::env::var("DATABASE_REPLICA_URL")
        .ok()
        .filter(|url| !url.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loader() -> ConfigLoader {
        ConfigLoader::new("unused.toml", None)
    }

    #[test]
    fn defaults_build() {
        let config = loader().build(FileConfig::default()).unwrap();
        assert_eq!(config.poll, PollLimits::default());
        assert_eq!(config.retention.ttl, Duration::from_secs(130));
        assert_eq!(config.key_format.hashing_threshold, 250);
        assert!(!config.test_mode);
    }

    #[test]
    fn listen_override_wins() {
        let listen: SocketAddr = "127.0.0.1:9999".parse().unwrap();
        let config = ConfigLoader::new("unused.toml", Some(listen))
            .build(FileConfig::default())
            .unwrap();
        assert_eq!(config.listen, listen);
    }

    #[test]
    fn inconsistent_poll_limits_are_rejected() {
        let file: FileConfig =
            toml::from_str("[poll]\ndefault_max_events = 600\nmax_events_ceiling = 500\n").unwrap();
        assert!(matches!(
            loader().build(file),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let path = std::env::temp_dir().join("rse-config-does-not-exist.toml");
        let config = ConfigLoader::new(path, None).load().unwrap();
        assert_eq!(config.listen.port(), 8080);
    }
}
