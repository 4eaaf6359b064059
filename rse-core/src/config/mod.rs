//! Runtime configuration consumed by the core components.
//!
//! Loading and validating the TOML file is the server's job; these are the
//! validated values it hands over. Sections that can change on `SIGHUP`
//! are shared through a [`ConfigStore`].

mod config_store;

pub use config_store::{ConfigStore, ConfigWatcher};

use std::time::Duration;

use crate::retry::RetryPolicy;

/// Page size bounds for polls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollLimits {
    /// Page size when the client does not ask for one.
    pub default_max_events: u32,
    /// Largest page a client may ask for.
    pub max_events_ceiling: u32,
}

impl Default for PollLimits {
    fn default() -> Self {
        Self {
            default_max_events: 200,
            max_events_ceiling: 500,
        }
    }
}

impl PollLimits {
    /// Effective page size for a request. `0` is treated as `1` since
    /// neither store can express an unlimited page.
    pub fn clamp(&self, requested: Option<u32>) -> u32 {
        requested
            .unwrap_or(self.default_max_events)
            .clamp(1, self.max_events_ceiling.max(1))
    }
}

/// How long events are kept, and how often expired ones are deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionConfig {
    pub ttl: Duration,
    pub sweep_interval: Duration,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(130),
            sweep_interval: Duration::from_secs(30),
        }
    }
}

/// Retry budgets for publishing and polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    /// Id collisions between concurrent publishers.
    pub contention: RetryPolicy,
    /// Store or cache unreachable.
    pub connectivity: RetryPolicy,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            contention: RetryPolicy::ID_CONTENTION,
            connectivity: RetryPolicy::CONNECTIVITY,
        }
    }
}
