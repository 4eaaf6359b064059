//! Application state shared across all request handlers.

use std::sync::Arc;

use rse_core::allocator::IdAllocator;
use rse_core::auth::{AuthCache, AuthGate};
use rse_core::config::{ConfigStore, PollLimits, RetentionConfig};
use rse_core::poller::EventPoller;
use rse_core::publisher::EventPublisher;
use rse_core::retry::RetryPolicy;
use rse_core::stats::SharedCounters;
use rse_core::store::EventStore;

use crate::config::runtime::RuntimeConfig;

/// Cheap to clone; everything is behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub publisher: Arc<EventPublisher>,
    pub poller: Arc<EventPoller>,
    pub gate: Arc<AuthGate>,
    pub stats: Arc<SharedCounters>,
    pub store: Arc<dyn EventStore>,
    pub cache: Arc<dyn AuthCache>,
    /// Retry budget for health checks.
    pub connectivity: RetryPolicy,
    /// Reloaded on SIGHUP.
    pub poll_limits: ConfigStore<PollLimits>,
    /// Reloaded on SIGHUP.
    pub retention: ConfigStore<RetentionConfig>,
    pub test_mode: bool,
}

impl AppState {
    /// Wire the core components around the chosen backends.
    pub fn new(
        config: &RuntimeConfig,
        store: Arc<dyn EventStore>,
        cache: Arc<dyn AuthCache>,
    ) -> Self {
        let stats = Arc::new(SharedCounters::new());
        let poll_limits = ConfigStore::new(config.poll);
        let retention = ConfigStore::new(config.retention);

        let allocator = IdAllocator::new(store.clone(), stats.clone(), config.retry.contention);
        let publisher = EventPublisher::new(allocator, config.retry.connectivity, config.test_mode);
        let poller = EventPoller::new(
            store.clone(),
            poll_limits.clone(),
            config.retry.connectivity,
            config.test_mode,
        );
        let gate = AuthGate::new(
            cache.clone(),
            config.key_format.clone(),
            config.test_mode,
            stats.clone(),
        );

        Self {
            publisher: Arc::new(publisher),
            poller: Arc::new(poller),
            gate: Arc::new(gate),
            stats,
            store,
            cache,
            connectivity: config.retry.connectivity,
            poll_limits,
            retention,
            test_mode: config.test_mode,
        }
    }

    /// Apply the reloadable sections of a freshly loaded config.
    pub fn apply_reload(&self, config: &RuntimeConfig) {
        self.poll_limits.update(config.poll);
        self.retention.update(config.retention);
    }
}
