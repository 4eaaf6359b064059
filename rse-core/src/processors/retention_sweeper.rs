//! Periodic deletion of expired events.
//!
//! Postgres has no per-row TTL, so a sweeper deletes events whose
//! `created_at` is older than the retention window. The window and the
//! sweep interval are re-read whenever the config is reloaded.

use std::sync::Arc;

use time::OffsetDateTime;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::config::{ConfigStore, ConfigWatcher, RetentionConfig};
use crate::store::{EventStore, StoreError};

pub struct RetentionSweeper {
    store: Arc<dyn EventStore>,
    config: ConfigWatcher<RetentionConfig>,
    shutdown_rx: watch::Receiver<bool>,
}

impl RetentionSweeper {
    pub fn new(
        store: Arc<dyn EventStore>,
        config: &ConfigStore<RetentionConfig>,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            store,
            config: config.subscribe(),
            shutdown_rx,
        }
    }

    /// Delete events older than `ttl` as of `now`.
    pub async fn sweep_once(&self, ttl: std::time::Duration, now: OffsetDateTime) -> Result<u64, StoreError> {
        let cutoff = time::Duration::try_from(ttl)
            .ok()
            .and_then(|ttl| now.checked_sub(ttl))
            .unwrap_or(OffsetDateTime::UNIX_EPOCH);
        self.store.purge_before(cutoff).await
    }

    pub async fn run(mut self) {
        let mut config = self.config.current();
        info!(
            ttl_secs = config.ttl.as_secs(),
            interval_secs = config.sweep_interval.as_secs(),
            "RetentionSweeper started"
        );
        let mut ticker = new_ticker(&config);

        loop {
            tokio::select! {
                biased;

                _ = self.shutdown_rx.changed() => {
                    if *self.shutdown_rx.borrow() {
                        info!("RetentionSweeper received shutdown signal");
                        break;
                    }
                }

                changed = self.config.changed() => {
                    match changed {
                        Ok(updated) => {
                            config = updated;
                            ticker = new_ticker(&config);
                            info!(
                                ttl_secs = config.ttl.as_secs(),
                                interval_secs = config.sweep_interval.as_secs(),
                                "RetentionSweeper reloaded config"
                            );
                        }
                        Err(_) => {
                            info!("Retention config store dropped");
                            break;
                        }
                    }
                }

                _ = ticker.tick() => {
                    match self.sweep_once(config.ttl, OffsetDateTime::now_utc()).await {
                        Ok(0) => {}
                        Ok(removed) => debug!(removed, "expired events deleted"),
                        Err(e) => error!(error = %e, "retention sweep failed"),
                    }
                }
            }
        }

        info!("RetentionSweeper shutdown complete");
    }
}

fn new_ticker(config: &RetentionConfig) -> tokio::time::Interval {
    let period = config.sweep_interval.max(std::time::Duration::from_secs(1));
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::event::NewEvent;
    use crate::store::MemoryEventStore;
    use std::time::Duration;

    fn event(id: i64, created_at: OffsetDateTime) -> NewEvent {
        NewEvent {
            id,
            channel: "/c".to_string(),
            data: "{}".to_string(),
            user_agent: String::new(),
            uuid: String::new(),
            created_at,
        }
    }

    #[tokio::test]
    async fn sweep_keeps_events_inside_the_window() {
        let store = Arc::new(MemoryEventStore::new());
        let now = OffsetDateTime::now_utc();
        store.insert_unique(event(1, now - time::Duration::seconds(200))).await.unwrap();
        store.insert_unique(event(2, now - time::Duration::seconds(10))).await.unwrap();

        let config = ConfigStore::new(RetentionConfig::default());
        let (_tx, rx) = watch::channel(false);
        let sweeper = RetentionSweeper::new(store.clone(), &config, rx);

        assert_eq!(sweeper.sweep_once(Duration::from_secs(130), now).await.unwrap(), 1);
        assert_eq!(store.find_max_id().await.unwrap(), Some(2));
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn run_sweeps_and_stops_on_shutdown() {
        let store = Arc::new(MemoryEventStore::new());
        let stale = OffsetDateTime::now_utc() - time::Duration::hours(1);
        store.insert_unique(event(1, stale)).await.unwrap();

        let config = ConfigStore::new(RetentionConfig {
            ttl: Duration::from_secs(60),
            sweep_interval: Duration::from_secs(5),
        });
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(RetentionSweeper::new(store.clone(), &config, rx).run());

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(store.count().await.unwrap(), 0);

        tx.send(true).unwrap();
        handle.await.unwrap();
    }
}
