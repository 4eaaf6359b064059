//! Event id allocation.
//!
//! Ids are assigned optimistically: read the current maximum from the
//! primary, try to insert at `max + 1`, and start over if another
//! publisher got there first. The store's uniqueness guarantee is the only
//! coordination between publishers, so the protocol holds across any
//! number of processes.

use std::sync::Arc;

use thiserror::Error;
use time::OffsetDateTime;

use crate::entities::event::NewEvent;
use crate::retry::{RetryError, RetryPolicy};
use crate::stats::SharedCounters;
use crate::store::{EventStore, StoreError};

/// An event waiting for its id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingEvent {
    pub channel: String,
    pub data: String,
    pub user_agent: String,
    pub uuid: String,
}

#[derive(Debug, Error)]
pub enum AllocationError {
    #[error("id allocation exhausted after {attempts} attempts")]
    Exhausted { attempts: u32 },
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl AllocationError {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, AllocationError::Store(err) if err.is_unavailable())
    }
}

pub struct IdAllocator {
    store: Arc<dyn EventStore>,
    stats: Arc<SharedCounters>,
    contention: RetryPolicy,
}

impl IdAllocator {
    pub fn new(store: Arc<dyn EventStore>, stats: Arc<SharedCounters>, contention: RetryPolicy) -> Self {
        Self {
            store,
            stats,
            contention,
        }
    }

    /// Insert `pending` under a fresh id and return that id.
    ///
    /// Collisions are retried under the contention policy. Any other store
    /// error ends the round immediately, so a connectivity failure can be
    /// retried by the caller without being counted as contention.
    pub async fn allocate(&self, pending: &PendingEvent) -> Result<i64, AllocationError> {
        let outcome = self
            .contention
            .run(
                |err: &StoreError| matches!(err, StoreError::Duplicate(_)),
                |_| self.try_insert(pending),
            )
            .await;

        let id = match outcome {
            Ok(id) => id,
            Err(RetryError::Exhausted { attempts, last }) => {
                tracing::error!(attempts, error = %last, "could not allocate an event id");
                return Err(AllocationError::Exhausted { attempts });
            }
            Err(RetryError::Aborted(err)) => return Err(err.into()),
        };

        if let Err(err) = self.store.bump_counter().await {
            tracing::warn!(id, error = %err, "failed to bump the fallback counter");
        }
        Ok(id)
    }

    async fn try_insert(&self, pending: &PendingEvent) -> Result<i64, StoreError> {
        self.stats.record_id_attempt();

        let last = match self.store.find_max_id().await? {
            Some(max) => max,
            None => self.store.read_counter().await?,
        };
        let id = last
            .checked_add(1)
            .ok_or_else(|| StoreError::Backend("event id space exhausted".to_string()))?;

        let event = NewEvent {
            id,
            channel: pending.channel.clone(),
            data: pending.data.clone(),
            user_agent: pending.user_agent.clone(),
            uuid: pending.uuid.clone(),
            created_at: OffsetDateTime::now_utc(),
        };
        match self.store.insert_unique(event).await {
            Ok(()) => Ok(id),
            Err(err @ StoreError::Duplicate(_)) => {
                tracing::debug!(id, "event id taken by a concurrent publisher");
                self.stats.record_id_retry();
                Err(err)
            }
            Err(err) => Err(err),
        }
    }
}
