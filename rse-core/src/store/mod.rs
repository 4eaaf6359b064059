//! Event store capability.
//!
//! The allocator, publisher, poller and retention sweeper only talk to the
//! store through [`EventStore`]. The one thing an adapter must guarantee is
//! that [`EventStore::insert_unique`] rejects an id that already exists
//! with [`StoreError::Duplicate`]; id allocation is correct under any
//! interleaving of concurrent publishers as long as that holds.
//!
//! Adapters:
//! - [`PgEventStore`]: Postgres, with optional read-replica routing.
//! - [`MemoryEventStore`]: process-local, for standalone/test mode.

mod memory;
mod postgres;

pub use memory::MemoryEventStore;
pub use postgres::PgEventStore;
pub(crate) use postgres::is_connectivity_error;

use async_trait::async_trait;
use rse_sdk::objects::SortOrder;
use thiserror::Error;
use time::OffsetDateTime;

use crate::entities::event::{Event, NewEvent};

/// Errors reported by store adapters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// An event with this id already exists.
    #[error("event id {0} already exists")]
    Duplicate(i64),

    /// The store could not be reached; the operation may succeed if retried.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Any other failure.
    #[error("store error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

/// Which channels a single store query selects.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ChannelSelector {
    /// Exactly this channel.
    Exact(String),
    /// This channel and every channel beneath it (`path/...`).
    Subtree(String),
}

impl ChannelSelector {
    pub fn path(&self) -> &str {
        match self {
            ChannelSelector::Exact(path) | ChannelSelector::Subtree(path) => path,
        }
    }

    /// Whether an event published to `channel` is selected.
    pub fn matches(&self, channel: &str) -> bool {
        match self {
            ChannelSelector::Exact(path) => channel == path,
            ChannelSelector::Subtree(path) => {
                channel == path
                    || channel
                        .strip_prefix(path.as_str())
                        .and_then(|rest| rest.strip_prefix('/'))
                        .is_some_and(|rest| !rest.is_empty())
            }
        }
    }
}

/// One cursor query: `id > after_id AND channel matches AND uuid != exclude`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventQuery {
    pub selector: ChannelSelector,
    pub after_id: i64,
    /// Skip events published by this client; `None` returns them too.
    pub exclude_uuid: Option<String>,
    pub sort: SortOrder,
    pub limit: u32,
}

#[async_trait]
pub trait EventStore: Send + Sync {
    /// Insert `event`, failing with [`StoreError::Duplicate`] if its id is taken.
    async fn insert_unique(&self, event: NewEvent) -> Result<(), StoreError>;

    /// Highest stored event id, read from the authoritative copy.
    async fn find_max_id(&self) -> Result<Option<i64>, StoreError>;

    /// Current value of the fallback counter.
    async fn read_counter(&self) -> Result<i64, StoreError>;

    /// Add one to the fallback counter.
    async fn bump_counter(&self) -> Result<(), StoreError>;

    /// Create the fallback counter with `first_event` unless it exists.
    /// Returns whether it was created.
    async fn ensure_counter(&self, first_event: i64) -> Result<bool, StoreError>;

    /// Events selected by `query`, ordered by id in `query.sort` order and
    /// capped at `query.limit`.
    async fn range_query(&self, query: &EventQuery) -> Result<Vec<Event>, StoreError>;

    /// Number of stored events.
    async fn count(&self) -> Result<i64, StoreError>;

    /// Delete every event created before `cutoff`. Returns how many.
    async fn purge_before(&self, cutoff: OffsetDateTime) -> Result<u64, StoreError>;

    /// The first stored event in `sort` order: the oldest for ascending,
    /// the newest for descending.
    async fn edge_event(&self, sort: SortOrder) -> Result<Option<Event>, StoreError>;

    /// Every stored event, ordered by id.
    async fn dump(&self, sort: SortOrder) -> Result<Vec<Event>, StoreError>;
}
