//! Postgres [`EventStore`].
//!
//! Id allocation reads (`MAX(id)`, the fallback counter) and every write go
//! to the primary. Cursor queries and dumps may be served by a replica; a
//! lagging replica only delays delivery, the cursor still advances
//! monotonically.

use async_trait::async_trait;
use kanau::processor::Processor;
use rse_sdk::objects::SortOrder;
use sqlx::PgPool;
use time::OffsetDateTime;

use super::{EventQuery, EventStore, StoreError};
use crate::entities::counter::{GetFallbackCounter, IncrementFallbackCounter, InitFallbackCounter};
use crate::entities::event::{
    CountEvents, DumpEvents, Event, GetEdgeEvent, GetEventPage, GetMaxEventId, InsertEvent, NewEvent,
    PurgeEventsBefore,
};
use crate::framework::{DatabaseProcessor, ReadProcessor};

#[derive(Debug, Clone)]
pub struct PgEventStore {
    primary: DatabaseProcessor,
    replica: ReadProcessor,
}

impl PgEventStore {
    /// Reads go to `replica_pool` when given, otherwise to the primary.
    pub fn new(primary_pool: PgPool, replica_pool: Option<PgPool>) -> Self {
        let primary = DatabaseProcessor { pool: primary_pool };
        let replica = match replica_pool {
            Some(pool) => ReadProcessor { pool },
            None => primary.reader(),
        };
        Self { primary, replica }
    }

    pub fn primary(&self) -> &DatabaseProcessor {
        &self.primary
    }
}

/// Whether `err` means the database could not be reached, as opposed to
/// rejecting the statement.
pub(crate) fn is_connectivity_error(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => true,
        // connection_exception and operator_intervention (admin shutdown,
        // cannot_connect_now)
        sqlx::Error::Database(db) => db
            .code()
            .is_some_and(|code| code.starts_with("08") || code.starts_with("57P")),
        _ => false,
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if is_connectivity_error(&err) {
            StoreError::Unavailable(err.to_string())
        } else {
            StoreError::Backend(err.to_string())
        }
    }
}

#[async_trait]
impl EventStore for PgEventStore {
    async fn insert_unique(&self, event: NewEvent) -> Result<(), StoreError> {
        let id = event.id;
        match self.primary.process(InsertEvent(event)).await {
            Ok(()) => Ok(()),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(StoreError::Duplicate(id))
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn find_max_id(&self) -> Result<Option<i64>, StoreError> {
        Ok(self.primary.process(GetMaxEventId).await?)
    }

    async fn read_counter(&self) -> Result<i64, StoreError> {
        match self.primary.process(GetFallbackCounter).await? {
            Some(value) => Ok(value),
            None => {
                tracing::warn!("fallback counter row is missing, treating it as 0");
                Ok(0)
            }
        }
    }

    async fn bump_counter(&self) -> Result<(), StoreError> {
        Ok(self.primary.process(IncrementFallbackCounter).await?)
    }

    async fn ensure_counter(&self, first_event: i64) -> Result<bool, StoreError> {
        Ok(self
            .primary
            .process(InitFallbackCounter { first_event })
            .await?)
    }

    async fn range_query(&self, query: &EventQuery) -> Result<Vec<Event>, StoreError> {
        Ok(self.replica.process(GetEventPage(query.clone())).await?)
    }

    async fn count(&self) -> Result<i64, StoreError> {
        Ok(self.primary.process(CountEvents).await?)
    }

    async fn purge_before(&self, cutoff: OffsetDateTime) -> Result<u64, StoreError> {
        Ok(self.primary.process(PurgeEventsBefore { cutoff }).await?)
    }

    async fn edge_event(&self, sort: SortOrder) -> Result<Option<Event>, StoreError> {
        Ok(self.replica.process(GetEdgeEvent { sort }).await?)
    }

    async fn dump(&self, sort: SortOrder) -> Result<Vec<Event>, StoreError> {
        Ok(self.replica.process(DumpEvents { sort }).await?)
    }
}
