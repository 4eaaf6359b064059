//! Process-local event store.
//!
//! Used in standalone/test mode and by the test suites. Uniqueness is
//! enforced by checking the id under the write lock, the same guarantee a
//! primary key gives the Postgres adapter.

use std::collections::BTreeMap;

use async_trait::async_trait;
use rse_sdk::objects::SortOrder;
use time::OffsetDateTime;
use tokio::sync::RwLock;

use super::{EventQuery, EventStore, StoreError};
use crate::entities::event::{Event, NewEvent};

#[derive(Debug, Default)]
struct MemoryState {
    events: BTreeMap<i64, Event>,
    counter: Option<i64>,
}

/// An [`EventStore`] kept in memory.
#[derive(Debug, Default)]
pub struct MemoryEventStore {
    state: RwLock<MemoryState>,
}

impl MemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn ordered<'a>(
    events: impl DoubleEndedIterator<Item = &'a Event> + 'a,
    sort: SortOrder,
) -> Box<dyn Iterator<Item = &'a Event> + 'a> {
    match sort {
        SortOrder::Ascending => Box::new(events),
        SortOrder::Descending => Box::new(events.rev()),
    }
}

#[async_trait]
impl EventStore for MemoryEventStore {
    async fn insert_unique(&self, event: NewEvent) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        if state.events.contains_key(&event.id) {
            return Err(StoreError::Duplicate(event.id));
        }
        state.events.insert(event.id, event.into());
        Ok(())
    }

    async fn find_max_id(&self) -> Result<Option<i64>, StoreError> {
        let state = self.state.read().await;
        Ok(state.events.last_key_value().map(|(id, _)| *id))
    }

    async fn read_counter(&self) -> Result<i64, StoreError> {
        Ok(self.state.read().await.counter.unwrap_or(0))
    }

    async fn bump_counter(&self) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        if let Some(c) = state.counter.as_mut() {
            *c += 1;
        }
        Ok(())
    }

    async fn ensure_counter(&self, first_event: i64) -> Result<bool, StoreError> {
        let mut state = self.state.write().await;
        if state.counter.is_some() {
            return Ok(false);
        }
        state.counter = Some(first_event);
        Ok(true)
    }

    async fn range_query(&self, query: &EventQuery) -> Result<Vec<Event>, StoreError> {
        let state = self.state.read().await;
        let Some(start) = query.after_id.checked_add(1) else {
            return Ok(Vec::new());
        };
        let selected = state.events.range(start..).map(|(_, event)| event);
        Ok(ordered(selected, query.sort)
            .filter(|event| query.selector.matches(&event.channel))
            .filter(|event| query.exclude_uuid.as_deref() != Some(event.uuid.as_str()))
            .take(query.limit as usize)
            .cloned()
            .collect())
    }

    async fn count(&self) -> Result<i64, StoreError> {
        let state = self.state.read().await;
        Ok(i64::try_from(state.events.len()).unwrap_or(i64::MAX))
    }

    async fn purge_before(&self, cutoff: OffsetDateTime) -> Result<u64, StoreError> {
        let mut state = self.state.write().await;
        let before = state.events.len();
        state.events.retain(|_, event| event.created_at >= cutoff);
        Ok((before - state.events.len()) as u64)
    }

    async fn edge_event(&self, sort: SortOrder) -> Result<Option<Event>, StoreError> {
        let state = self.state.read().await;
        Ok(ordered(state.events.values(), sort).next().cloned())
    }

    async fn dump(&self, sort: SortOrder) -> Result<Vec<Event>, StoreError> {
        let state = self.state.read().await;
        Ok(ordered(state.events.values(), sort).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ChannelSelector;

    fn event(id: i64, channel: &str, uuid: &str) -> NewEvent {
        NewEvent {
            id,
            channel: channel.to_string(),
            data: "{}".to_string(),
            user_agent: format!("test uuid/{uuid}"),
            uuid: uuid.to_string(),
            created_at: OffsetDateTime::now_utc(),
        }
    }

    fn query(selector: ChannelSelector, after_id: i64) -> EventQuery {
        EventQuery {
            selector,
            after_id,
            exclude_uuid: None,
            sort: SortOrder::Ascending,
            limit: 100,
        }
    }

    #[tokio::test]
    async fn duplicate_ids_are_rejected() {
        let store = MemoryEventStore::new();
        store.insert_unique(event(1, "/a", "u1")).await.unwrap();
        assert_eq!(
            store.insert_unique(event(1, "/b", "u2")).await,
            Err(StoreError::Duplicate(1))
        );
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn range_query_applies_cursor_filter_and_order() {
        let store = MemoryEventStore::new();
        for (id, channel, uuid) in [(1, "/a", "u1"), (2, "/a", "u2"), (3, "/b", "u1"), (4, "/a", "u1")] {
            store.insert_unique(event(id, channel, uuid)).await.unwrap();
        }

        let ids = |events: Vec<Event>| events.into_iter().map(|e| e.id).collect::<Vec<_>>();

        let all = store
            .range_query(&query(ChannelSelector::Exact("/a".into()), 0))
            .await
            .unwrap();
        assert_eq!(ids(all), vec![1, 2, 4]);

        let mut q = query(ChannelSelector::Exact("/a".into()), 1);
        q.exclude_uuid = Some("u2".into());
        q.sort = SortOrder::Descending;
        assert_eq!(ids(store.range_query(&q).await.unwrap()), vec![4]);

        let mut q = query(ChannelSelector::Exact("/a".into()), 0);
        q.limit = 2;
        assert_eq!(ids(store.range_query(&q).await.unwrap()), vec![1, 2]);
    }

    #[tokio::test]
    async fn counter_is_created_once() {
        let store = MemoryEventStore::new();
        assert!(store.ensure_counter(41).await.unwrap());
        assert!(!store.ensure_counter(7).await.unwrap());
        store.bump_counter().await.unwrap();
        assert_eq!(store.read_counter().await.unwrap(), 42);
    }

    #[tokio::test]
    async fn purge_removes_only_older_events() {
        let store = MemoryEventStore::new();
        let now = OffsetDateTime::now_utc();
        let mut old = event(1, "/a", "u1");
        old.created_at = now - time::Duration::minutes(10);
        store.insert_unique(old).await.unwrap();
        store.insert_unique(event(2, "/a", "u1")).await.unwrap();

        let removed = store
            .purge_before(now - time::Duration::minutes(1))
            .await
            .unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.find_max_id().await.unwrap(), Some(2));
        assert_eq!(store.dump(SortOrder::Ascending).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn edge_events_are_the_lowest_and_highest_ids() {
        let store = MemoryEventStore::new();
        assert_eq!(store.edge_event(SortOrder::Ascending).await.unwrap(), None);

        for (id, channel) in [(5, "/first"), (6, "/mid"), (9, "/last")] {
            store.insert_unique(event(id, channel, "u1")).await.unwrap();
        }
        let first = store.edge_event(SortOrder::Ascending).await.unwrap().unwrap();
        let last = store.edge_event(SortOrder::Descending).await.unwrap().unwrap();
        assert_eq!((first.id, first.channel.as_str()), (5, "/first"));
        assert_eq!((last.id, last.channel.as_str()), (9, "/last"));
    }
}
