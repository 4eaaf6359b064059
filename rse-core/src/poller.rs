//! Cursor reads.
//!
//! A poll returns events with ids above the client's last known id on the
//! requested channels, minus the ones the client published itself. Nothing
//! waits server-side: an empty result is returned immediately and the
//! client polls again.

use std::sync::Arc;

use rse_sdk::objects::{EventView, MatchMode, SortOrder};
use serde::Serialize;
use serde_json::value::RawValue;
use time::OffsetDateTime;
use time::macros::format_description;

use crate::RseError;
use crate::channel::{self, QueryPlan};
use crate::config::{ConfigStore, PollLimits};
use crate::entities::event::Event;
use crate::retry::RetryPolicy;
use crate::store::{EventQuery, EventStore, StoreError};
use crate::utils::identity::resolve_client_uuid;

#[derive(Debug, Clone, Copy)]
pub struct PollRequest<'a> {
    pub channel: &'a str,
    pub mode: MatchMode,
    /// Exclusive lower bound on returned ids.
    pub last_known_id: i64,
    /// Requested page size, clamped to [`PollLimits`].
    pub max_events: Option<u32>,
    pub sort: SortOrder,
    /// Include the caller's own events. No client uuid is required.
    pub echo: bool,
    pub user_agent: Option<&'a str>,
}

/// The oldest and newest stored events.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventRange {
    pub first: Option<EventSummary>,
    pub last: Option<EventSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventSummary {
    pub id: i64,
    pub channel: String,
    /// The payload's `Event` member, when it is an object that has one.
    pub name: Option<serde_json::Value>,
    pub created_at: String,
    pub age: i64,
}

pub struct EventPoller {
    store: Arc<dyn EventStore>,
    limits: ConfigStore<PollLimits>,
    connectivity: RetryPolicy,
    test_mode: bool,
}

impl EventPoller {
    pub fn new(
        store: Arc<dyn EventStore>,
        limits: ConfigStore<PollLimits>,
        connectivity: RetryPolicy,
        test_mode: bool,
    ) -> Self {
        Self {
            store,
            limits,
            connectivity,
            test_mode,
        }
    }

    pub async fn poll(&self, request: PollRequest<'_>) -> Result<Vec<EventView>, RseError> {
        channel::validate_channel(request.channel)?;
        let exclude_uuid = if request.echo {
            None
        } else {
            Some(resolve_client_uuid(
                request.user_agent.unwrap_or_default(),
                self.test_mode,
            )?)
        };
        let limit = self.limits.get().clamp(request.max_events);

        let QueryPlan {
            selectors,
            needs_merge,
        } = channel::plan(request.channel, request.mode);

        let mut pages = Vec::with_capacity(selectors.len());
        for selector in selectors {
            let query = EventQuery {
                selector,
                after_id: request.last_known_id,
                exclude_uuid: exclude_uuid.clone(),
                sort: request.sort,
                limit,
            };
            pages.push(self.query_with_retry(&query).await?);
        }

        let events = if needs_merge {
            channel::merge_pages(pages, request.sort, limit as usize)
        } else {
            pages.into_iter().flatten().collect()
        };
        tracing::debug!(
            channel = request.channel,
            mode = request.mode.as_param(),
            after = request.last_known_id,
            found = events.len(),
            "poll served"
        );
        render(events, OffsetDateTime::now_utc())
    }

    /// Every stored event, for the test-mode `/all` dump.
    pub async fn dump(&self, sort: SortOrder) -> Result<Vec<EventView>, RseError> {
        let events = self
            .connectivity
            .run(StoreError::is_unavailable, |_| self.store.dump(sort))
            .await?;
        render(events, OffsetDateTime::now_utc())
    }

    pub async fn event_range(&self) -> Result<EventRange, RseError> {
        let now = OffsetDateTime::now_utc();
        let first = self.edge_event(SortOrder::Ascending).await?;
        let last = self.edge_event(SortOrder::Descending).await?;
        Ok(EventRange {
            first: first.map(|event| summarize(event, now)).transpose()?,
            last: last.map(|event| summarize(event, now)).transpose()?,
        })
    }

    async fn edge_event(&self, sort: SortOrder) -> Result<Option<Event>, RseError> {
        Ok(self
            .connectivity
            .run(StoreError::is_unavailable, |_| self.store.edge_event(sort))
            .await?)
    }

    async fn query_with_retry(&self, query: &EventQuery) -> Result<Vec<Event>, RseError> {
        Ok(self
            .connectivity
            .run(StoreError::is_unavailable, |_| self.store.range_query(query))
            .await?)
    }
}

fn render(events: Vec<Event>, now: OffsetDateTime) -> Result<Vec<EventView>, RseError> {
    events.into_iter().map(|event| view(event, now)).collect()
}

fn format_created_at(event: &Event) -> Result<String, RseError> {
    event
        .created_at
        .to_offset(time::UtcOffset::UTC)
        .format(format_description!(
            "[year]-[month]-[day] [hour]:[minute]:[second]Z"
        ))
        .map_err(|err| RseError::Internal(format!("formatting event {}: {err}", event.id)))
}

/// Whole seconds since `created_at`; zero under clock skew.
fn age(event: &Event, now: OffsetDateTime) -> i64 {
    (now - event.created_at).whole_seconds().max(0)
}

fn summarize(event: Event, now: OffsetDateTime) -> Result<EventSummary, RseError> {
    let name = serde_json::from_str::<serde_json::Value>(&event.data)
        .ok()
        .and_then(|data| data.get("Event").cloned());
    Ok(EventSummary {
        created_at: format_created_at(&event)?,
        age: age(&event, now),
        id: event.id,
        channel: event.channel,
        name,
    })
}

fn view(event: Event, now: OffsetDateTime) -> Result<EventView, RseError> {
    let created_at = format_created_at(&event)?;
    let age = age(&event, now);
    let data = RawValue::from_string(event.data)
        .map_err(|err| RseError::Internal(format!("event {} holds invalid JSON: {err}", event.id)))?;

    Ok(EventView {
        id: event.id,
        user_agent: event.user_agent,
        created_at,
        age,
        data,
    })
}
