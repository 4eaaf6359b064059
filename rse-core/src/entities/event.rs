use crate::framework::{DatabaseProcessor, ReadProcessor};
use crate::store::{ChannelSelector, EventQuery};
use kanau::processor::Processor;
use rse_sdk::objects::SortOrder;
use time::OffsetDateTime;

const EVENT_COLUMNS: &str = "id, channel, data, user_agent, uuid, created_at";

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Event {
    pub id: i64,
    pub channel: String,
    /// JSON payload exactly as published.
    pub data: String,
    pub user_agent: String,
    /// Uuid of the publishing client.
    pub uuid: String,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEvent {
    pub id: i64,
    pub channel: String,
    pub data: String,
    pub user_agent: String,
    pub uuid: String,
    pub created_at: OffsetDateTime,
}

impl From<NewEvent> for Event {
    fn from(value: NewEvent) -> Self {
        Event {
            id: value.id,
            channel: value.channel,
            data: value.data,
            user_agent: value.user_agent,
            uuid: value.uuid,
            created_at: value.created_at,
        }
    }
}

fn order_keyword(sort: SortOrder) -> &'static str {
    match sort {
        SortOrder::Ascending => "ASC",
        SortOrder::Descending => "DESC",
    }
}

/// Escape `%`, `_` and `\` so `path` is matched literally by `LIKE`.
fn escape_like(path: &str) -> String {
    let mut escaped = String::with_capacity(path.len());
    for c in path.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[derive(Debug, Clone)]
/// Insert one event; fails with a unique violation if the id is taken.
pub struct InsertEvent(pub NewEvent);

impl Processor<InsertEvent> for DatabaseProcessor {
    type Output = ();
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:InsertEvent")]
    async fn process(&self, insert: InsertEvent) -> Result<(), sqlx::Error> {
        let event = insert.0;
        sqlx::query(
            r#"
            INSERT INTO events (id, channel, data, user_agent, uuid, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(event.id)
        .bind(event.channel)
        .bind(event.data)
        .bind(event.user_agent)
        .bind(event.uuid)
        .bind(event.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
/// Highest event id currently stored.
pub struct GetMaxEventId;

impl Processor<GetMaxEventId> for DatabaseProcessor {
    type Output = Option<i64>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetMaxEventId")]
    async fn process(&self, _query: GetMaxEventId) -> Result<Option<i64>, sqlx::Error> {
        sqlx::query_scalar::<_, Option<i64>>("SELECT MAX(id) FROM events")
            .fetch_one(&self.pool)
            .await
    }
}

#[derive(Debug, Clone)]
/// One page of events after a cursor for a single channel selector.
///
/// `Exact` selectors compile to an equality on `channel` so the
/// `(channel, id, uuid)` index serves them; `Subtree` adds an anchored
/// `LIKE 'path/_%'`.
pub struct GetEventPage(pub EventQuery);

impl Processor<GetEventPage> for ReadProcessor {
    type Output = Vec<Event>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetEventPage")]
    async fn process(&self, query: GetEventPage) -> Result<Vec<Event>, sqlx::Error> {
        let EventQuery {
            selector,
            after_id,
            exclude_uuid,
            sort,
            limit,
        } = query.0;

        let mut builder = sqlx::QueryBuilder::<sqlx::Postgres>::new(format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE id > "
        ));
        builder.push_bind(after_id);

        match selector {
            ChannelSelector::Exact(path) => {
                builder.push(" AND channel = ").push_bind(path);
            }
            ChannelSelector::Subtree(path) => {
                let pattern = format!("{}/_%", escape_like(&path));
                builder
                    .push(" AND (channel = ")
                    .push_bind(path)
                    .push(" OR channel LIKE ")
                    .push_bind(pattern)
                    .push(" ESCAPE '\\')");
            }
        }

        if let Some(uuid) = exclude_uuid {
            builder.push(" AND uuid <> ").push_bind(uuid);
        }

        builder
            .push(" ORDER BY id ")
            .push(order_keyword(sort))
            .push(" LIMIT ")
            .push_bind(i64::from(limit));

        builder.build_query_as::<Event>().fetch_all(&self.pool).await
    }
}

#[derive(Debug, Clone, Copy)]
/// Every stored event, ordered by id.
pub struct DumpEvents {
    pub sort: SortOrder,
}

impl Processor<DumpEvents> for ReadProcessor {
    type Output = Vec<Event>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:DumpEvents")]
    async fn process(&self, query: DumpEvents) -> Result<Vec<Event>, sqlx::Error> {
        let sql = format!(
            "SELECT {EVENT_COLUMNS} FROM events ORDER BY id {}",
            order_keyword(query.sort)
        );
        sqlx::query_as::<_, Event>(&sql).fetch_all(&self.pool).await
    }
}

#[derive(Debug, Clone, Copy)]
/// Lowest id for ascending, highest for descending.
pub struct GetEdgeEvent {
    pub sort: SortOrder,
}

impl Processor<GetEdgeEvent> for ReadProcessor {
    type Output = Option<Event>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetEdgeEvent")]
    async fn process(&self, query: GetEdgeEvent) -> Result<Option<Event>, sqlx::Error> {
        let sql = format!(
            "SELECT {EVENT_COLUMNS} FROM events ORDER BY id {} LIMIT 1",
            order_keyword(query.sort)
        );
        sqlx::query_as::<_, Event>(&sql)
            .fetch_optional(&self.pool)
            .await
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CountEvents;

impl Processor<CountEvents> for DatabaseProcessor {
    type Output = i64;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:CountEvents")]
    async fn process(&self, _query: CountEvents) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM events")
            .fetch_one(&self.pool)
            .await
    }
}

#[derive(Debug, Clone, Copy)]
/// Delete events created before `cutoff`.
pub struct PurgeEventsBefore {
    pub cutoff: OffsetDateTime,
}

impl Processor<PurgeEventsBefore> for DatabaseProcessor {
    type Output = u64;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:PurgeEventsBefore")]
    async fn process(&self, query: PurgeEventsBefore) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM events WHERE created_at < $1")
            .bind(query.cutoff)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
