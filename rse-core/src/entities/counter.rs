//! Fallback id counter.
//!
//! A single row read only when the events table is empty. It is bumped
//! after every insert but never trusted while events exist, because
//! concurrent publishers can consume each other's increments.

use crate::framework::DatabaseProcessor;
use kanau::processor::Processor;

/// Key of the singleton counter row.
pub const FALLBACK_COUNTER_ID: &str = "last_known_id";

#[derive(Debug, Clone, Copy)]
pub struct GetFallbackCounter;

impl Processor<GetFallbackCounter> for DatabaseProcessor {
    type Output = Option<i64>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetFallbackCounter")]
    async fn process(&self, _query: GetFallbackCounter) -> Result<Option<i64>, sqlx::Error> {
        sqlx::query_scalar::<_, i64>("SELECT c FROM counters WHERE id = $1")
            .bind(FALLBACK_COUNTER_ID)
            .fetch_optional(&self.pool)
            .await
    }
}

#[derive(Debug, Clone, Copy)]
pub struct IncrementFallbackCounter;

impl Processor<IncrementFallbackCounter> for DatabaseProcessor {
    type Output = ();
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:IncrementFallbackCounter")]
    async fn process(&self, _query: IncrementFallbackCounter) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE counters SET c = c + 1 WHERE id = $1")
            .bind(FALLBACK_COUNTER_ID)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
/// Create the counter row with `first_event` if it does not exist yet.
pub struct InitFallbackCounter {
    pub first_event: i64,
}

impl Processor<InitFallbackCounter> for DatabaseProcessor {
    /// Whether the row was created.
    type Output = bool;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:InitFallbackCounter")]
    async fn process(&self, init: InitFallbackCounter) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO counters (id, c) VALUES ($1, $2)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(FALLBACK_COUNTER_ID)
        .bind(init.first_event)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}
