//! Rows of the `auth_token_cache` table used by the Postgres auth cache.

use crate::framework::DatabaseProcessor;
use kanau::processor::Processor;
use time::OffsetDateTime;

#[derive(Debug, Clone)]
/// Whether an unexpired entry exists for `key`.
pub struct FindAuthToken {
    pub key: String,
}

impl Processor<FindAuthToken> for DatabaseProcessor {
    type Output = bool;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:FindAuthToken")]
    async fn process(&self, query: FindAuthToken) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM auth_token_cache
                WHERE api_key = $1 AND expires_at > now()
            )
            "#,
        )
        .bind(query.key)
        .fetch_one(&self.pool)
        .await
    }
}

#[derive(Debug, Clone)]
/// Insert or refresh an entry for `key`.
pub struct UpsertAuthToken {
    pub key: String,
    pub expires_at: OffsetDateTime,
}

impl Processor<UpsertAuthToken> for DatabaseProcessor {
    type Output = ();
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:UpsertAuthToken")]
    async fn process(&self, upsert: UpsertAuthToken) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO auth_token_cache (api_key, expires_at) VALUES ($1, $2)
            ON CONFLICT (api_key) DO UPDATE SET expires_at = EXCLUDED.expires_at
            "#,
        )
        .bind(upsert.key)
        .bind(upsert.expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
