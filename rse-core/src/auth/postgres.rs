use std::time::Duration;

use async_trait::async_trait;
use kanau::processor::Processor;
use sqlx::PgPool;
use time::OffsetDateTime;

use super::cache::{AuthCache, CacheError};
use crate::entities::auth_token::{FindAuthToken, UpsertAuthToken};
use crate::framework::DatabaseProcessor;
use crate::store::is_connectivity_error;

/// [`AuthCache`] backed by the `auth_token_cache` table.
#[derive(Debug, Clone)]
pub struct PgAuthCache {
    db: DatabaseProcessor,
}

impl PgAuthCache {
    pub fn new(pool: PgPool) -> Self {
        Self {
            db: DatabaseProcessor { pool },
        }
    }
}

impl From<sqlx::Error> for CacheError {
    fn from(err: sqlx::Error) -> Self {
        if is_connectivity_error(&err) {
            CacheError::Unavailable(err.to_string())
        } else {
            CacheError::Backend(err.to_string())
        }
    }
}

#[async_trait]
impl AuthCache for PgAuthCache {
    async fn get(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self
            .db
            .process(FindAuthToken {
                key: key.to_string(),
            })
            .await?)
    }

    async fn set(&self, key: &str, ttl: Duration) -> Result<(), CacheError> {
        let expires_at = time::Duration::try_from(ttl)
            .ok()
            .and_then(|ttl| OffsetDateTime::now_utc().checked_add(ttl))
            .ok_or_else(|| CacheError::Backend(format!("ttl {ttl:?} out of range")))?;
        self.db
            .process(UpsertAuthToken {
                key: key.to_string(),
                expires_at,
            })
            .await?;
        Ok(())
    }
}
