use sqlx::PgPool;

/// Runs queries against the primary pool. Writes, and reads that must see
/// the latest writes (id allocation), go through this processor.
#[derive(Debug, Clone)]
pub struct DatabaseProcessor {
    pub pool: PgPool,
}

/// Runs read-only queries that tolerate replication lag, so it may point at
/// a replica pool.
#[derive(Debug, Clone)]
pub struct ReadProcessor {
    pub pool: PgPool,
}

impl DatabaseProcessor {
    /// A read processor on the same pool, for deployments without a replica.
    pub fn reader(&self) -> ReadProcessor {
        ReadProcessor {
            pool: self.pool.clone(),
        }
    }
}
