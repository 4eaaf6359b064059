//! Health endpoints.
//!
//! # Endpoints
//!
//! - `GET /health`              – `OK` if the store and the auth cache respond
//! - `HEAD /health`             – same, without a body
//! - `GET /health?verbose=true` – JSON report with counters and warnings
//! - `GET /health?verbose=true&fields=events,event_range` – only the named
//!   top-level sections of the report

use std::time::{Duration, Instant};

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Json, Router, routing::get};
use rse_core::RseError;
use rse_core::poller::EventRange;
use rse_core::stats::RatioSnapshot;
use rse_core::store::StoreError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::state::AppState;

const HEALTH_TTL: Duration = Duration::from_secs(60);
const SLOW_STORE: Duration = Duration::from_secs(1);

/// Build the health router.
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health))
}

#[derive(Debug, Default, Deserialize)]
pub struct HealthQuery {
    #[serde(default)]
    verbose: Option<String>,
    /// Comma-separated top-level report sections to keep.
    #[serde(default)]
    fields: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub test_mode: bool,
    pub events: i64,
    pub event_range: EventRange,
    pub stats: StatsReport,
    pub warnings: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct StatsReport {
    pub id_generator: IdGeneratorStats,
    pub auth_cache: AuthCacheStats,
}

#[derive(Debug, Serialize)]
pub struct IdGeneratorStats {
    pub attempts: u32,
    pub retries: u32,
    pub retry_rate: f64,
}

#[derive(Debug, Serialize)]
pub struct AuthCacheStats {
    pub lookups: u32,
    pub hits: u32,
    pub hit_rate: f64,
}

impl From<RatioSnapshot> for IdGeneratorStats {
    fn from(s: RatioSnapshot) -> Self {
        Self {
            attempts: s.total,
            retries: s.subset,
            retry_rate: s.ratio(),
        }
    }
}

impl From<RatioSnapshot> for AuthCacheStats {
    fn from(s: RatioSnapshot) -> Self {
        Self {
            lookups: s.total,
            hits: s.subset,
            hit_rate: s.ratio(),
        }
    }
}

/// `GET|HEAD /health`.
async fn health(
    State(state): State<AppState>,
    Query(query): Query<HealthQuery>,
) -> Result<Response, ApiError> {
    if matches!(query.verbose.as_deref(), Some("true" | "1")) {
        let report = serde_json::to_value(full_report(&state).await?)
            .map_err(|e| RseError::Internal(format!("serializing health report: {e}")))?;
        let report = match query.fields.as_deref() {
            Some(fields) => select_fields(report, fields),
            None => report,
        };
        return Ok(Json(report).into_response());
    }

    match basic_check(&state).await {
        Ok(()) => Ok((StatusCode::OK, "OK\n").into_response()),
        Err(e) => {
            tracing::warn!(error = %e, "Health check failed");
            Ok(StatusCode::SERVICE_UNAVAILABLE.into_response())
        }
    }
}

async fn count_events(state: &AppState) -> Result<i64, RseError> {
    Ok(state
        .connectivity
        .run(StoreError::is_unavailable, |_| state.store.count())
        .await?)
}

/// Exercise the store and a cache round trip.
///
/// The cache key is random so the check never plants a usable token.
async fn basic_check(state: &AppState) -> Result<(), RseError> {
    count_events(state).await?;
    let key = Uuid::new_v4().to_string();
    state
        .cache
        .set(&key, HEALTH_TTL)
        .await
        .map_err(|e| RseError::Unavailable(e.to_string()))?;
    state
        .cache
        .get(&key)
        .await
        .map_err(|e| RseError::Unavailable(e.to_string()))?;
    Ok(())
}

async fn full_report(state: &AppState) -> Result<HealthReport, RseError> {
    let started = Instant::now();
    let events = count_events(state).await?;
    let elapsed = started.elapsed();

    let mut warnings = Vec::new();
    if elapsed > SLOW_STORE {
        warnings.push(format!(
            "WARNING: DB is slow ({} seconds)",
            elapsed.as_secs()
        ));
    }

    Ok(HealthReport {
        test_mode: state.test_mode,
        events,
        event_range: state.poller.event_range().await?,
        stats: StatsReport {
            id_generator: state.stats.id_allocation.snapshot().into(),
            auth_cache: state.stats.auth_cache.snapshot().into(),
        },
        warnings,
    })
}

/// Keep only the named top-level sections; unknown names are ignored.
fn select_fields(report: Value, fields: &str) -> Value {
    let Value::Object(map) = report else {
        return report;
    };
    let wanted: Vec<&str> = fields
        .split(',')
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .collect();
    Value::Object(
        map.into_iter()
            .filter(|(key, _)| wanted.contains(&key.as_str()))
            .collect(),
    )
}
