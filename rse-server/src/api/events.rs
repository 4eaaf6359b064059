//! Event API handlers.
//!
//! # Endpoints
//!
//! - `POST /{channel}` – publish the request body to a channel
//! - `GET  /{channel}` – poll a channel, or publish with `method=POST`
//! - `GET  /all`       – dump every event (test mode only)

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Response};
use axum::{Router, routing::get};
use rse_core::RseError;
use rse_core::poller::PollRequest;
use rse_core::publisher::{INVALID_JSON, PublishRequest};
use rse_core::utils::jsonp;
use rse_sdk::objects::{MatchMode, PollResponse, SortOrder};
use serde::{Deserialize, Serialize};

use crate::api::error::ApiError;
use crate::api::extractors::{Authorized, ClientUserAgent};
use crate::state::AppState;

const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";
const JAVASCRIPT_CONTENT_TYPE: &str = "text/javascript";

/// Build the event API router.
pub fn router() -> Router<AppState> {
    Router::new().route("/{*channel}", get(get_channel).post(post_channel))
}

/// Query parameters understood on a channel URL.
///
/// Numeric values are kept as strings so that a malformed number is a
/// `400` with a specific message.
#[derive(Debug, Default, Deserialize)]
pub struct ChannelQuery {
    #[serde(rename = "last-known-id")]
    last_known_id: Option<String>,
    #[serde(rename = "max-events")]
    max_events: Option<String>,
    sort: Option<String>,
    events: Option<String>,
    echo: Option<String>,
    callback: Option<String>,
    method: Option<String>,
    #[serde(rename = "post-data")]
    post_data: Option<String>,
}

impl ChannelQuery {
    /// The JSONP callback, validated. An empty value means none.
    fn callback(&self) -> Result<Option<&str>, RseError> {
        self.callback
            .as_deref()
            .filter(|name| !name.is_empty())
            .map(jsonp::validate_callback)
            .transpose()
    }

    fn sort(&self) -> Result<SortOrder, RseError> {
        Ok(SortOrder::from_param(parse_or(
            self.sort.as_deref(),
            1,
            "Invalid sort",
        )?))
    }
}

fn parse_or(value: Option<&str>, default: i64, message: &'static str) -> Result<i64, RseError> {
    match value {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| RseError::Validation(message)),
    }
}

fn channel_path(channel: &str) -> String {
    format!("/{channel}")
}

/// `GET /{channel}` – poll for events newer than `last-known-id`.
async fn get_channel(
    State(state): State<AppState>,
    _auth: Authorized,
    ClientUserAgent(user_agent): ClientUserAgent,
    Path(channel): Path<String>,
    Query(query): Query<ChannelQuery>,
) -> Result<Response, ApiError> {
    let channel = channel_path(&channel);

    if state.test_mode && channel == "/all" {
        return debug_dump(&state, &query).await;
    }

    // Case-sensitive, for clients that cannot send a POST.
    if query.method.as_deref() == Some("POST") {
        let data = query
            .post_data
            .as_deref()
            .ok_or(RseError::Validation("Missing post-data parameter"))?;
        return publish(&state, &channel, data, user_agent.as_deref(), &query).await;
    }

    let callback = query.callback()?;
    let last_known_id = parse_or(query.last_known_id.as_deref(), 0, "Invalid last-known-id")?;
    let max_events = query
        .max_events
        .as_deref()
        .map(|raw| parse_or(Some(raw), 0, "Invalid max-events"))
        .transpose()?
        .map(|n| u32::try_from(n.max(0)).unwrap_or(u32::MAX));

    let events = state
        .poller
        .poll(PollRequest {
            channel: &channel,
            mode: MatchMode::from_param(query.events.as_deref()),
            last_known_id,
            max_events,
            sort: query.sort()?,
            echo: query.echo.as_deref() == Some("true"),
            user_agent: user_agent.as_deref(),
        })
        .await?;

    let response = PollResponse { channel, events };
    match callback {
        Some(callback) => Ok(javascript(jsonp::wrap(callback, &to_json(&response)?))),
        None if response.events.is_empty() => Ok(StatusCode::NO_CONTENT.into_response()),
        None => Ok(json(to_json(&response)?)),
    }
}

/// `POST /{channel}` – publish the request body.
async fn post_channel(
    State(state): State<AppState>,
    _auth: Authorized,
    ClientUserAgent(user_agent): ClientUserAgent,
    Path(channel): Path<String>,
    Query(query): Query<ChannelQuery>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let data = std::str::from_utf8(&body).map_err(|_| RseError::Validation(INVALID_JSON))?;
    publish(
        &state,
        &channel_path(&channel),
        data,
        user_agent.as_deref(),
        &query,
    )
    .await
}

async fn publish(
    state: &AppState,
    channel: &str,
    data: &str,
    user_agent: Option<&str>,
    query: &ChannelQuery,
) -> Result<Response, ApiError> {
    let callback = query.callback()?;

    let id = state
        .publisher
        .publish(PublishRequest {
            channel,
            data,
            user_agent,
        })
        .await?;
    tracing::debug!(id, channel, "event created");

    match callback {
        Some(callback) => Ok(javascript(jsonp::wrap(callback, "{}"))),
        None => Ok(StatusCode::CREATED.into_response()),
    }
}

/// `GET /all` in test mode – every stored event as a JSON array.
async fn debug_dump(state: &AppState, query: &ChannelQuery) -> Result<Response, ApiError> {
    tracing::warn!("TEST MODE: dumping all events");
    let events = state.poller.dump(query.sort()?).await?;
    Ok(json(to_json(&events)?))
}

fn to_json<T: Serialize>(value: &T) -> Result<String, RseError> {
    serde_json::to_string(value)
        .map_err(|e| RseError::Internal(format!("serializing response: {e}")))
}

fn json(body: String) -> Response {
    ([(CONTENT_TYPE, JSON_CONTENT_TYPE)], body).into_response()
}

fn javascript(body: String) -> Response {
    ([(CONTENT_TYPE, JAVASCRIPT_CONTENT_TYPE)], body).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(query_string: &str) -> ChannelQuery {
        let uri: axum::http::Uri = format!("/c?{query_string}").parse().unwrap();
        Query::<ChannelQuery>::try_from_uri(&uri).unwrap().0
    }

    #[test]
    fn sort_defaults_to_ascending() {
        assert_eq!(query("").sort().unwrap(), SortOrder::Ascending);
        assert_eq!(query("sort=-1").sort().unwrap(), SortOrder::Descending);
        assert_eq!(query("sort=7").sort().unwrap(), SortOrder::Ascending);
        assert!(query("sort=down").sort().is_err());
    }

    #[test]
    fn empty_callback_is_ignored() {
        assert_eq!(query("callback=").callback().unwrap(), None);
        assert_eq!(query("callback=cb").callback().unwrap(), Some("cb"));
        assert!(query("callback=a.b").callback().is_err());
    }
}
