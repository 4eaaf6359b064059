//! Events API client (publisher/poller → RSE server).
//!
//! Every request carries the `X-Auth-Token` header and a User-Agent that
//! embeds the client uuid, so the server can skip a client's own events
//! when it polls.

use reqwest::{Client, StatusCode, header::USER_AGENT};
use serde::Serialize;
use url::Url;
use uuid::Uuid;

use super::ClientError;
use crate::auth::AUTH_TOKEN_HEADER;
use crate::objects::{PollOptions, PollResponse};
use crate::user_agent::user_agent_for;

/// Typed HTTP client for publishing to and polling RSE channels.
#[derive(Debug, Clone)]
pub struct EventsClient {
    http: Client,
    base_url: Url,
    auth_token: String,
    user_agent: String,
}

impl EventsClient {
    /// Create a new `EventsClient`.
    ///
    /// * `base_url` – root URL of the RSE server; any path prefix is kept.
    /// * `auth_token` – value sent as `X-Auth-Token`.
    /// * `client_uuid` – identity of this client; events published with it
    ///   are not returned to it unless `echo` is requested.
    pub fn new(mut base_url: Url, auth_token: impl Into<String>, client_uuid: Uuid) -> Self {
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Self {
            http: Client::new(),
            base_url,
            auth_token: auth_token.into(),
            user_agent: user_agent_for(concat!("rse-sdk/", env!("CARGO_PKG_VERSION")), client_uuid),
        }
    }

    /// Replace the default `reqwest::Client` with a custom one.
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http = client;
        self
    }

    fn channel_url(&self, channel: &str) -> Result<Url, ClientError> {
        // Relative, so the base path survives; `./` keeps `a:b` from parsing as a scheme.
        let path = format!("./{}", channel.trim_start_matches('/'));
        Ok(self.base_url.join(&path)?)
    }

    /// `POST /{channel}` – publish a JSON payload.
    pub async fn publish<T: Serialize>(&self, channel: &str, payload: &T) -> Result<(), ClientError> {
        let body = serde_json::to_string(payload)?;
        self.publish_raw(channel, body).await
    }

    /// `POST /{channel}` – publish an already-encoded JSON payload.
    pub async fn publish_raw(&self, channel: &str, json: String) -> Result<(), ClientError> {
        let resp = self
            .http
            .post(self.channel_url(channel)?)
            .header(AUTH_TOKEN_HEADER, &self.auth_token)
            .header(USER_AGENT, &self.user_agent)
            .body(json)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ClientError::Api { status, body });
        }
        Ok(())
    }

    /// `GET /{channel}` – poll for events after `options.last_known_id`.
    ///
    /// Returns `None` when the server has nothing new (`204 No Content`).
    pub async fn poll(
        &self,
        channel: &str,
        options: &PollOptions,
    ) -> Result<Option<PollResponse>, ClientError> {
        let resp = self
            .http
            .get(self.channel_url(channel)?)
            .query(&options.query_pairs())
            .header(AUTH_TOKEN_HEADER, &self.auth_token)
            .header(USER_AGENT, &self.user_agent)
            .send()
            .await?;

        let status = resp.status();
        if status == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ClientError::Api { status, body });
        }
        let bytes = resp.bytes().await?;
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(ClientError::Json)
    }
}
