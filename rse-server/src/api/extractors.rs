//! Request extractors shared by the event handlers.

use axum::extract::FromRequestParts;
use axum::http::header::USER_AGENT;
use axum::http::request::Parts;
use rse_core::RseError;
use rse_core::publisher::INVALID_JSON;
use rse_sdk::auth::AUTH_TOKEN_HEADER;

use crate::api::error::ApiError;
use crate::state::AppState;

/// Proof that the request passed the auth gate.
///
/// Reads the `X-Auth-Token` header; a header that is not valid UTF-8 is
/// treated as missing.
pub struct Authorized;

impl FromRequestParts<AppState> for Authorized {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTH_TOKEN_HEADER)
            .and_then(|value| value.to_str().ok());
        state.gate.check(token).await?;
        Ok(Authorized)
    }
}

/// The raw `User-Agent` header, if present and valid UTF-8.
pub struct ClientUserAgent(pub Option<String>);

impl<S: Send + Sync> FromRequestParts<S> for ClientUserAgent {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match parts.headers.get(USER_AGENT) {
            None => Ok(ClientUserAgent(None)),
            Some(value) => value
                .to_str()
                .map(|ua| ClientUserAgent(Some(ua.to_string())))
                .map_err(|_| ApiError(RseError::Validation(INVALID_JSON))),
        }
    }
}
