//! HTTP API.
//!
//! - `health`: `/health`, no authentication
//! - `events`: every other path, behind the `X-Auth-Token` gate

pub mod error;
pub mod events;
pub mod extractors;
pub mod health;
