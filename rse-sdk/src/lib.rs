//! Shared wire types for RSE, a long-poll event notification broker.
//!
//! The server and its clients agree on everything in this crate: the
//! event/poll response shapes, the header names, how a client identifies
//! itself through its `User-Agent`, and how an auth token maps onto a
//! cache key. The HTTP client lives behind the `client` feature.

pub mod auth;
pub mod objects;
pub mod user_agent;

#[cfg(feature = "client")]
pub mod client;
