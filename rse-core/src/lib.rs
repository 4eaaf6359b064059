#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![forbid(unsafe_code)]

pub mod allocator;
pub mod auth;
pub mod channel;
pub mod config;
pub mod entities;
pub mod error;
pub mod framework;
pub mod poller;
pub mod processors;
pub mod publisher;
pub mod retry;
pub mod stats;
pub mod store;
pub mod utils;

pub use error::RseError;
