pub mod auth_token;
pub mod counter;
pub mod event;
