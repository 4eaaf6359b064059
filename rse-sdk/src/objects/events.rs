//! Poll response types.

use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

/// A single event as returned to a polling client.
///
/// `data` is the payload exactly as it was published.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventView {
    pub id: i64,
    pub user_agent: String,
    /// UTC timestamp formatted as `YYYY-MM-DD HH:MM:SSZ`.
    pub created_at: String,
    /// Seconds elapsed since the event was created.
    pub age: i64,
    pub data: Box<RawValue>,
}

/// Body of a successful poll: `{"channel": ..., "events": [...]}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollResponse {
    pub channel: String,
    pub events: Vec<EventView>,
}

impl PollResponse {
    /// Highest event id in the response, to be used as the next cursor.
    pub fn last_id(&self) -> Option<i64> {
        self.events.iter().map(|e| e.id).max()
    }
}
