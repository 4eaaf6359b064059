//! Poll parameters.

use serde::{Deserialize, Serialize};

/// How a polled channel path selects stored events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    /// Only events published to exactly this channel.
    #[default]
    Exact,
    /// Events published to this channel or any of its ancestors.
    Parent,
    /// Events published to this channel or anywhere beneath it.
    All,
}

impl MatchMode {
    /// Interpret the `events` query parameter. Unknown values mean `exact`.
    pub fn from_param(value: Option<&str>) -> Self {
        match value {
            Some("parent") => MatchMode::Parent,
            Some("all") => MatchMode::All,
            _ => MatchMode::Exact,
        }
    }

    pub fn as_param(self) -> &'static str {
        match self {
            MatchMode::Exact => "exact",
            MatchMode::Parent => "parent",
            MatchMode::All => "all",
        }
    }
}

/// Ordering of events by id.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

impl SortOrder {
    /// Interpret the `sort` query parameter (`1` or `-1`). Anything other
    /// than `-1` is ascending.
    pub fn from_param(value: i64) -> Self {
        if value == -1 {
            SortOrder::Descending
        } else {
            SortOrder::Ascending
        }
    }

    pub fn as_param(self) -> i8 {
        match self {
            SortOrder::Ascending => 1,
            SortOrder::Descending => -1,
        }
    }
}

/// Client-side description of a poll request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollOptions {
    /// Exclusive lower bound on returned ids.
    pub last_known_id: i64,
    /// Page size; the server clamps it to its ceiling.
    pub max_events: Option<u32>,
    pub sort: SortOrder,
    pub mode: MatchMode,
    /// Also return events this client published itself.
    pub echo: bool,
}

impl PollOptions {
    pub fn after(last_known_id: i64) -> Self {
        Self {
            last_known_id,
            ..Self::default()
        }
    }

    /// Render the options as query pairs in the server's parameter names.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("last-known-id", self.last_known_id.to_string()),
            ("sort", self.sort.as_param().to_string()),
            ("events", self.mode.as_param().to_string()),
        ];
        if let Some(max) = self.max_events {
            pairs.push(("max-events", max.to_string()));
        }
        if self.echo {
            pairs.push(("echo", "true".to_string()));
        }
        pairs
    }
}
