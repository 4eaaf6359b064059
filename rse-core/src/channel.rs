//! Channel matching.
//!
//! Turns a requested channel and [`MatchMode`] into the store queries that
//! answer it, and merges per-query results back into one page.

use itertools::Itertools;
use rse_sdk::objects::{MatchMode, SortOrder};

use crate::RseError;
use crate::entities::event::Event;
use crate::store::ChannelSelector;

pub const INVALID_CHANNEL: &str = "Invalid channel";

/// Reject channel names the store cannot hold (NUL bytes).
pub fn validate_channel(channel: &str) -> Result<(), RseError> {
    if channel.contains('\0') {
        return Err(RseError::Validation(INVALID_CHANNEL));
    }
    Ok(())
}

/// The store queries for one poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryPlan {
    pub selectors: Vec<ChannelSelector>,
    /// Results of several selectors have to be merged by id.
    pub needs_merge: bool,
}

/// `channel` followed by each of its ancestors, nearest first.
///
/// The last character is never treated as a separator, and the walk stops
/// before the root, so `/a/b/c` yields `/a/b/c`, `/a/b`, `/a`.
pub fn explode_channel(channel: &str) -> Vec<&str> {
    let mut channels = vec![channel];
    let mut end = channel.char_indices().next_back().map_or(0, |(i, _)| i);
    while let Some(index) = channel[..end].rfind('/') {
        if index < 1 {
            break;
        }
        channels.push(&channel[..index]);
        end = index;
    }
    channels
}

pub fn plan(channel: &str, mode: MatchMode) -> QueryPlan {
    match mode {
        MatchMode::Exact => QueryPlan {
            selectors: vec![ChannelSelector::Exact(channel.to_string())],
            needs_merge: false,
        },
        MatchMode::All => QueryPlan {
            selectors: vec![ChannelSelector::Subtree(channel.to_string())],
            needs_merge: false,
        },
        MatchMode::Parent => {
            let selectors: Vec<_> = explode_channel(channel)
                .into_iter()
                .map(|path| ChannelSelector::Exact(path.to_string()))
                .collect();
            let needs_merge = selectors.len() > 1;
            QueryPlan {
                selectors,
                needs_merge,
            }
        }
    }
}

/// K-way merge of per-selector pages, each already sorted in `sort` order,
/// truncated to `limit`.
///
/// Selectors of one plan never overlap, so no event appears twice.
pub fn merge_pages(pages: Vec<Vec<Event>>, sort: SortOrder, limit: usize) -> Vec<Event> {
    if pages.len() == 1 {
        let mut page = pages.into_iter().flatten().collect::<Vec<_>>();
        page.truncate(limit);
        return page;
    }
    pages
        .into_iter()
        .kmerge_by(|a, b| match sort {
            SortOrder::Ascending => a.id < b.id,
            SortOrder::Descending => a.id > b.id,
        })
        .take(limit)
        .collect()
}
