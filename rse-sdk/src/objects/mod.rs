pub mod events;
pub mod poll;

pub use events::{EventView, PollResponse};
pub use poll::{MatchMode, PollOptions, SortOrder};
