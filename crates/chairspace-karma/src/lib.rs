//! Vote bookkeeping and feed ordering for posts and comments.
//!
//! Everything here is pure: the store decides what to persist, this crate
//! decides what the next score is and in which order posts are shown.

pub mod feed;
pub mod target;
pub mod vote;

pub use feed::{Feed, Rankable, SortMode, column_count, rank_feed};
pub use target::{KarmaTarget, TargetError};
pub use vote::{VoteDirection, VoteOutcome, VoteTransition, tally, tally_by_target};
