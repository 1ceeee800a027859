use std::collections::HashMap;
use std::hash::Hash;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteDirection {
    Up,
    Down,
}

impl VoteDirection {
    /// Score a fresh vote in this direction is stored with.
    pub fn score(self) -> i32 {
        match self {
            Self::Up => 1,
            Self::Down => -1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteOutcome {
    /// First vote by this user on the target; a record was created.
    Cast,
    /// Same direction voted twice; the score went back to 0.
    Retracted,
    /// Existing record moved to the requested direction.
    Changed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoteTransition {
    pub score: i32,
    pub outcome: VoteOutcome,
}

impl VoteTransition {
    /// Next state of a voter's record on one target.
    ///
    /// `current` is the stored score, or `None` when the voter has never
    /// voted on the target. Repeating a vote toggles it off; anything else
    /// lands on the requested direction.
    pub fn apply(current: Option<i32>, direction: VoteDirection) -> Self {
        let wanted = direction.score();
        match current {
            None => Self {
                score: wanted,
                outcome: VoteOutcome::Cast,
            },
            Some(score) if score == wanted => Self {
                score: 0,
                outcome: VoteOutcome::Retracted,
            },
            Some(_) => Self {
                score: wanted,
                outcome: VoteOutcome::Changed,
            },
        }
    }
}

/// Sum of signed votes. An empty set of votes is worth 0.
pub fn tally<I>(scores: I) -> i64
where
    I: IntoIterator<Item = i32>,
{
    scores.into_iter().map(i64::from).sum()
}

/// Sum of signed votes grouped by target.
///
/// Only keys that appear in `votes` are present in the result, so a key
/// whose votes cancel out maps to 0 while a key nobody voted on is absent.
pub fn tally_by_target<K, I>(votes: I) -> HashMap<K, i64>
where
    K: Eq + Hash,
    I: IntoIterator<Item = (K, i32)>,
{
    let mut totals = HashMap::new();
    for (key, score) in votes {
        *totals.entry(key).or_insert(0) += i64::from(score);
    }
    totals
}
