use std::cmp::Reverse;
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Columns the feed is laid out in.
const FEED_COLUMNS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortMode {
    Oldest,
    #[default]
    Newest,
    MostKarma,
    LeastKarma,
}

impl SortMode {
    /// Parse the `sort` query parameter. Missing or unrecognised values fall
    /// back to newest first.
    pub fn from_param(param: Option<&str>) -> Self {
        match param {
            Some("oldest") => Self::Oldest,
            Some("newest") => Self::Newest,
            Some("most_karma") => Self::MostKarma,
            Some("least_karma") => Self::LeastKarma,
            _ => Self::default(),
        }
    }
}

/// Anything the feed can order.
pub trait Rankable {
    fn rank_id(&self) -> Uuid;
    fn created_at(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Serialize)]
pub struct Feed<T> {
    pub posts: Vec<T>,
    pub num_posts: usize,
    pub column_size: usize,
}

/// Rows per column when `num_posts` are split over the feed columns.
pub fn column_count(num_posts: usize) -> usize {
    num_posts.div_ceil(FEED_COLUMNS)
}

/// Order posts for the feed.
///
/// `totals` holds the summed post karma for every post that has at least one
/// karma record; posts missing from it are treated as never voted on. In the
/// karma modes voted posts always come first, then the unvoted ones by time.
pub fn rank_feed<T: Rankable>(
    mut posts: Vec<T>,
    totals: &HashMap<Uuid, i64>,
    mode: SortMode,
) -> Feed<T> {
    let num_posts = posts.len();

    let posts = match mode {
        SortMode::Oldest => {
            posts.sort_by_key(|p| p.created_at());
            posts
        }
        SortMode::Newest => {
            posts.sort_by_key(|p| Reverse(p.created_at()));
            posts
        }
        SortMode::MostKarma => by_karma(posts, totals, true),
        SortMode::LeastKarma => by_karma(posts, totals, false),
    };

    Feed {
        posts,
        num_posts,
        column_size: column_count(num_posts),
    }
}

fn by_karma<T: Rankable>(posts: Vec<T>, totals: &HashMap<Uuid, i64>, descending: bool) -> Vec<T> {
    let mut voted: Vec<(i64, T)> = Vec::new();
    let mut unvoted: Vec<T> = Vec::new();
    for post in posts {
        match totals.get(&post.rank_id()) {
            Some(&karma) => voted.push((karma, post)),
            None => unvoted.push(post),
        }
    }

    if descending {
        voted.sort_by(|(ka, a), (kb, b)| {
            kb.cmp(ka).then_with(|| b.created_at().cmp(&a.created_at()))
        });
        unvoted.sort_by_key(|p| Reverse(p.created_at()));
    } else {
        voted.sort_by(|(ka, a), (kb, b)| {
            ka.cmp(kb).then_with(|| a.created_at().cmp(&b.created_at()))
        });
        unvoted.sort_by_key(|p| p.created_at());
    }

    voted.into_iter().map(|(_, post)| post).chain(unvoted).collect()
}
