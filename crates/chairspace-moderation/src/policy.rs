use std::fmt;

use crate::classifier::Detections;

/// Detections below this confidence are ignored.
pub const DETECTION_THRESHOLD: f32 = 0.5;

/// Strikes that end an account. The account goes when a post is attempted
/// with one strike short of this.
pub const MAX_STRIKES: i64 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verdict {
    pub contains_table: bool,
    pub contains_chair: bool,
}

impl Verdict {
    pub fn from_detections(detections: &Detections) -> Self {
        let labels: Vec<&str> = detections
            .iter()
            .filter(|(_, confidence)| **confidence >= DETECTION_THRESHOLD)
            .map(|(label, _)| label.as_str())
            .collect();

        let contains_table = labels
            .iter()
            .any(|label| label.contains("table") || label.contains("bench"));
        // An image with nothing recognisable in it gets the benefit of the doubt.
        let contains_chair = labels.is_empty() || labels.iter().any(|label| label.contains("chair"));

        Self {
            contains_table,
            contains_chair,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BanReason {
    Table,
    Strikes,
}

impl BanReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Table => "table",
            Self::Strikes => "strike",
        }
    }
}

impl fmt::Display for BanReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostDecision {
    /// Delete the author instead of publishing.
    Ban(BanReason),
    /// Publish. A post without a chair costs the author a strike.
    Publish { contains_chair: bool },
}

impl PostDecision {
    pub fn strikes(self) -> bool {
        matches!(self, Self::Publish { contains_chair: false })
    }
}

/// Decide what happens to a new post given what the image contains and how
/// many strikes its author already has.
pub fn decide_post(verdict: Verdict, strikes: i64) -> PostDecision {
    if verdict.contains_table {
        return PostDecision::Ban(BanReason::Table);
    }
    if strikes >= MAX_STRIKES - 1 {
        return PostDecision::Ban(BanReason::Strikes);
    }
    PostDecision::Publish {
        contains_chair: verdict.contains_chair,
    }
}
