use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use chairspace_karma::{KarmaTarget, Rankable};

/// Public view of an account. Email and credential never leave the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub handle: String,
    pub name: String,
    pub description: Option<String>,
    pub strikes: i64,
    pub pfp_url: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: Uuid,
    pub image_url: String,
    pub title: Option<String>,
    pub created_at: DateTime<Utc>,
    pub contains_chair: bool,
    pub user_id: Uuid,
}

impl Rankable for Post {
    fn rank_id(&self) -> Uuid {
        self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: Uuid,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub user_id: Uuid,
    pub post_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Karma {
    pub id: Uuid,
    pub score: i32,
    pub target: KarmaTarget,
    pub user_id: Uuid,
}
