//! Database row types. These map directly to SQLite rows and stay separate
//! from the API models in chairspace-types.

pub struct UserRow {
    pub id: String,
    pub handle: String,
    pub name: String,
    pub email: String,
    pub password: String,
    pub description: Option<String>,
    pub strikes: i64,
    pub pfp_url: String,
    pub created_at: String,
}

pub struct PostRow {
    pub id: String,
    pub image_url: String,
    pub title: Option<String>,
    pub created_at: String,
    pub contains_chair: bool,
    pub user_id: String,
}

pub struct CommentRow {
    pub id: String,
    pub text: String,
    pub created_at: String,
    pub user_id: String,
    pub post_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KarmaRow {
    pub id: String,
    pub score: i32,
    pub object_uuid: String,
    pub object_type: String,
    pub user_id: String,
}
