use serde::{Deserialize, Serialize};
use uuid::Uuid;

use chairspace_karma::{SortMode, VoteOutcome};

use crate::models::{Comment, Karma, Post, User};

// -- Token claims --

/// Bearer token claims. `sub` is the user id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub handle: String,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub email: String,
    pub name: String,
    pub handle: String,
    pub password: String,
    pub confirm_password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub user_id: Uuid,
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub user_id: Uuid,
    pub handle: String,
    pub token: String,
}

// -- Feed --

#[derive(Debug, Default, Deserialize)]
pub struct FeedQuery {
    pub sort: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FeedResponse {
    pub sort: SortMode,
    pub posts: Vec<Post>,
    pub num_posts: usize,
    pub column_size: usize,
}

// -- Posts --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreatePostRequest {
    pub image_url: String,
    pub title: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreatePostResponse {
    pub post: Post,
    /// Set when this post cost the author a strike.
    pub strikes_left: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EditPostRequest {
    pub title: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CommentWithKarma {
    #[serde(flatten)]
    pub comment: Comment,
    pub karma: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PostDetailResponse {
    pub post: Post,
    pub post_karma: i64,
    pub comments: Vec<CommentWithKarma>,
}

// -- Comments --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommentRequest {
    pub text: String,
}

// -- Karma --

#[derive(Debug, Serialize, Deserialize)]
pub struct VoteResponse {
    pub karma: Karma,
    pub outcome: VoteOutcome,
    /// Post the voted target belongs to, when it still exists.
    pub post_id: Option<Uuid>,
}

// -- Profiles --

#[derive(Debug, Serialize, Deserialize)]
pub struct ProfileResponse {
    pub user: User,
    pub posts: Vec<Post>,
    pub num_posts: usize,
    pub column_size: usize,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DescriptionRequest {
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AvatarRequest {
    pub image_url: String,
}
