pub mod auth;
pub mod comments;
mod convert;
pub mod error;
pub mod feed;
pub mod karma;
pub mod middleware;
mod moderation;
pub mod posts;
pub mod profile;

use axum::{
    Router,
    routing::{get, patch, post, put},
};
use tracing::error;

use chairspace_db::Database;

use crate::auth::AppState;
use crate::error::ApiError;
use crate::middleware::require_auth;

/// Every route the service exposes. Transport layers (tracing, CORS) are
/// added by the binary.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/health", get(health));

    let protected_routes = Router::new()
        .route("/feed", get(feed::feed))
        .route("/posts", post(posts::create_post))
        .route(
            "/post/{post_id}",
            get(posts::get_post).patch(posts::edit_post).delete(posts::delete_post),
        )
        .route("/post/{post_id}/comments", post(comments::create_comment))
        .route(
            "/post/{post_id}/comments/{comment_id}",
            patch(comments::edit_comment).delete(comments::delete_comment),
        )
        .route("/karma/upvote-karma/{user_id}/{object_uuid}", get(karma::upvote))
        .route("/karma/downvote-karma/{user_id}/{object_uuid}", get(karma::downvote))
        .route("/profile/{handle}", get(profile::get_profile))
        .route("/users/{user_id}/description", put(profile::set_description))
        .route("/users/{user_id}/avatar", put(profile::set_avatar))
        .layer(axum::middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

/// Run blocking store work off the async runtime.
pub(crate) async fn db_call<F, T>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state.db))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal(e.into())
        })?
        .map_err(ApiError::from)
}
