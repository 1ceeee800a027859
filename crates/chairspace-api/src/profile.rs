use axum::{
    Extension, Json,
    extract::{Path, State},
};
use tracing::info;
use uuid::Uuid;

use chairspace_karma::column_count;
use chairspace_moderation::BanReason;
use chairspace_types::api::{AvatarRequest, Claims, DescriptionRequest, ProfileResponse};
use chairspace_types::models::User;

use crate::auth::AppState;
use crate::convert;
use crate::db_call;
use crate::error::ApiError;
use crate::moderation;

/// GET /profile/{handle}
pub async fn get_profile(
    State(state): State<AppState>,
    Path(handle): Path<String>,
    Extension(_claims): Extension<Claims>,
) -> Result<Json<ProfileResponse>, ApiError> {
    let (user, posts) = db_call(&state, move |db| {
        let Some(user) = db.get_user_by_handle(&handle)? else {
            return Ok(None);
        };
        let posts = db.list_posts_by_user(&user.id)?;
        Ok(Some((user, posts)))
    })
    .await?
    .ok_or(ApiError::NotFound("User"))?;

    let num_posts = posts.len();
    Ok(Json(ProfileResponse {
        user: convert::user(user),
        posts: posts.into_iter().map(convert::post).collect(),
        num_posts,
        column_size: column_count(num_posts),
    }))
}

/// PUT /users/{user_id}/description: set or clear the bio.
pub async fn set_description(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<DescriptionRequest>,
) -> Result<Json<User>, ApiError> {
    ensure_self(&claims, user_id)?;

    let description = req
        .description
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty());
    let uid = user_id.to_string();
    let row = db_call(&state, move |db| {
        db.set_description(&uid, description.as_deref())?;
        db.get_user_by_id(&uid)
    })
    .await?
    .ok_or(ApiError::NotFound("User"))?;

    info!(%user_id, "Description updated");
    Ok(Json(convert::user(row)))
}

/// PUT /users/{user_id}/avatar: swap the profile picture. A table in the
/// picture deletes the account.
pub async fn set_avatar(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<AvatarRequest>,
) -> Result<Json<User>, ApiError> {
    ensure_self(&claims, user_id)?;

    let image_url = req.image_url.trim().to_string();
    if image_url.is_empty() {
        return Err(ApiError::BadRequest("Image URL is required".into()));
    }

    let verdict = moderation::inspect(&state, &image_url).await?;
    if verdict.contains_table {
        return Err(moderation::ban(&state, user_id, BanReason::Table).await);
    }

    let uid = user_id.to_string();
    let row = db_call(&state, move |db| {
        db.set_pfp_url(&uid, &image_url)?;
        db.get_user_by_id(&uid)
    })
    .await?
    .ok_or(ApiError::NotFound("User"))?;

    info!(%user_id, "Avatar updated");
    Ok(Json(convert::user(row)))
}

fn ensure_self(claims: &Claims, user_id: Uuid) -> Result<(), ApiError> {
    if claims.sub != user_id {
        return Err(ApiError::Forbidden("You can only change your own profile"));
    }
    Ok(())
}
