use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use chairspace_db::PostInsert;
use chairspace_db::queries::NewPost;
use chairspace_moderation::{BanReason, MAX_STRIKES, PostDecision, decide_post};
use chairspace_types::api::{
    Claims, CommentWithKarma, CreatePostRequest, CreatePostResponse, EditPostRequest,
    PostDetailResponse,
};

use crate::auth::AppState;
use crate::convert;
use crate::db_call;
use crate::error::ApiError;
use crate::moderation;

/// POST /posts: publish an image, subject to moderation.
///
/// Tables and benches cost the author their account outright. A post with no
/// chair in it is published but earns a strike; a post attempted at one
/// strike short of the limit deletes the account instead.
pub async fn create_post(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreatePostRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let image_url = req.image_url.trim().to_string();
    if image_url.is_empty() {
        return Err(ApiError::BadRequest("Image URL is required".into()));
    }

    let verdict = moderation::inspect(&state, &image_url).await?;
    if verdict.contains_table {
        return Err(moderation::ban(&state, claims.sub, BanReason::Table).await);
    }

    let title = req
        .title
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Title is required".into()))?
        .to_string();

    let uid = claims.sub.to_string();
    let strikes = db_call(&state, move |db| Ok(db.get_user_by_id(&uid)?.map(|u| u.strikes)))
        .await?
        .ok_or(ApiError::Unauthorized)?;

    let decision = decide_post(verdict, strikes);
    let contains_chair = match decision {
        PostDecision::Ban(reason) => return Err(moderation::ban(&state, claims.sub, reason).await),
        PostDecision::Publish { contains_chair } => contains_chair,
    };

    // The store re-checks the ceiling under its write lock, so concurrent
    // posts cannot all slip past the read above.
    let post_id = Uuid::new_v4();
    let (id, uid) = (post_id.to_string(), claims.sub.to_string());
    let inserted = db_call(&state, move |db| {
        let outcome = db.create_post(&NewPost {
            id: &id,
            user_id: &uid,
            image_url: &image_url,
            title: Some(&title),
            contains_chair,
            created_at: Utc::now(),
            strike_ceiling: MAX_STRIKES - 1,
        })?;
        let PostInsert::Created { strikes } = outcome else {
            return Ok(Err(outcome));
        };
        let row = db
            .get_post(&id)?
            .ok_or_else(|| anyhow::anyhow!("Post {} vanished after insert", id))?;
        Ok(Ok((strikes, row)))
    })
    .await?;

    let (strikes, row) = match inserted {
        Ok(created) => created,
        Err(PostInsert::StrikeLimit { strikes }) => {
            warn!(author = %claims.sub, strikes, "Strike limit reached while posting");
            return Err(moderation::ban(&state, claims.sub, BanReason::Strikes).await);
        }
        Err(_) => return Err(ApiError::Unauthorized),
    };

    let strikes_left = decision.strikes().then(|| (MAX_STRIKES - strikes).max(0));
    info!(%post_id, author = %claims.sub, contains_chair, strikes, "Post created");

    Ok((
        StatusCode::CREATED,
        Json(CreatePostResponse {
            post: convert::post(row),
            strikes_left,
        }),
    ))
}

/// GET /post/{post_id}: the post, its comments, and karma for each.
pub async fn get_post(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
    Extension(_claims): Extension<Claims>,
) -> Result<Json<PostDetailResponse>, ApiError> {
    let pid = post_id.to_string();
    let (post, post_karma, comments, comment_karma) = db_call(&state, move |db| {
        let Some(post) = db.get_post(&pid)? else {
            return Ok(None);
        };
        let post_karma = db.karma_for_object(&pid)?;
        let comments = db.list_comments_for_post(&pid)?;
        let ids: Vec<String> = comments.iter().map(|c| c.id.clone()).collect();
        let comment_karma = db.karma_for_objects(&ids)?;
        Ok(Some((post, post_karma, comments, comment_karma)))
    })
    .await?
    .ok_or(ApiError::NotFound("Post"))?;

    let comments = comments
        .into_iter()
        .map(|row| {
            let karma = comment_karma.get(&row.id).copied().unwrap_or(0);
            CommentWithKarma {
                comment: convert::comment(row),
                karma,
            }
        })
        .collect();

    Ok(Json(PostDetailResponse {
        post: convert::post(post),
        post_karma,
        comments,
    }))
}

/// PATCH /post/{post_id}: retitle a post. Author only.
pub async fn edit_post(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<EditPostRequest>,
) -> Result<impl IntoResponse, ApiError> {
    ensure_author(&state, post_id, claims.sub).await?;

    let title = req
        .title
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty());
    let pid = post_id.to_string();
    let row = db_call(&state, move |db| {
        db.set_post_title(&pid, title.as_deref())?;
        db.get_post(&pid)
    })
    .await?
    .ok_or(ApiError::NotFound("Post"))?;

    info!(%post_id, "Post edited");
    Ok(Json(convert::post(row)))
}

/// DELETE /post/{post_id}: remove a post and its comments. Author only.
pub async fn delete_post(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    ensure_author(&state, post_id, claims.sub).await?;

    let pid = post_id.to_string();
    db_call(&state, move |db| db.delete_post(&pid)).await?;

    info!(%post_id, "Post deleted");
    Ok(StatusCode::NO_CONTENT)
}

async fn ensure_author(state: &AppState, post_id: Uuid, user_id: Uuid) -> Result<(), ApiError> {
    let pid = post_id.to_string();
    let author = db_call(state, move |db| Ok(db.get_post(&pid)?.map(|p| p.user_id)))
        .await?
        .ok_or(ApiError::NotFound("Post"))?;

    if author != user_id.to_string() {
        return Err(ApiError::Forbidden("Only the author can change this post"));
    }
    Ok(())
}
