use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use chairspace_types::api::{Claims, CommentRequest};

use crate::auth::AppState;
use crate::convert;
use crate::db_call;
use crate::error::ApiError;

pub async fn create_comment(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CommentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let text = non_empty(req.text)?;

    let comment_id = Uuid::new_v4();
    let (cid, pid, uid) = (comment_id.to_string(), post_id.to_string(), claims.sub.to_string());
    let row = db_call(&state, move |db| {
        if db.get_post(&pid)?.is_none() {
            return Ok(None);
        }
        db.create_comment(&cid, &pid, &uid, &text, Utc::now())?;
        db.get_comment(&cid)
    })
    .await?
    .ok_or(ApiError::NotFound("Post"))?;

    info!(%comment_id, %post_id, author = %claims.sub, "Comment created");
    Ok((StatusCode::CREATED, Json(convert::comment(row))))
}

pub async fn edit_comment(
    State(state): State<AppState>,
    Path((post_id, comment_id)): Path<(Uuid, Uuid)>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CommentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let text = non_empty(req.text)?;
    ensure_commenter(&state, post_id, comment_id, claims.sub).await?;

    let cid = comment_id.to_string();
    let row = db_call(&state, move |db| {
        db.set_comment_text(&cid, &text)?;
        db.get_comment(&cid)
    })
    .await?
    .ok_or(ApiError::NotFound("Comment"))?;

    info!(%comment_id, "Comment edited");
    Ok(Json(convert::comment(row)))
}

pub async fn delete_comment(
    State(state): State<AppState>,
    Path((post_id, comment_id)): Path<(Uuid, Uuid)>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    ensure_commenter(&state, post_id, comment_id, claims.sub).await?;

    let cid = comment_id.to_string();
    db_call(&state, move |db| db.delete_comment(&cid)).await?;

    info!(%comment_id, "Comment deleted");
    Ok(StatusCode::NO_CONTENT)
}

fn non_empty(text: String) -> Result<String, ApiError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(ApiError::BadRequest("Comment text is required".into()));
    }
    Ok(text.to_string())
}

/// The comment must exist under `post_id` and belong to `user_id`.
async fn ensure_commenter(
    state: &AppState,
    post_id: Uuid,
    comment_id: Uuid,
    user_id: Uuid,
) -> Result<(), ApiError> {
    let cid = comment_id.to_string();
    let commenter = db_call(state, move |db| db.get_comment(&cid))
        .await?
        .filter(|c| c.post_id == post_id.to_string())
        .map(|c| c.user_id)
        .ok_or(ApiError::NotFound("Comment"))?;

    if commenter != user_id.to_string() {
        return Err(ApiError::Forbidden("Only the author can change this comment"));
    }
    Ok(())
}
