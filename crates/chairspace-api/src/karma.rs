use axum::{
    Extension, Json,
    extract::{Path, State},
};
use tracing::warn;
use uuid::Uuid;

use chairspace_karma::{KarmaTarget, VoteDirection};
use chairspace_types::api::{Claims, VoteResponse};

use crate::auth::AppState;
use crate::convert;
use crate::db_call;
use crate::error::ApiError;

/// GET /karma/upvote-karma/{user_id}/{object_uuid}
pub async fn upvote(
    State(state): State<AppState>,
    Path((user_id, object_uuid)): Path<(Uuid, Uuid)>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<VoteResponse>, ApiError> {
    vote(&state, &claims, user_id, object_uuid, VoteDirection::Up).await
}

/// GET /karma/downvote-karma/{user_id}/{object_uuid}
pub async fn downvote(
    State(state): State<AppState>,
    Path((user_id, object_uuid)): Path<(Uuid, Uuid)>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<VoteResponse>, ApiError> {
    vote(&state, &claims, user_id, object_uuid, VoteDirection::Down).await
}

/// Votes are always recorded against the caller. The `user_id` in the path
/// has to name the caller; it never selects someone else's record.
async fn vote(
    state: &AppState,
    claims: &Claims,
    user_id: Uuid,
    object_uuid: Uuid,
    direction: VoteDirection,
) -> Result<Json<VoteResponse>, ApiError> {
    if user_id != claims.sub {
        warn!(caller = %claims.sub, %user_id, "Vote on behalf of another user refused");
        return Err(ApiError::Forbidden("Votes can only be cast as yourself"));
    }

    let voter = claims.sub.to_string();
    let (applied, post_id) = db_call(state, move |db| {
        let applied = db.apply_vote(&voter, object_uuid, direction)?;
        let target = KarmaTarget::from_parts(&applied.row.object_type, &applied.row.object_uuid)?;
        let post_id = db.post_id_for_target(&target)?;
        Ok((applied, post_id))
    })
    .await?;

    let post_id = post_id.and_then(|id| id.parse::<Uuid>().ok());

    Ok(Json(VoteResponse {
        karma: convert::karma(applied.row)?,
        outcome: applied.outcome,
        post_id,
    }))
}
