use std::collections::HashMap;

use axum::{
    Extension, Json,
    extract::{Query, State},
};
use uuid::Uuid;

use chairspace_karma::{SortMode, rank_feed};
use chairspace_types::api::{Claims, FeedQuery, FeedResponse};
use chairspace_types::models::Post;

use crate::auth::AppState;
use crate::convert;
use crate::db_call;
use crate::error::ApiError;

/// GET /feed?sort=<mode>: every post, ranked. Recomputed on each request.
pub async fn feed(
    State(state): State<AppState>,
    Query(query): Query<FeedQuery>,
    Extension(_claims): Extension<Claims>,
) -> Result<Json<FeedResponse>, ApiError> {
    let mode = SortMode::from_param(query.sort.as_deref());
    let needs_karma = matches!(mode, SortMode::MostKarma | SortMode::LeastKarma);

    let (rows, totals) = db_call(&state, move |db| {
        let rows = db.list_posts()?;
        let totals = if needs_karma {
            db.post_karma_totals()?
        } else {
            HashMap::new()
        };
        Ok((rows, totals))
    })
    .await?;

    let posts: Vec<Post> = rows.into_iter().map(convert::post).collect();
    let totals: HashMap<Uuid, i64> = totals
        .into_iter()
        .filter_map(|(id, karma)| id.parse().ok().map(|id| (id, karma)))
        .collect();

    let feed = rank_feed(posts, &totals, mode);

    Ok(Json(FeedResponse {
        sort: mode,
        posts: feed.posts,
        num_posts: feed.num_posts,
        column_size: feed.column_size,
    }))
}
