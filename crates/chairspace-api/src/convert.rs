//! Row -> API model conversion. Corrupt columns are logged and defaulted
//! rather than failing a whole listing.

use chrono::{DateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use chairspace_db::models::{CommentRow, KarmaRow, PostRow, UserRow};
use chairspace_db::parse_timestamp;
use chairspace_karma::KarmaTarget;
use chairspace_types::models::{Comment, Karma, Post, User};

use crate::error::ApiError;

fn uuid(raw: &str, field: &str, owner: &str) -> Uuid {
    raw.parse().unwrap_or_else(|e| {
        warn!("Corrupt {} '{}' on '{}': {}", field, raw, owner, e);
        Uuid::default()
    })
}

fn timestamp(raw: &str, owner: &str) -> DateTime<Utc> {
    parse_timestamp(raw).unwrap_or_else(|e| {
        warn!("Corrupt created_at on '{}': {}", owner, e);
        DateTime::default()
    })
}

pub(crate) fn user(row: UserRow) -> User {
    User {
        id: uuid(&row.id, "id", &row.id),
        created_at: timestamp(&row.created_at, &row.id),
        handle: row.handle,
        name: row.name,
        description: row.description,
        strikes: row.strikes,
        pfp_url: row.pfp_url,
    }
}

pub(crate) fn post(row: PostRow) -> Post {
    Post {
        id: uuid(&row.id, "id", &row.id),
        user_id: uuid(&row.user_id, "user_id", &row.id),
        created_at: timestamp(&row.created_at, &row.id),
        image_url: row.image_url,
        title: row.title,
        contains_chair: row.contains_chair,
    }
}

pub(crate) fn comment(row: CommentRow) -> Comment {
    Comment {
        id: uuid(&row.id, "id", &row.id),
        user_id: uuid(&row.user_id, "user_id", &row.id),
        post_id: uuid(&row.post_id, "post_id", &row.id),
        created_at: timestamp(&row.created_at, &row.id),
        text: row.text,
    }
}

/// Karma rows carry the target tag, which has no sensible default.
pub(crate) fn karma(row: KarmaRow) -> Result<Karma, ApiError> {
    let target = KarmaTarget::from_parts(&row.object_type, &row.object_uuid)
        .map_err(|e| ApiError::Internal(e.into()))?;

    Ok(Karma {
        id: uuid(&row.id, "id", &row.id),
        user_id: uuid(&row.user_id, "user_id", &row.id),
        score: row.score,
        target,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corrupt_columns_default() {
        let row = PostRow {
            id: "not-a-uuid".into(),
            image_url: "/static/uploads/x.png".into(),
            title: None,
            created_at: "sometime".into(),
            contains_chair: true,
            user_id: Uuid::new_v4().to_string(),
        };
        let post = post(row);
        assert_eq!(post.id, Uuid::default());
        assert_eq!(post.created_at, DateTime::<Utc>::default());
    }

    #[test]
    fn karma_rows_keep_their_target() {
        let target = Uuid::new_v4();
        let karma = karma(KarmaRow {
            id: Uuid::new_v4().to_string(),
            score: -1,
            object_uuid: target.to_string(),
            object_type: "comment".into(),
            user_id: Uuid::new_v4().to_string(),
        })
        .unwrap();
        assert_eq!(karma.target, KarmaTarget::Comment(target));
        assert_eq!(karma.score, -1);
    }
}
