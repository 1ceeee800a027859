use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, TransactionBehavior};

use crate::models::{CommentRow, PostRow, UserRow};
use crate::{Database, format_timestamp, is_unique_violation};

const USER_COLUMNS: &str =
    "id, handle, name, email, password, description, strikes, pfp_url, created_at";
const POST_COLUMNS: &str = "id, image_url, title, created_at, contains_chair, user_id";
const COMMENT_COLUMNS: &str = "id, text, created_at, user_id, post_id";

pub struct NewUser<'a> {
    pub id: &'a str,
    pub handle: &'a str,
    pub name: &'a str,
    pub email: &'a str,
    pub password_hash: &'a str,
    pub created_at: DateTime<Utc>,
}

pub struct NewPost<'a> {
    pub id: &'a str,
    pub user_id: &'a str,
    pub image_url: &'a str,
    pub title: Option<&'a str>,
    pub contains_chair: bool,
    pub created_at: DateTime<Utc>,
    /// Authors holding this many strikes may not post.
    pub strike_ceiling: i64,
}

/// A signup lost to an existing account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AccountTaken {
    #[error("Email already exists")]
    Email,
    #[error("Handle is already in use")]
    Handle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostInsert {
    /// Stored. `strikes` is the author's count afterwards.
    Created { strikes: i64 },
    /// Nothing stored, the author is at the strike ceiling.
    StrikeLimit { strikes: i64 },
    /// Nothing stored, the author is gone.
    AuthorMissing,
}

impl Database {
    // -- Users --

    pub fn create_user(&self, user: &NewUser<'_>) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, handle, name, email, password, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    user.id,
                    user.handle,
                    user.name,
                    user.email,
                    user.password_hash,
                    format_timestamp(user.created_at),
                ],
            )
            .map_err(|e| match account_taken(&e) {
                Some(taken) => anyhow::Error::new(taken),
                None => e.into(),
            })?;
            Ok(())
        })
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id", id))
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "email", email))
    }

    pub fn get_user_by_handle(&self, handle: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "handle", handle))
    }

    /// Delete an account. Posts, comments and karma records go with it.
    pub fn delete_user(&self, id: &str) -> Result<bool> {
        self.with_conn(|conn| Ok(conn.execute("DELETE FROM users WHERE id = ?1", [id])? > 0))
    }

    pub fn set_description(&self, id: &str, description: Option<&str>) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE users SET description = ?1 WHERE id = ?2",
                rusqlite::params![description, id],
            )?;
            Ok(changed > 0)
        })
    }

    pub fn set_pfp_url(&self, id: &str, pfp_url: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE users SET pfp_url = ?1 WHERE id = ?2",
                rusqlite::params![pfp_url, id],
            )?;
            Ok(changed > 0)
        })
    }

    // -- Posts --

    /// Insert a post. The author's strikes are read under the write lock: an
    /// author at `strike_ceiling` is refused, and a post without a chair costs
    /// a strike in the same transaction.
    pub fn create_post(&self, post: &NewPost<'_>) -> Result<PostInsert> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let Some(strikes) = tx
                .query_row("SELECT strikes FROM users WHERE id = ?1", [post.user_id], |row| {
                    row.get::<_, i64>(0)
                })
                .optional()?
            else {
                return Ok(PostInsert::AuthorMissing);
            };
            if strikes >= post.strike_ceiling {
                return Ok(PostInsert::StrikeLimit { strikes });
            }

            tx.execute(
                "INSERT INTO posts (id, image_url, title, created_at, contains_chair, user_id)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    post.id,
                    post.image_url,
                    post.title,
                    format_timestamp(post.created_at),
                    post.contains_chair,
                    post.user_id,
                ],
            )?;

            let strikes = if post.contains_chair {
                strikes
            } else {
                tx.execute(
                    "UPDATE users SET strikes = strikes + 1 WHERE id = ?1",
                    [post.user_id],
                )?;
                strikes + 1
            };

            tx.commit()?;
            Ok(PostInsert::Created { strikes })
        })
    }

    pub fn get_post(&self, id: &str) -> Result<Option<PostRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    &format!("SELECT {POST_COLUMNS} FROM posts WHERE id = ?1"),
                    [id],
                    post_from_row,
                )
                .optional()?;
            Ok(row)
        })
    }

    /// Every post, in storage order. Ordering is the feed ranker's job.
    pub fn list_posts(&self) -> Result<Vec<PostRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!("SELECT {POST_COLUMNS} FROM posts"))?;
            let rows = stmt
                .query_map([], post_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn list_posts_by_user(&self, user_id: &str) -> Result<Vec<PostRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {POST_COLUMNS} FROM posts WHERE user_id = ?1 ORDER BY created_at DESC"
            ))?;
            let rows = stmt
                .query_map([user_id], post_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn set_post_title(&self, id: &str, title: Option<&str>) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE posts SET title = ?1 WHERE id = ?2",
                rusqlite::params![title, id],
            )?;
            Ok(changed > 0)
        })
    }

    /// Delete a post and its comments. Karma records pointing at them stay.
    pub fn delete_post(&self, id: &str) -> Result<bool> {
        self.with_conn(|conn| Ok(conn.execute("DELETE FROM posts WHERE id = ?1", [id])? > 0))
    }

    // -- Comments --

    pub fn create_comment(
        &self,
        id: &str,
        post_id: &str,
        user_id: &str,
        text: &str,
        created_at: DateTime<Utc>,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO comments (id, text, created_at, user_id, post_id)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![id, text, format_timestamp(created_at), user_id, post_id],
            )?;
            Ok(())
        })
    }

    pub fn get_comment(&self, id: &str) -> Result<Option<CommentRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    &format!("SELECT {COMMENT_COLUMNS} FROM comments WHERE id = ?1"),
                    [id],
                    comment_from_row,
                )
                .optional()?;
            Ok(row)
        })
    }

    /// Comments under a post, oldest first.
    pub fn list_comments_for_post(&self, post_id: &str) -> Result<Vec<CommentRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COMMENT_COLUMNS} FROM comments WHERE post_id = ?1 ORDER BY created_at ASC"
            ))?;
            let rows = stmt
                .query_map([post_id], comment_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn set_comment_text(&self, id: &str, text: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE comments SET text = ?1 WHERE id = ?2",
                rusqlite::params![text, id],
            )?;
            Ok(changed > 0)
        })
    }

    pub fn delete_comment(&self, id: &str) -> Result<bool> {
        self.with_conn(|conn| Ok(conn.execute("DELETE FROM comments WHERE id = ?1", [id])? > 0))
    }
}

/// `column` is always one of our own literals, never user input.
fn query_user(conn: &Connection, column: &str, value: &str) -> Result<Option<UserRow>> {
    let mut stmt = conn.prepare(&format!("SELECT {USER_COLUMNS} FROM users WHERE {column} = ?1"))?;
    let row = stmt.query_row([value], user_from_row).optional()?;
    Ok(row)
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        handle: row.get(1)?,
        name: row.get(2)?,
        email: row.get(3)?,
        password: row.get(4)?,
        description: row.get(5)?,
        strikes: row.get(6)?,
        pfp_url: row.get(7)?,
        created_at: row.get(8)?,
    })
}

pub(crate) fn post_from_row(row: &Row<'_>) -> rusqlite::Result<PostRow> {
    Ok(PostRow {
        id: row.get(0)?,
        image_url: row.get(1)?,
        title: row.get(2)?,
        created_at: row.get(3)?,
        contains_chair: row.get(4)?,
        user_id: row.get(5)?,
    })
}

fn comment_from_row(row: &Row<'_>) -> rusqlite::Result<CommentRow> {
    Ok(CommentRow {
        id: row.get(0)?,
        text: row.get(1)?,
        created_at: row.get(2)?,
        user_id: row.get(3)?,
        post_id: row.get(4)?,
    })
}

fn account_taken(err: &rusqlite::Error) -> Option<AccountTaken> {
    if !is_unique_violation(err) {
        return None;
    }
    match err {
        rusqlite::Error::SqliteFailure(_, Some(msg)) if msg.contains("users.email") => {
            Some(AccountTaken::Email)
        }
        rusqlite::Error::SqliteFailure(_, Some(msg)) if msg.contains("users.handle") => {
            Some(AccountTaken::Handle)
        }
        _ => None,
    }
}
