use std::collections::HashMap;

use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, TransactionBehavior};
use tracing::{debug, warn};
use uuid::Uuid;

use chairspace_karma::{KarmaTarget, VoteDirection, VoteOutcome, VoteTransition, tally, tally_by_target};

use crate::{Database, is_unique_violation};
use crate::models::KarmaRow;

/// Two attempts at the same vote both hit the (voter, target) uniqueness
/// constraint.
#[derive(Debug, thiserror::Error)]
#[error("vote by {voter_id} on {target_id} conflicted with a concurrent vote")]
pub struct VoteConflict {
    pub voter_id: String,
    pub target_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedVote {
    pub row: KarmaRow,
    pub outcome: VoteOutcome,
}

impl Database {
    /// Cast, retract or flip `voter_id`'s vote on `target_id`.
    ///
    /// The lookup and the write run in one immediate transaction, and this
    /// process funnels every write through one connection, so the
    /// (voter, target) constraint cannot trip from inside the service. It is a
    /// backstop against rows written by another process sharing the database
    /// file: such a collision is retried once against the now existing record,
    /// and a second one surfaces as `VoteConflict`.
    pub fn apply_vote(
        &self,
        voter_id: &str,
        target_id: Uuid,
        direction: VoteDirection,
    ) -> Result<AppliedVote> {
        self.with_conn_mut(|conn| {
            let applied = retry_on_unique(|| upsert_vote(conn, voter_id, target_id, direction))
                .map_err(|e| {
                    if is_unique_violation(&e) {
                        anyhow::Error::new(VoteConflict {
                            voter_id: voter_id.to_string(),
                            target_id,
                        })
                    } else {
                        e.into()
                    }
                })?;

            debug!(
                voter_id,
                %target_id,
                direction = direction.as_str(),
                score = applied.row.score,
                outcome = ?applied.outcome,
                "Vote applied"
            );
            Ok(applied)
        })
    }

    pub fn get_karma(&self, target_id: &str, voter_id: &str) -> Result<Option<KarmaRow>> {
        self.with_conn(|conn| Ok(query_karma(conn, target_id, voter_id)?))
    }

    /// Sum of every vote on one object, 0 when nobody voted.
    pub fn karma_for_object(&self, object_uuid: &str) -> Result<i64> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT score FROM karma WHERE object_uuid = ?1")?;
            let scores = stmt
                .query_map([object_uuid], |row| row.get::<_, i32>(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(tally(scores))
        })
    }

    /// Batch version of `karma_for_object`. Objects nobody voted on are
    /// absent from the map.
    pub fn karma_for_objects(&self, object_uuids: &[String]) -> Result<HashMap<String, i64>> {
        if object_uuids.is_empty() {
            return Ok(HashMap::new());
        }

        self.with_conn(|conn| {
            let placeholders: Vec<String> =
                (1..=object_uuids.len()).map(|i| format!("?{}", i)).collect();
            let sql = format!(
                "SELECT object_uuid, score FROM karma WHERE object_uuid IN ({})",
                placeholders.join(", ")
            );

            let mut stmt = conn.prepare(&sql)?;
            let votes = stmt
                .query_map(rusqlite::params_from_iter(object_uuids), |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, i32>(1)?))
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(tally_by_target(votes))
        })
    }

    /// Summed post karma for every post with at least one post-typed record.
    pub fn post_karma_totals(&self) -> Result<HashMap<String, i64>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT k.object_uuid, k.score
                 FROM karma k
                 JOIN posts p ON p.id = k.object_uuid
                 WHERE k.object_type = 'post'",
            )?;
            let votes = stmt
                .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i32>(1)?)))?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(tally_by_target(votes))
        })
    }

    /// Post a karma target lives under: the post itself, or the comment's
    /// post. `None` when the target no longer exists.
    pub fn post_id_for_target(&self, target: &KarmaTarget) -> Result<Option<String>> {
        self.with_conn(|conn| {
            let sql = match target {
                KarmaTarget::Post(_) => "SELECT id FROM posts WHERE id = ?1",
                KarmaTarget::Comment(_) => "SELECT post_id FROM comments WHERE id = ?1",
            };
            let post_id = conn
                .query_row(sql, [target.id().to_string()], |row| row.get(0))
                .optional()?;
            Ok(post_id)
        })
    }
}

fn upsert_vote(
    conn: &mut Connection,
    voter_id: &str,
    target_id: Uuid,
    direction: VoteDirection,
) -> rusqlite::Result<AppliedVote> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let object_uuid = target_id.to_string();

    let applied = match query_karma(&tx, &object_uuid, voter_id)? {
        Some(mut row) => {
            let next = VoteTransition::apply(Some(row.score), direction);
            tx.execute(
                "UPDATE karma SET score = ?1 WHERE id = ?2",
                rusqlite::params![next.score, row.id],
            )?;
            row.score = next.score;
            AppliedVote {
                row,
                outcome: next.outcome,
            }
        }
        None => {
            let next = VoteTransition::apply(None, direction);
            let target = resolve_target(&tx, target_id)?;
            let row = KarmaRow {
                id: Uuid::new_v4().to_string(),
                score: next.score,
                object_uuid,
                object_type: target.type_tag().to_string(),
                user_id: voter_id.to_string(),
            };
            tx.execute(
                "INSERT INTO karma (id, score, object_uuid, object_type, user_id)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![row.id, row.score, row.object_uuid, row.object_type, row.user_id],
            )?;
            AppliedVote {
                row,
                outcome: next.outcome,
            }
        }
    };

    tx.commit()?;
    Ok(applied)
}

/// Decide once whether an id names a post or a comment. Anything that is not
/// a post is recorded as a comment, even if no comment matches either.
fn resolve_target(conn: &Connection, target_id: Uuid) -> rusqlite::Result<KarmaTarget> {
    let id = target_id.to_string();
    let is_post = conn
        .query_row("SELECT 1 FROM posts WHERE id = ?1", [&id], |_| Ok(()))
        .optional()?
        .is_some();
    if is_post {
        return Ok(KarmaTarget::Post(target_id));
    }

    let is_comment = conn
        .query_row("SELECT 1 FROM comments WHERE id = ?1", [&id], |_| Ok(()))
        .optional()?
        .is_some();
    if !is_comment {
        warn!(%target_id, "Vote target matches no post or comment, recording as comment");
    }
    Ok(KarmaTarget::Comment(target_id))
}

fn query_karma(
    conn: &Connection,
    object_uuid: &str,
    voter_id: &str,
) -> rusqlite::Result<Option<KarmaRow>> {
    conn.query_row(
        "SELECT id, score, object_uuid, object_type, user_id
         FROM karma WHERE object_uuid = ?1 AND user_id = ?2",
        [object_uuid, voter_id],
        |row| {
            Ok(KarmaRow {
                id: row.get(0)?,
                score: row.get(1)?,
                object_uuid: row.get(2)?,
                object_type: row.get(3)?,
                user_id: row.get(4)?,
            })
        },
    )
    .optional()
}

/// Run `attempt` a second time if the first one trips a uniqueness
/// constraint. A second trip is handed back unchanged.
fn retry_on_unique<T>(mut attempt: impl FnMut() -> rusqlite::Result<T>) -> rusqlite::Result<T> {
    match attempt() {
        Err(e) if is_unique_violation(&e) => {
            warn!("Write collided with a concurrent insert, retrying: {}", e);
            attempt()
        }
        other => other,
    }
}
