use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 =
        conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id          TEXT PRIMARY KEY,
                handle      TEXT NOT NULL UNIQUE,
                name        TEXT NOT NULL,
                email       TEXT NOT NULL UNIQUE,
                password    TEXT NOT NULL,
                description TEXT,
                strikes     INTEGER NOT NULL DEFAULT 0 CHECK (strikes >= 0),
                pfp_url     TEXT NOT NULL DEFAULT '/static/user.svg',
                created_at  TEXT NOT NULL
            );

            CREATE TABLE posts (
                id              TEXT PRIMARY KEY,
                image_url       TEXT NOT NULL,
                title           TEXT,
                created_at      TEXT NOT NULL,
                contains_chair  INTEGER NOT NULL DEFAULT 0,
                user_id         TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE
            );

            CREATE INDEX idx_posts_created ON posts(created_at);
            CREATE INDEX idx_posts_user ON posts(user_id, created_at);

            CREATE TABLE comments (
                id          TEXT PRIMARY KEY,
                text        TEXT NOT NULL,
                created_at  TEXT NOT NULL,
                user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                post_id     TEXT NOT NULL REFERENCES posts(id) ON DELETE CASCADE
            );

            CREATE INDEX idx_comments_post ON comments(post_id, created_at);

            -- object_uuid points at a post or a comment depending on object_type,
            -- so it cannot carry a foreign key.
            CREATE TABLE karma (
                id          TEXT PRIMARY KEY,
                score       INTEGER NOT NULL DEFAULT 0 CHECK (score IN (-1, 0, 1)),
                object_uuid TEXT NOT NULL,
                object_type TEXT NOT NULL CHECK (object_type IN ('post', 'comment')),
                user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                UNIQUE(user_id, object_uuid)
            );

            CREATE INDEX idx_karma_object ON karma(object_uuid);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
