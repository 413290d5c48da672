use std::fmt::Write;

use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

use marquee_types::{BaseKind, ContentKind};

use crate::models::body_columns;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 =
        conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(&initial_schema())?;
    }

    info!("Database migrations complete");
    Ok(())
}

/// Builds the v1 schema from the namespace routing table so table and column
/// names cannot drift from what the queries resolve.
fn initial_schema() -> String {
    let mut sql = String::from(
        "
        CREATE TABLE profiles (
            id              TEXT PRIMARY KEY,
            username        TEXT NOT NULL UNIQUE,
            display_name    TEXT,
            avatar_url      TEXT,
            created_at      TEXT NOT NULL
        );

        CREATE TABLE notifications (
            id              TEXT PRIMARY KEY,
            kind            TEXT NOT NULL CHECK (kind IN ('like', 'comment')),
            actor_id        TEXT NOT NULL,
            owner_id        TEXT NOT NULL,
            content_id      TEXT NOT NULL,
            content_kind    TEXT NOT NULL,
            created_at      TEXT NOT NULL,
            read_at         TEXT
        );

        CREATE INDEX idx_notifications_owner
            ON notifications(owner_id, created_at);
        ",
    );

    for kind in BaseKind::ALL {
        let table = kind.content_table();
        let (first, second) = body_columns(kind);
        let _ = write!(
            sql,
            "
            CREATE TABLE {table} (
                id              TEXT PRIMARY KEY,
                owner_id        TEXT NOT NULL,
                {first}         TEXT NOT NULL,
                {second}        TEXT NOT NULL DEFAULT '',
                status          TEXT NOT NULL DEFAULT 'draft'
                                CHECK (status IN ('draft', 'published')),
                like_count      INTEGER NOT NULL DEFAULT 0 CHECK (like_count >= 0),
                comment_count   INTEGER NOT NULL DEFAULT 0 CHECK (comment_count >= 0),
                share_count     INTEGER NOT NULL DEFAULT 0 CHECK (share_count >= 0),
                repost_count    INTEGER NOT NULL DEFAULT 0 CHECK (repost_count >= 0),
                view_count      INTEGER NOT NULL DEFAULT 0 CHECK (view_count >= 0),
                created_at      TEXT NOT NULL
            );

            CREATE INDEX idx_{table}_published
                ON {table}(status, created_at);
            "
        );

        let reposts = kind.reposts_table();
        let content_column = kind.content_id_column();
        let _ = write!(
            sql,
            "
            CREATE TABLE {reposts} (
                id              TEXT PRIMARY KEY,
                user_id         TEXT NOT NULL,
                {content_column} TEXT NOT NULL REFERENCES {table}(id) ON DELETE CASCADE,
                like_count      INTEGER NOT NULL DEFAULT 0 CHECK (like_count >= 0),
                comment_count   INTEGER NOT NULL DEFAULT 0 CHECK (comment_count >= 0),
                share_count     INTEGER NOT NULL DEFAULT 0 CHECK (share_count >= 0),
                created_at      TEXT NOT NULL,
                UNIQUE(user_id, {content_column})
            );

            CREATE INDEX idx_{reposts}_created
                ON {reposts}(created_at);
            "
        );
    }

    for kind in ContentKind::ALL {
        let route = kind.route();
        let parent = route.parent_table;
        let id_column = route.id_column;
        let (likes, comments, shares) = (route.likes_table, route.comments_table, route.shares_table);
        let _ = write!(
            sql,
            "
            CREATE TABLE {likes} (
                id              TEXT PRIMARY KEY,
                {id_column}     TEXT NOT NULL REFERENCES {parent}(id) ON DELETE CASCADE,
                user_id         TEXT NOT NULL,
                created_at      TEXT NOT NULL,
                UNIQUE({id_column}, user_id)
            );

            CREATE TABLE {comments} (
                id              TEXT PRIMARY KEY,
                {id_column}     TEXT NOT NULL REFERENCES {parent}(id) ON DELETE CASCADE,
                user_id         TEXT NOT NULL,
                text            TEXT NOT NULL,
                created_at      TEXT NOT NULL
            );

            CREATE INDEX idx_{comments}_parent
                ON {comments}({id_column}, created_at);

            CREATE TABLE {shares} (
                id              TEXT PRIMARY KEY,
                {id_column}     TEXT NOT NULL REFERENCES {parent}(id) ON DELETE CASCADE,
                user_id         TEXT NOT NULL,
                created_at      TEXT NOT NULL
            );

            CREATE INDEX idx_{shares}_parent
                ON {shares}({id_column});
            "
        );
    }

    sql.push_str("INSERT INTO schema_version (version) VALUES (1);");
    sql
}
