use std::collections::{HashMap, HashSet};

use anyhow::{Result, bail};
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};
use uuid::Uuid;

use marquee_types::events::{NotificationEvent, NotificationKind};
use marquee_types::models::{
    AuthoredContent, CommentRecord, ContentItem, ContentStatus, Counters, LikeRecord, Profile,
    Repost, ShareRecord,
};
use marquee_types::{BaseKind, ContentKind, Counter, Interaction, Namespace};

use crate::Database;
use crate::models::{self, body_columns, timestamp};

/// A notification as stored for its recipient.
#[derive(Debug, Clone)]
pub struct StoredNotification {
    pub id: Uuid,
    pub event: NotificationEvent,
    pub created_at: chrono::DateTime<Utc>,
    pub read: bool,
}

impl Database {
    // -- Profiles --

    pub fn upsert_profile(&self, profile: &Profile) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO profiles (id, username, display_name, avatar_url, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(id) DO UPDATE SET
                    username = excluded.username,
                    display_name = excluded.display_name,
                    avatar_url = excluded.avatar_url",
                params![
                    profile.user_id.to_string(),
                    profile.username,
                    profile.display_name,
                    profile.avatar_url,
                    timestamp(Utc::now()),
                ],
            )?;
            Ok(())
        })
    }

    // -- Content --

    /// Stores a content item as given, counters included.
    pub fn insert_content(&self, item: &ContentItem) -> Result<()> {
        let kind = item.kind();
        let table = kind.content_table();
        let (first, second) = body_columns(kind);
        let (first_value, second_value) = item.body.fields();
        let c = item.counters;

        self.with_conn(|conn| {
            conn.execute(
                &format!(
                    "INSERT INTO {table} (id, owner_id, {first}, {second}, status, like_count,
                        comment_count, share_count, repost_count, view_count, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"
                ),
                params![
                    item.id.to_string(),
                    item.owner_id.to_string(),
                    first_value,
                    second_value,
                    item.status.as_str(),
                    c.like_count as i64,
                    c.comment_count as i64,
                    c.share_count as i64,
                    c.repost_count as i64,
                    c.view_count as i64,
                    timestamp(item.created_at),
                ],
            )?;
            Ok(())
        })
    }

    // -- Notifications --

    pub fn insert_notification(&self, event: &NotificationEvent) -> Result<Uuid> {
        let id = Uuid::new_v4();
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO notifications (id, kind, actor_id, owner_id, content_id, content_kind, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    id.to_string(),
                    event.kind.as_str(),
                    event.actor_id.to_string(),
                    event.owner_id.to_string(),
                    event.content_id.to_string(),
                    event.content_kind.as_str(),
                    timestamp(Utc::now()),
                ],
            )?;
            Ok(id)
        })
    }

    /// Newest first.
    pub fn notifications_for(&self, owner_id: Uuid, limit: u32) -> Result<Vec<StoredNotification>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, kind, actor_id, owner_id, content_id, content_kind, created_at, read_at
                 FROM notifications
                 WHERE owner_id = ?1
                 ORDER BY created_at DESC
                 LIMIT ?2",
            )?;

            let rows = stmt
                .query_map(params![owner_id.to_string(), limit], |row| {
                    let kind = match row.get::<_, String>(1)?.as_str() {
                        "like" => NotificationKind::Like,
                        _ => NotificationKind::Comment,
                    };
                    let content_kind: String = row.get(5)?;
                    let content_kind = content_kind.parse::<ContentKind>().map_err(|e| {
                        rusqlite::Error::FromSqlConversionFailure(
                            5,
                            rusqlite::types::Type::Text,
                            Box::new(e),
                        )
                    })?;
                    Ok(StoredNotification {
                        id: models::uuid_at(row, 0)?,
                        event: NotificationEvent {
                            kind,
                            actor_id: models::uuid_at(row, 2)?,
                            owner_id: models::uuid_at(row, 3)?,
                            content_id: models::uuid_at(row, 4)?,
                            content_kind,
                        },
                        created_at: models::time_at(row, 6)?,
                        read: row.get::<_, Option<String>>(7)?.is_some(),
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    pub fn mark_notifications_read(&self, owner_id: Uuid) -> Result<usize> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE notifications SET read_at = ?1 WHERE owner_id = ?2 AND read_at IS NULL",
                params![timestamp(Utc::now()), owner_id.to_string()],
            )?;
            Ok(changed)
        })
    }
}

// -- Query helpers used by the Store implementation --

fn placeholders(first: usize, count: usize) -> String {
    (first..first + count)
        .map(|i| format!("?{}", i))
        .collect::<Vec<_>>()
        .join(", ")
}

fn id_strings(ids: &[Uuid]) -> Vec<String> {
    ids.iter().map(Uuid::to_string).collect()
}

fn owner_column(kind: ContentKind) -> &'static str {
    if kind.is_repost() { "user_id" } else { "owner_id" }
}

pub(crate) fn owner_of(conn: &Connection, ns: Namespace) -> Result<Option<Uuid>> {
    let parent = ns.route().parent_table;
    let column = owner_column(ns.kind);
    let owner = conn
        .query_row(
            &format!("SELECT {column} FROM {parent} WHERE id = ?1"),
            [ns.id.to_string()],
            |row| models::uuid_at(row, 0),
        )
        .optional()?;
    Ok(owner)
}

pub(crate) fn counters(conn: &Connection, ns: Namespace) -> Result<Option<Counters>> {
    let parent = ns.route().parent_table;
    let extra = if ns.kind.is_repost() { "0, 0" } else { "repost_count, view_count" };
    let counters = conn
        .query_row(
            &format!(
                "SELECT like_count, comment_count, share_count, {extra} FROM {parent} WHERE id = ?1"
            ),
            [ns.id.to_string()],
            |row| {
                Ok(Counters {
                    like_count: row.get::<_, i64>(0)? as u64,
                    comment_count: row.get::<_, i64>(1)? as u64,
                    share_count: row.get::<_, i64>(2)? as u64,
                    repost_count: row.get::<_, i64>(3)? as u64,
                    view_count: row.get::<_, i64>(4)? as u64,
                })
            },
        )
        .optional()?;
    Ok(counters)
}

pub(crate) fn list_published(
    conn: &Connection,
    kind: BaseKind,
    limit: u32,
) -> Result<Vec<AuthoredContent>> {
    // JOIN profiles to fetch the author in the same query
    let sql = format!(
        "SELECT {columns}
         FROM {table} c
         LEFT JOIN profiles p ON p.id = c.owner_id
         WHERE c.status = 'published'
         ORDER BY c.created_at DESC
         LIMIT ?1",
        columns = models::content_select(kind),
        table = kind.content_table(),
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([limit], |row| models::authored_content(kind, row))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub(crate) fn get_contents(
    conn: &Connection,
    kind: BaseKind,
    ids: &[Uuid],
) -> Result<Vec<AuthoredContent>> {
    if ids.is_empty() {
        return Ok(vec![]);
    }

    let sql = format!(
        "SELECT {columns}
         FROM {table} c
         LEFT JOIN profiles p ON p.id = c.owner_id
         WHERE c.id IN ({placeholders})",
        columns = models::content_select(kind),
        table = kind.content_table(),
        placeholders = placeholders(1, ids.len()),
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(id_strings(ids)), |row| {
            models::authored_content(kind, row)
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub(crate) fn delete_content(conn: &Connection, kind: BaseKind, id: Uuid) -> Result<bool> {
    let table = kind.content_table();
    let deleted = conn.execute(&format!("DELETE FROM {table} WHERE id = ?1"), [id.to_string()])?;
    Ok(deleted == 1)
}

pub(crate) fn profiles(conn: &Connection, user_ids: &[Uuid]) -> Result<HashMap<Uuid, Profile>> {
    if user_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let sql = format!(
        "SELECT id, username, display_name, avatar_url FROM profiles WHERE id IN ({})",
        placeholders(1, user_ids.len())
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(id_strings(user_ids)), models::profile)?
        .map(|r| r.map(|p| (p.user_id, p)))
        .collect::<std::result::Result<HashMap<_, _>, _>>()?;
    Ok(rows)
}

// -- Likes --

pub(crate) fn find_like(conn: &Connection, ns: Namespace, user_id: Uuid) -> Result<Option<LikeRecord>> {
    let route = ns.route();
    let like = conn
        .query_row(
            &format!(
                "SELECT id, user_id, created_at FROM {} WHERE {} = ?1 AND user_id = ?2",
                route.likes_table, route.id_column
            ),
            params![ns.id.to_string(), user_id.to_string()],
            |row| models::like(ns, row),
        )
        .optional()?;
    Ok(like)
}

pub(crate) fn insert_like(conn: &Connection, like: &LikeRecord) -> Result<()> {
    let route = like.namespace.route();
    conn.execute(
        &format!(
            "INSERT INTO {} (id, {}, user_id, created_at) VALUES (?1, ?2, ?3, ?4)",
            route.likes_table, route.id_column
        ),
        params![
            like.id.to_string(),
            like.namespace.id.to_string(),
            like.user_id.to_string(),
            timestamp(like.created_at),
        ],
    )?;
    Ok(())
}

pub(crate) fn liked_ids(
    conn: &Connection,
    kind: ContentKind,
    user_id: Uuid,
    ids: &[Uuid],
) -> Result<HashSet<Uuid>> {
    if ids.is_empty() {
        return Ok(HashSet::new());
    }

    let route = kind.route();
    let sql = format!(
        "SELECT {id_column} FROM {likes} WHERE user_id = ?1 AND {id_column} IN ({placeholders})",
        id_column = route.id_column,
        likes = route.likes_table,
        placeholders = placeholders(2, ids.len()),
    );

    let mut values = vec![user_id.to_string()];
    values.extend(id_strings(ids));

    let mut stmt = conn.prepare(&sql)?;
    let liked = stmt
        .query_map(params_from_iter(values), |row| models::uuid_at(row, 0))?
        .collect::<std::result::Result<HashSet<_>, _>>()?;
    Ok(liked)
}

// -- Comments --

pub(crate) fn insert_comment(conn: &Connection, comment: &CommentRecord) -> Result<()> {
    let route = comment.namespace.route();
    conn.execute(
        &format!(
            "INSERT INTO {} (id, {}, user_id, text, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            route.comments_table, route.id_column
        ),
        params![
            comment.id.to_string(),
            comment.namespace.id.to_string(),
            comment.user_id.to_string(),
            comment.text,
            timestamp(comment.created_at),
        ],
    )?;
    Ok(())
}

pub(crate) fn get_comment(
    conn: &Connection,
    ns: Namespace,
    comment_id: Uuid,
) -> Result<Option<CommentRecord>> {
    let route = ns.route();
    let comment = conn
        .query_row(
            &format!(
                "SELECT id, user_id, text, created_at FROM {} WHERE id = ?1 AND {} = ?2",
                route.comments_table, route.id_column
            ),
            params![comment_id.to_string(), ns.id.to_string()],
            |row| models::comment(ns, row),
        )
        .optional()?;
    Ok(comment)
}

pub(crate) fn list_comments(conn: &Connection, ns: Namespace) -> Result<Vec<CommentRecord>> {
    let route = ns.route();
    let mut stmt = conn.prepare(&format!(
        "SELECT id, user_id, text, created_at FROM {} WHERE {} = ?1 ORDER BY created_at ASC, rowid ASC",
        route.comments_table, route.id_column
    ))?;
    let rows = stmt
        .query_map([ns.id.to_string()], |row| models::comment(ns, row))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

// -- Shares --

pub(crate) fn insert_share(conn: &Connection, share: &ShareRecord) -> Result<()> {
    let route = share.namespace.route();
    conn.execute(
        &format!(
            "INSERT INTO {} (id, {}, user_id, created_at) VALUES (?1, ?2, ?3, ?4)",
            route.shares_table, route.id_column
        ),
        params![
            share.id.to_string(),
            share.namespace.id.to_string(),
            share.user_id.to_string(),
            timestamp(share.created_at),
        ],
    )?;
    Ok(())
}

// -- Interaction rows and counters --

/// Deletes one row of an interaction table scoped to the namespace.
pub(crate) fn delete_interaction(
    conn: &Connection,
    ns: Namespace,
    interaction: Interaction,
    row_id: Uuid,
) -> Result<bool> {
    let route = ns.route();
    let deleted = conn.execute(
        &format!(
            "DELETE FROM {} WHERE id = ?1 AND {} = ?2",
            route.table(interaction),
            route.id_column
        ),
        params![row_id.to_string(), ns.id.to_string()],
    )?;
    Ok(deleted == 1)
}

pub(crate) fn count_rows(conn: &Connection, ns: Namespace, interaction: Interaction) -> Result<u64> {
    let route = ns.route();
    let count: i64 = conn.query_row(
        &format!(
            "SELECT COUNT(*) FROM {} WHERE {} = ?1",
            route.table(interaction),
            route.id_column
        ),
        [ns.id.to_string()],
        |row| row.get(0),
    )?;
    Ok(count as u64)
}

fn counter_column(ns: Namespace, counter: Counter) -> Result<&'static str> {
    if !counter.applies_to(ns.kind) {
        bail!("{} rows have no {} column", ns.kind, counter.column());
    }
    Ok(counter.column())
}

/// Single-statement counter update; `delta` is +1 or -1, never below zero.
pub(crate) fn adjust_count(conn: &Connection, ns: Namespace, counter: Counter, delta: i64) -> Result<u64> {
    let parent = ns.route().parent_table;
    let column = counter_column(ns, counter)?;

    let value: Option<i64> = conn
        .query_row(
            &format!(
                "UPDATE {parent} SET {column} = MAX({column} + ?1, 0) WHERE id = ?2 RETURNING {column}"
            ),
            params![delta, ns.id.to_string()],
            |row| row.get(0),
        )
        .optional()?;

    match value {
        Some(value) => Ok(value as u64),
        None => bail!("{} row {} not found", parent, ns.id),
    }
}

pub(crate) fn set_count(conn: &Connection, ns: Namespace, counter: Counter, value: u64) -> Result<()> {
    let parent = ns.route().parent_table;
    let column = counter_column(ns, counter)?;
    let changed = conn.execute(
        &format!("UPDATE {parent} SET {column} = ?1 WHERE id = ?2"),
        params![value as i64, ns.id.to_string()],
    )?;
    if changed == 0 {
        bail!("{} row {} not found", parent, ns.id);
    }
    Ok(())
}

// -- Reposts --

pub(crate) fn find_repost(
    conn: &Connection,
    kind: BaseKind,
    user_id: Uuid,
    content_id: Uuid,
) -> Result<Option<Repost>> {
    let repost = conn
        .query_row(
            &format!(
                "SELECT {columns} FROM {table} WHERE user_id = ?1 AND {content_column} = ?2",
                columns = models::repost_select(kind),
                table = kind.reposts_table(),
                content_column = kind.content_id_column(),
            ),
            params![user_id.to_string(), content_id.to_string()],
            |row| models::repost(kind, row),
        )
        .optional()?;
    Ok(repost)
}

pub(crate) fn get_repost(conn: &Connection, kind: BaseKind, repost_id: Uuid) -> Result<Option<Repost>> {
    let repost = conn
        .query_row(
            &format!(
                "SELECT {} FROM {} WHERE id = ?1",
                models::repost_select(kind),
                kind.reposts_table()
            ),
            [repost_id.to_string()],
            |row| models::repost(kind, row),
        )
        .optional()?;
    Ok(repost)
}

pub(crate) fn insert_repost(conn: &Connection, repost: &Repost) -> Result<()> {
    let kind = repost.base;
    conn.execute(
        &format!(
            "INSERT INTO {} (id, user_id, {}, created_at) VALUES (?1, ?2, ?3, ?4)",
            kind.reposts_table(),
            kind.content_id_column()
        ),
        params![
            repost.id.to_string(),
            repost.user_id.to_string(),
            repost.content_id.to_string(),
            timestamp(repost.created_at),
        ],
    )?;
    Ok(())
}

pub(crate) fn delete_repost(conn: &Connection, kind: BaseKind, repost_id: Uuid) -> Result<bool> {
    // Likes, comments and shares of the repost go with it (ON DELETE CASCADE)
    let deleted = conn.execute(
        &format!("DELETE FROM {} WHERE id = ?1", kind.reposts_table()),
        [repost_id.to_string()],
    )?;
    Ok(deleted == 1)
}

pub(crate) fn list_reposts(conn: &Connection, kind: BaseKind, limit: u32) -> Result<Vec<Repost>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM {} ORDER BY created_at DESC LIMIT ?1",
        models::repost_select(kind),
        kind.reposts_table()
    ))?;
    let rows = stmt
        .query_map([limit], |row| models::repost(kind, row))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub(crate) fn reposted_ids(
    conn: &Connection,
    kind: BaseKind,
    user_id: Uuid,
    content_ids: &[Uuid],
) -> Result<HashSet<Uuid>> {
    if content_ids.is_empty() {
        return Ok(HashSet::new());
    }

    let sql = format!(
        "SELECT {content_column} FROM {table} WHERE user_id = ?1 AND {content_column} IN ({placeholders})",
        content_column = kind.content_id_column(),
        table = kind.reposts_table(),
        placeholders = placeholders(2, content_ids.len()),
    );

    let mut values = vec![user_id.to_string()];
    values.extend(id_strings(content_ids));

    let mut stmt = conn.prepare(&sql)?;
    let reposted = stmt
        .query_map(params_from_iter(values), |row| models::uuid_at(row, 0))?
        .collect::<std::result::Result<HashSet<_>, _>>()?;
    Ok(reposted)
}

pub(crate) fn count_reposts(conn: &Connection, kind: BaseKind, content_id: Uuid) -> Result<u64> {
    let count: i64 = conn.query_row(
        &format!(
            "SELECT COUNT(*) FROM {} WHERE {} = ?1",
            kind.reposts_table(),
            kind.content_id_column()
        ),
        [content_id.to_string()],
        |row| row.get(0),
    )?;
    Ok(count as u64)
}
