/// Row decoding: maps SQLite rows onto marquee-types models.
/// Ids are stored as hyphenated UUID text, timestamps as RFC 3339 text with
/// millisecond precision so feed ordering does not collapse onto whole seconds.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use rusqlite::Row;
use rusqlite::types::Type;
use uuid::Uuid;

use marquee_types::BaseKind;
use marquee_types::models::{
    AuthoredContent, CommentRecord, ContentBody, ContentItem, ContentStatus, Counters, LikeRecord,
    Profile, Repost,
};
use marquee_types::namespace::Namespace;

/// Kind-specific text columns of each content table.
pub fn body_columns(kind: BaseKind) -> (&'static str, &'static str) {
    match kind {
        BaseKind::Scene => ("title", "description"),
        BaseKind::Monologue => ("title", "content"),
        BaseKind::Character => ("name", "description"),
        BaseKind::Frame => ("image_url", "caption"),
    }
}

pub fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn conversion_failure<E>(idx: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

pub fn uuid_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Uuid> {
    let raw: String = row.get(idx)?;
    raw.parse().map_err(|e| conversion_failure(idx, e))
}

pub fn time_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            // Rows written by SQLite's datetime('now') carry no timezone.
            NaiveDateTime::parse_from_str(&raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .map_err(|e| conversion_failure(idx, e))
}

fn count_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<u64> {
    Ok(row.get::<_, i64>(idx)?.max(0) as u64)
}

fn status_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<ContentStatus> {
    let raw: String = row.get(idx)?;
    match raw.as_str() {
        "draft" => Ok(ContentStatus::Draft),
        "published" => Ok(ContentStatus::Published),
        other => Err(rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Text,
            format!("unknown content status {other:?}").into(),
        )),
    }
}

/// Column list matching [`authored_content`]. Expects the content table
/// aliased `c` and `profiles` LEFT JOINed as `p`.
pub fn content_select(kind: BaseKind) -> String {
    let (first, second) = body_columns(kind);
    format!(
        "c.id, c.owner_id, c.{first}, c.{second}, c.status, c.like_count, c.comment_count,
         c.share_count, c.repost_count, c.view_count, c.created_at,
         p.username, p.display_name, p.avatar_url"
    )
}

pub fn authored_content(kind: BaseKind, row: &Row<'_>) -> rusqlite::Result<AuthoredContent> {
    let owner_id = uuid_at(row, 1)?;
    let item = ContentItem {
        id: uuid_at(row, 0)?,
        owner_id,
        body: ContentBody::from_fields(kind, row.get(2)?, row.get(3)?),
        status: status_at(row, 4)?,
        counters: Counters {
            like_count: count_at(row, 5)?,
            comment_count: count_at(row, 6)?,
            share_count: count_at(row, 7)?,
            repost_count: count_at(row, 8)?,
            view_count: count_at(row, 9)?,
        },
        created_at: time_at(row, 10)?,
    };

    let author = match row.get::<_, Option<String>>(11)? {
        Some(username) => Profile {
            user_id: owner_id,
            username,
            display_name: row.get(12)?,
            avatar_url: row.get(13)?,
        },
        None => Profile::unknown(owner_id),
    };

    Ok(AuthoredContent { item, author })
}

/// Column list matching [`repost`].
pub fn repost_select(kind: BaseKind) -> String {
    let content_column = kind.content_id_column();
    format!("id, user_id, {content_column}, like_count, comment_count, share_count, created_at")
}

pub fn repost(kind: BaseKind, row: &Row<'_>) -> rusqlite::Result<Repost> {
    Ok(Repost {
        id: uuid_at(row, 0)?,
        base: kind,
        user_id: uuid_at(row, 1)?,
        content_id: uuid_at(row, 2)?,
        counters: Counters {
            like_count: count_at(row, 3)?,
            comment_count: count_at(row, 4)?,
            share_count: count_at(row, 5)?,
            ..Counters::default()
        },
        created_at: time_at(row, 6)?,
    })
}

pub fn like(namespace: Namespace, row: &Row<'_>) -> rusqlite::Result<LikeRecord> {
    Ok(LikeRecord {
        id: uuid_at(row, 0)?,
        user_id: uuid_at(row, 1)?,
        namespace,
        created_at: time_at(row, 2)?,
    })
}

pub fn comment(namespace: Namespace, row: &Row<'_>) -> rusqlite::Result<CommentRecord> {
    Ok(CommentRecord {
        id: uuid_at(row, 0)?,
        user_id: uuid_at(row, 1)?,
        namespace,
        text: row.get(2)?,
        created_at: time_at(row, 3)?,
    })
}

pub fn profile(row: &Row<'_>) -> rusqlite::Result<Profile> {
    Ok(Profile {
        user_id: uuid_at(row, 0)?,
        username: row.get(1)?,
        display_name: row.get(2)?,
        avatar_url: row.get(3)?,
    })
}
