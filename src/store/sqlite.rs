use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use rusqlite_migration::{Migrations, M};
use uuid::Uuid;

use crate::app::{GatorError, Result};
use crate::domain::{Feed, FeedFollow, FeedWithOwner, Post, PostWithFeed, User};
use crate::store::{FeedCatalog, PostStore, UserStore};

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

/// Oldest fetch first, never-fetched feeds ahead of all others.
const SELECT_NEXT_FEED: &str = "SELECT id, name, url, user_id, created_at, updated_at, last_fetched_at
     FROM feeds
     ORDER BY last_fetched_at ASC NULLS FIRST, created_at ASC, rowid ASC
     LIMIT 1";

const MARK_FETCHED: &str = "UPDATE feeds SET last_fetched_at = ?1, updated_at = ?1 WHERE id = ?2";

fn migrations() -> Migrations<'static> {
    Migrations::new(vec![M::up(include_str!(
        "../../migrations/001-initial/up.sql"
    ))])
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_connection(Connection::open(path)?)
    }

    pub fn in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(mut conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", true)?;
        migrations().to_latest(&mut conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| GatorError::Other(format!("Database lock poisoned: {}", e)))
    }
}

#[cfg(test)]
impl SqliteStore {
    fn get_feed(&self, id: Uuid) -> Result<Option<Feed>> {
        let conn = self.conn()?;
        let feed = conn
            .query_row(
                "SELECT id, name, url, user_id, created_at, updated_at, last_fetched_at
                 FROM feeds WHERE id = ?1",
                params![id],
                feed_from_row,
            )
            .optional()?;
        Ok(feed)
    }

    fn posts_for_feed(&self, feed_id: Uuid) -> Result<Vec<Post>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, title, url, description, published_at, feed_id, created_at, updated_at
             FROM posts WHERE feed_id = ?1
             ORDER BY created_at, rowid",
        )?;

        let posts = stmt
            .query_map(params![feed_id], post_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(posts)
    }
}

/// Fixed-width UTC text, so lexical order in SQL equals time order.
fn to_sql_time(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn time_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_time(&raw, idx)
}

fn optional_time_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| parse_time(&s, idx)).transpose()
}

fn parse_time(raw: &str, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Map SQLite's unique-constraint result code to [`GatorError::UniqueViolation`].
fn unique_violation(err: rusqlite::Error, key: &str) -> GatorError {
    if let rusqlite::Error::SqliteFailure(ref e, _) = err {
        if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE {
            return GatorError::UniqueViolation(key.to_string());
        }
    }
    GatorError::Database(err)
}

fn feed_from_row(row: &Row<'_>) -> rusqlite::Result<Feed> {
    Ok(Feed {
        id: row.get(0)?,
        name: row.get(1)?,
        url: row.get(2)?,
        user_id: row.get(3)?,
        created_at: time_column(row, 4)?,
        updated_at: time_column(row, 5)?,
        last_fetched_at: optional_time_column(row, 6)?,
    })
}

fn post_from_row(row: &Row<'_>) -> rusqlite::Result<Post> {
    Ok(Post {
        id: row.get(0)?,
        title: row.get(1)?,
        url: row.get(2)?,
        description: row.get(3)?,
        published_at: optional_time_column(row, 4)?,
        feed_id: row.get(5)?,
        created_at: time_column(row, 6)?,
        updated_at: time_column(row, 7)?,
    })
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        name: row.get(1)?,
        created_at: time_column(row, 2)?,
        updated_at: time_column(row, 3)?,
    })
}

impl FeedCatalog for SqliteStore {
    fn add_feed(&self, feed: &Feed) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO feeds (id, name, url, user_id, created_at, updated_at, last_fetched_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                feed.id,
                feed.name,
                feed.url,
                feed.user_id,
                to_sql_time(&feed.created_at),
                to_sql_time(&feed.updated_at),
                feed.last_fetched_at.as_ref().map(to_sql_time),
            ],
        )
        .map_err(|e| unique_violation(e, &feed.url))?;
        Ok(())
    }

    fn get_feed_by_url(&self, url: &str) -> Result<Option<Feed>> {
        let conn = self.conn()?;
        let feed = conn
            .query_row(
                "SELECT id, name, url, user_id, created_at, updated_at, last_fetched_at
                 FROM feeds WHERE url = ?1",
                params![url],
                feed_from_row,
            )
            .optional()?;
        Ok(feed)
    }

    fn list_feeds(&self) -> Result<Vec<FeedWithOwner>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT f.id, f.name, f.url, f.user_id, f.created_at, f.updated_at, f.last_fetched_at,
                    u.name
             FROM feeds f
             JOIN users u ON u.id = f.user_id
             ORDER BY f.created_at, f.rowid",
        )?;

        let feeds = stmt
            .query_map([], |row| {
                Ok(FeedWithOwner {
                    feed: feed_from_row(row)?,
                    owner_name: row.get(7)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(feeds)
    }

    fn next_feed_to_fetch(&self) -> Result<Option<Feed>> {
        let conn = self.conn()?;
        let feed = conn
            .query_row(SELECT_NEXT_FEED, [], feed_from_row)
            .optional()?;
        Ok(feed)
    }

    fn mark_fetched(&self, feed_id: Uuid, at: DateTime<Utc>) -> Result<()> {
        let conn = self.conn()?;
        let updated = conn.execute(MARK_FETCHED, params![to_sql_time(&at), feed_id])?;
        if updated == 0 {
            return Err(GatorError::FeedNotFound(feed_id.to_string()));
        }
        Ok(())
    }

    fn claim_next_feed(&self, at: DateTime<Utc>) -> Result<Option<Feed>> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let feed = tx
            .query_row(SELECT_NEXT_FEED, [], feed_from_row)
            .optional()?;

        let Some(mut feed) = feed else {
            return Ok(None);
        };

        tx.execute(MARK_FETCHED, params![to_sql_time(&at), feed.id])?;
        tx.commit()?;

        feed.last_fetched_at = Some(at);
        feed.updated_at = at;
        Ok(Some(feed))
    }
}

impl PostStore for SqliteStore {
    fn insert_post(&self, post: &Post) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO posts (id, title, url, description, published_at, feed_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                post.id,
                post.title,
                post.url,
                post.description,
                post.published_at.as_ref().map(to_sql_time),
                post.feed_id,
                to_sql_time(&post.created_at),
                to_sql_time(&post.updated_at),
            ],
        )
        .map_err(|e| unique_violation(e, &post.url))?;
        Ok(())
    }

    fn get_post_by_url(&self, url: &str) -> Result<Option<Post>> {
        let conn = self.conn()?;
        let post = conn
            .query_row(
                "SELECT id, title, url, description, published_at, feed_id, created_at, updated_at
                 FROM posts WHERE url = ?1",
                params![url],
                post_from_row,
            )
            .optional()?;
        Ok(post)
    }

    fn posts_for_user(&self, user_id: Uuid, limit: usize) -> Result<Vec<PostWithFeed>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT p.id, p.title, p.url, p.description, p.published_at, p.feed_id,
                    p.created_at, p.updated_at, f.name
             FROM posts p
             JOIN feeds f ON f.id = p.feed_id
             JOIN feed_follows ff ON ff.feed_id = p.feed_id
             WHERE ff.user_id = ?1
             ORDER BY p.published_at DESC NULLS LAST, p.created_at DESC
             LIMIT ?2",
        )?;

        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let posts = stmt
            .query_map(params![user_id, limit], |row| {
                Ok(PostWithFeed {
                    post: post_from_row(row)?,
                    feed_name: row.get(8)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(posts)
    }

    fn count_posts(&self) -> Result<usize> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM posts", [], |row| row.get(0))?;
        Ok(count.max(0) as usize)
    }
}

impl UserStore for SqliteStore {
    fn create_user(&self, user: &User) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO users (id, name, created_at, updated_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                user.id,
                user.name,
                to_sql_time(&user.created_at),
                to_sql_time(&user.updated_at),
            ],
        )
        .map_err(|e| unique_violation(e, &user.name))?;
        Ok(())
    }

    fn get_user_by_name(&self, name: &str) -> Result<Option<User>> {
        let conn = self.conn()?;
        let user = conn
            .query_row(
                "SELECT id, name, created_at, updated_at FROM users WHERE name = ?1",
                params![name],
                user_from_row,
            )
            .optional()?;
        Ok(user)
    }

    fn list_users(&self) -> Result<Vec<User>> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare("SELECT id, name, created_at, updated_at FROM users ORDER BY name")?;

        let users = stmt
            .query_map([], user_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(users)
    }

    fn delete_all_users(&self) -> Result<usize> {
        let conn = self.conn()?;
        Ok(conn.execute("DELETE FROM users", [])?)
    }

    fn create_follow(&self, follow: &FeedFollow) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO feed_follows (id, user_id, feed_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                follow.id,
                follow.user_id,
                follow.feed_id,
                to_sql_time(&follow.created_at),
                to_sql_time(&follow.updated_at),
            ],
        )
        .map_err(|e| unique_violation(e, &follow.feed_id.to_string()))?;
        Ok(())
    }

    fn followed_feeds(&self, user_id: Uuid) -> Result<Vec<Feed>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT f.id, f.name, f.url, f.user_id, f.created_at, f.updated_at, f.last_fetched_at
             FROM feeds f
             JOIN feed_follows ff ON ff.feed_id = f.id
             WHERE ff.user_id = ?1
             ORDER BY f.name, f.url",
        )?;

        let feeds = stmt
            .query_map(params![user_id], feed_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(feeds)
    }

    fn delete_follow(&self, user_id: Uuid, feed_url: &str) -> Result<bool> {
        let conn = self.conn()?;
        let deleted = conn.execute(
            "DELETE FROM feed_follows
             WHERE user_id = ?1 AND feed_id = (SELECT id FROM feeds WHERE url = ?2)",
            params![user_id, feed_url],
        )?;
        Ok(deleted > 0)
    }
}
