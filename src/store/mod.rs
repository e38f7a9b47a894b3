pub mod sqlite;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::app::Result;
use crate::domain::{Feed, FeedFollow, FeedWithOwner, Post, PostWithFeed, User};

pub use sqlite::SqliteStore;

/// Feed registry plus the fetch bookkeeping the scheduler relies on.
pub trait FeedCatalog {
    fn add_feed(&self, feed: &Feed) -> Result<()>;
    fn get_feed_by_url(&self, url: &str) -> Result<Option<Feed>>;
    fn list_feeds(&self) -> Result<Vec<FeedWithOwner>>;

    /// The feed fetched longest ago; never-fetched feeds come first.
    fn next_feed_to_fetch(&self) -> Result<Option<Feed>>;

    /// Set `last_fetched_at` and `updated_at` to `at`.
    fn mark_fetched(&self, feed_id: Uuid, at: DateTime<Utc>) -> Result<()>;

    /// Select and mark in one step, returning the feed as marked.
    ///
    /// Implementations shared between workers must make this atomic.
    fn claim_next_feed(&self, at: DateTime<Utc>) -> Result<Option<Feed>> {
        let Some(mut feed) = self.next_feed_to_fetch()? else {
            return Ok(None);
        };
        self.mark_fetched(feed.id, at)?;
        feed.last_fetched_at = Some(at);
        feed.updated_at = at;
        Ok(Some(feed))
    }
}

pub trait PostStore {
    /// Fails with [`GatorError::UniqueViolation`](crate::app::GatorError::UniqueViolation)
    /// when a post with the same URL already exists.
    fn insert_post(&self, post: &Post) -> Result<()>;
    fn get_post_by_url(&self, url: &str) -> Result<Option<Post>>;
    fn posts_for_user(&self, user_id: Uuid, limit: usize) -> Result<Vec<PostWithFeed>>;
    fn count_posts(&self) -> Result<usize>;
}

pub trait UserStore {
    fn create_user(&self, user: &User) -> Result<()>;
    fn get_user_by_name(&self, name: &str) -> Result<Option<User>>;
    fn list_users(&self) -> Result<Vec<User>>;
    fn delete_all_users(&self) -> Result<usize>;

    fn create_follow(&self, follow: &FeedFollow) -> Result<()>;
    fn followed_feeds(&self, user_id: Uuid) -> Result<Vec<Feed>>;
    /// Returns whether a follow was removed.
    fn delete_follow(&self, user_id: Uuid, feed_url: &str) -> Result<bool>;
}
