//! Persisting parsed feed items as posts.

use std::sync::Arc;

use uuid::Uuid;

use crate::app::{GatorError, Result};
use crate::domain::Post;
use crate::parser::FeedItem;
use crate::store::PostStore;
use crate::timestamp;

#[derive(Debug, Clone, PartialEq)]
pub enum IngestOutcome {
    Stored(Post),
    /// A post with this URL exists already; nothing was written.
    AlreadyKnown,
    /// The item has no link to deduplicate on.
    Skipped,
}

pub struct IngestionSink<S> {
    store: Arc<S>,
}

impl<S: PostStore> IngestionSink<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn ingest(&self, item: &FeedItem, feed_id: Uuid) -> Result<IngestOutcome> {
        if item.link.is_empty() {
            tracing::debug!(title = %item.title, "Item has no link, skipping");
            return Ok(IngestOutcome::Skipped);
        }

        let mut post = Post::new(feed_id, item.title.clone(), item.link.clone());
        post.description = Some(item.description.clone()).filter(|d| !d.is_empty());
        post.published_at = match item.published.as_deref().map(timestamp::normalize) {
            Some(Ok(at)) => Some(at),
            Some(Err(e)) => {
                tracing::warn!(url = %item.link, error = %e, "Storing post without a timestamp");
                None
            }
            None => None,
        };

        match self.store.insert_post(&post) {
            Ok(()) => Ok(IngestOutcome::Stored(post)),
            Err(GatorError::UniqueViolation(_)) => Ok(IngestOutcome::AlreadyKnown),
            Err(e) => Err(e),
        }
    }
}
