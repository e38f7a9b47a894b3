use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single ingested item. `url` is unique across all feeds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: Uuid,
    pub title: String,
    pub url: String,
    pub description: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub feed_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Post {
    pub fn new(feed_id: Uuid, title: impl Into<String>, url: impl Into<String>) -> Self {
        let now = super::now();
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            url: url.into(),
            description: None,
            published_at: None,
            feed_id,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn display_title(&self) -> &str {
        if self.title.is_empty() {
            "(Untitled)"
        } else {
            &self.title
        }
    }

    /// Description cut to at most `max_chars` characters, with a trailing ellipsis when cut.
    pub fn description_preview(&self, max_chars: usize) -> Option<String> {
        let desc = self.description.as_deref()?;
        if desc.chars().count() <= max_chars {
            return Some(desc.to_string());
        }
        let cut: String = desc.chars().take(max_chars).collect();
        Some(format!("{}...", cut))
    }
}

/// A post joined with the name of its feed, as shown by `browse`.
#[derive(Debug, Clone, Serialize)]
pub struct PostWithFeed {
    pub post: Post,
    pub feed_name: String,
}
