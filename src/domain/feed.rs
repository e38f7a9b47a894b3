use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feed {
    pub id: Uuid,
    pub name: String,
    pub url: String,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Set by the scheduler when it claims the feed, before the network call.
    pub last_fetched_at: Option<DateTime<Utc>>,
}

impl Feed {
    pub fn new(name: impl Into<String>, url: impl Into<String>, user_id: Uuid) -> Self {
        let now = super::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            url: url.into(),
            user_id,
            created_at: now,
            updated_at: now,
            last_fetched_at: None,
        }
    }

    pub fn display_title(&self) -> &str {
        if self.name.is_empty() {
            &self.url
        } else {
            &self.name
        }
    }
}

/// A feed row joined with the name of the user who registered it.
#[derive(Debug, Clone, Serialize)]
pub struct FeedWithOwner {
    pub feed: Feed,
    pub owner_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedFollow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub feed_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FeedFollow {
    pub fn new(user_id: Uuid, feed_id: Uuid) -> Self {
        let now = super::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            feed_id,
            created_at: now,
            updated_at: now,
        }
    }
}
