pub mod feed;
pub mod post;
pub mod user;

pub use feed::{Feed, FeedFollow, FeedWithOwner};
pub use post::{Post, PostWithFeed};
pub use user::User;

use chrono::{DateTime, SubsecRound, Utc};

/// The current time at the precision the store keeps (microseconds).
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}
