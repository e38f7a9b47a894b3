use std::time::Duration;

use url::Url;

use crate::app::{AppContext, GatorError, Result, Shutdown};
use crate::domain::{Feed, FeedFollow, PostWithFeed, User};
use crate::scheduler::{format_interval, parse_interval, CycleError, CycleReport};
use crate::store::{FeedCatalog, PostStore, UserStore};
use crate::timestamp::Layout;

/// Resolve the logged-in user from the configuration.
///
/// Commands that act on behalf of a user call this first and pass the result on.
pub fn current_user(ctx: &AppContext) -> Result<User> {
    let name = ctx
        .config
        .current_user_name
        .as_deref()
        .ok_or(GatorError::NotLoggedIn)?;

    ctx.store
        .get_user_by_name(name)?
        .ok_or_else(|| GatorError::UserNotFound(name.to_string()))
}

fn required(value: &str, what: &str) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(GatorError::Other(format!("{} must not be empty", what)));
    }
    Ok(value.to_string())
}

pub fn register(ctx: &mut AppContext, name: &str) -> Result<User> {
    let user = User::new(required(name, "User name")?);

    ctx.store.create_user(&user).map_err(|e| match e {
        GatorError::UniqueViolation(name) => GatorError::UserExists(name),
        other => other,
    })?;
    ctx.config
        .set_current_user(Some(&user.name), &ctx.config_path)?;

    tracing::info!(user = %user.name, id = %user.id, "User registered");
    println!("User created: {}", user.name);
    Ok(user)
}

pub fn login(ctx: &mut AppContext, name: &str) -> Result<()> {
    let user = ctx
        .store
        .get_user_by_name(name.trim())?
        .ok_or_else(|| GatorError::UserNotFound(name.trim().to_string()))?;

    ctx.config
        .set_current_user(Some(&user.name), &ctx.config_path)?;
    println!("Logged in as {}", user.name);
    Ok(())
}

pub fn list_users(ctx: &AppContext) -> Result<()> {
    let users = ctx.store.list_users()?;

    if users.is_empty() {
        println!("No users");
        return Ok(());
    }

    let current = ctx.config.current_user_name.as_deref();
    for user in users {
        if Some(user.name.as_str()) == current {
            println!("* {} (current)", user.name);
        } else {
            println!("* {}", user.name);
        }
    }

    Ok(())
}

pub fn reset(ctx: &mut AppContext) -> Result<()> {
    let deleted = ctx.store.delete_all_users()?;
    ctx.config.set_current_user(None, &ctx.config_path)?;

    tracing::info!(deleted, "Database reset");
    println!("Reset complete: {} users deleted", deleted);
    Ok(())
}

pub fn add_feed(ctx: &AppContext, user: &User, name: &str, url: &str) -> Result<Feed> {
    let name = required(name, "Feed name")?;
    let url = required(url, "Feed URL")?;

    let parsed = Url::parse(&url)?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(GatorError::Other(format!(
            "Unsupported URL scheme: {}",
            parsed.scheme()
        )));
    }

    let feed = Feed::new(name, url, user.id);
    ctx.store.add_feed(&feed).map_err(|e| match e {
        GatorError::UniqueViolation(url) => GatorError::Other(format!("Feed already exists: {}", url)),
        other => other,
    })?;
    ctx.store.create_follow(&FeedFollow::new(user.id, feed.id))?;

    tracing::info!(feed = %feed.url, user = %user.name, "Feed added");
    println!("Added feed: {}\n  {}", feed.display_title(), feed.url);
    Ok(feed)
}

pub fn list_feeds(ctx: &AppContext) -> Result<()> {
    let feeds = ctx.store.list_feeds()?;

    if feeds.is_empty() {
        println!("No feeds");
        return Ok(());
    }

    for entry in feeds {
        let last = entry
            .feed
            .last_fetched_at
            .map(|at| at.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "never".to_string());
        println!(
            "{} (added by {}, fetched {})\n  {}",
            entry.feed.display_title(),
            entry.owner_name,
            last,
            entry.feed.url
        );
    }

    Ok(())
}

pub fn follow(ctx: &AppContext, user: &User, url: &str) -> Result<FeedFollow> {
    let url = url.trim();
    let feed = ctx
        .store
        .get_feed_by_url(url)?
        .ok_or_else(|| GatorError::FeedNotFound(url.to_string()))?;

    let follow = FeedFollow::new(user.id, feed.id);
    ctx.store.create_follow(&follow).map_err(|e| match e {
        GatorError::UniqueViolation(_) => GatorError::AlreadyFollowing(url.to_string()),
        other => other,
    })?;

    println!("{} now follows {}", user.name, feed.display_title());
    Ok(follow)
}

pub fn following(ctx: &AppContext, user: &User) -> Result<()> {
    let feeds = ctx.store.followed_feeds(user.id)?;

    if feeds.is_empty() {
        println!("{} is not following any feeds", user.name);
        return Ok(());
    }

    for feed in feeds {
        println!("* {}\n  {}", feed.display_title(), feed.url);
    }
    Ok(())
}

pub fn unfollow(ctx: &AppContext, user: &User, url: &str) -> Result<()> {
    let url = url.trim();
    if ctx.store.get_feed_by_url(url)?.is_none() {
        return Err(GatorError::FeedNotFound(url.to_string()));
    }
    if !ctx.store.delete_follow(user.id, url)? {
        return Err(GatorError::Other(format!("Not following: {}", url)));
    }

    println!("{} unfollowed {}", user.name, url);
    Ok(())
}

pub fn browse(ctx: &AppContext, user: &User, limit: usize) -> Result<Vec<PostWithFeed>> {
    let posts = ctx.store.posts_for_user(user.id, limit)?;

    if posts.is_empty() {
        println!("No posts");
        return Ok(posts);
    }

    for entry in &posts {
        let post = &entry.post;
        let date = post
            .published_at
            .map(|at| Layout::Rfc1123.format(at))
            .unwrap_or_else(|| "unknown date".to_string());

        println!("{} ({})", post.display_title(), entry.feed_name);
        println!("  {}", date);
        if let Some(preview) = post.description_preview(200) {
            println!("  {}", preview);
        }
        println!("  {}", post.url);
    }

    Ok(posts)
}

/// Run a single ingestion cycle. `None` when there is no feed to fetch.
pub async fn scrape(ctx: &AppContext) -> Result<Option<CycleReport>> {
    match ctx.scheduler().run_one_cycle(&Shutdown::never()).await {
        Ok(report) => {
            println!(
                "{}: {} new, {} already known, {} skipped, {} failed",
                report.feed.display_title(),
                report.stored,
                report.already_known,
                report.skipped,
                report.failed
            );
            Ok(Some(report))
        }
        Err(CycleError::NoFeedAvailable) => {
            println!("No feeds to fetch");
            Ok(None)
        }
        Err(e) => Err(GatorError::Other(e.to_string())),
    }
}

/// Parse `interval` and run ingestion cycles until `shutdown` fires.
pub async fn aggregate(ctx: &AppContext, interval: &str, shutdown: Shutdown) -> Result<()> {
    let every: Duration = parse_interval(interval)?;

    println!("Collecting feeds every {}", format_interval(every));
    ctx.scheduler().run_forever(every, shutdown).await;
    Ok(())
}
