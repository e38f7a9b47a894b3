use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Duration;

use gator::app::Shutdown;
use gator::domain::{self, Feed, User};
use gator::fetcher::{FetchError, Fetcher};
use gator::parser::FeedParser;
use gator::scheduler::{CycleError, FetchScheduler};
use gator::store::{FeedCatalog, PostStore, SqliteStore, UserStore};

/// Serves fixed bodies by URL and remembers the order of requests.
struct StubFetcher {
    bodies: HashMap<String, String>,
    requested: Mutex<Vec<String>>,
}

impl StubFetcher {
    fn new(bodies: &[(&str, String)]) -> Self {
        Self {
            bodies: bodies
                .iter()
                .map(|(url, body)| (url.to_string(), body.clone()))
                .collect(),
            requested: Mutex::new(Vec::new()),
        }
    }

    fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl Fetcher for StubFetcher {
    async fn fetch(&self, url: &str, _shutdown: &Shutdown) -> Result<Vec<u8>, FetchError> {
        self.requested.lock().unwrap().push(url.to_string());
        self.bodies
            .get(url)
            .map(|body| body.as_bytes().to_vec())
            .ok_or(FetchError::HttpStatus(404))
    }
}

fn rss(links: &[&str]) -> String {
    let items: String = links
        .iter()
        .map(|link| format!("<item><title>{0}</title><link>{0}</link></item>", link))
        .collect();
    format!(r#"<rss version="2.0"><channel><title>Test</title>{}</channel></rss>"#, items)
}

fn store_with_owner() -> (Arc<SqliteStore>, User) {
    let store = Arc::new(SqliteStore::in_memory().unwrap());
    let user = User::new("owner");
    store.create_user(&user).unwrap();
    (store, user)
}

#[tokio::test]
async fn test_never_fetched_first_and_duplicates_collapse() {
    const A: &str = "https://a.example/rss";
    const B: &str = "https://b.example/rss";

    let (store, user) = store_with_owner();
    let feed_a = Feed::new("A", A, user.id);
    let feed_b = Feed::new("B", B, user.id);
    store.add_feed(&feed_b).unwrap();
    store.add_feed(&feed_a).unwrap();
    store
        .mark_fetched(feed_b.id, domain::now() - Duration::hours(1))
        .unwrap();

    let fetcher = Arc::new(StubFetcher::new(&[
        (A, rss(&["https://posts.example/u1", "https://posts.example/u2"])),
        (B, rss(&["https://posts.example/u1"])),
    ]));
    let scheduler = FetchScheduler::new(store.clone(), fetcher.clone(), FeedParser::new());
    let shutdown = Shutdown::never();

    let first = scheduler.run_one_cycle(&shutdown).await.unwrap();
    assert_eq!(first.feed.id, feed_a.id);
    assert_eq!(first.stored, 2);

    let second = scheduler.run_one_cycle(&shutdown).await.unwrap();
    assert_eq!(second.feed.id, feed_b.id);
    assert_eq!(second.stored, 0);
    assert_eq!(second.already_known, 1);

    let third = scheduler.run_one_cycle(&shutdown).await.unwrap();
    assert_eq!(third.feed.id, feed_a.id);
    assert_eq!(third.already_known, 2);

    assert_eq!(fetcher.requested(), vec![A, B, A]);
    assert_eq!(store.count_posts().unwrap(), 2);
    let u1 = store
        .get_post_by_url("https://posts.example/u1")
        .unwrap()
        .unwrap();
    assert_eq!(u1.feed_id, feed_a.id);
    let u2 = store
        .get_post_by_url("https://posts.example/u2")
        .unwrap()
        .unwrap();
    assert_eq!(u2.feed_id, feed_a.id);
}

#[tokio::test]
async fn test_every_feed_gets_a_turn() {
    let urls = [
        "https://one.example/rss",
        "https://two.example/rss",
        "https://three.example/rss",
    ];

    let (store, user) = store_with_owner();
    let now = domain::now();
    for (i, url) in urls.iter().enumerate() {
        let feed = Feed::new(*url, *url, user.id);
        store.add_feed(&feed).unwrap();
        // Oldest fetch last in the list, so rotation runs in reverse
        store
            .mark_fetched(feed.id, now - Duration::minutes(10 + i as i64))
            .unwrap();
    }

    let bodies: Vec<(&str, String)> = urls.iter().map(|u| (*u, rss(&[]))).collect();
    let fetcher = Arc::new(StubFetcher::new(&bodies));
    let scheduler = FetchScheduler::new(store.clone(), fetcher.clone(), FeedParser::new());

    for _ in 0..6 {
        scheduler.run_one_cycle(&Shutdown::never()).await.unwrap();
    }

    let expected: Vec<&str> = urls.iter().rev().chain(urls.iter().rev()).copied().collect();
    assert_eq!(fetcher.requested(), expected);
}

#[tokio::test]
async fn test_unreachable_feed_rotates_to_the_back() {
    let (store, user) = store_with_owner();
    store
        .add_feed(&Feed::new("Gone", "https://gone.example/rss", user.id))
        .unwrap();
    store
        .add_feed(&Feed::new("Live", "https://live.example/rss", user.id))
        .unwrap();

    let fetcher = Arc::new(StubFetcher::new(&[(
        "https://live.example/rss",
        rss(&["https://posts.example/live"]),
    )]));
    let scheduler = FetchScheduler::new(store.clone(), fetcher, FeedParser::new());
    let shutdown = Shutdown::never();

    let err = scheduler.run_one_cycle(&shutdown).await.unwrap_err();
    assert!(matches!(
        err,
        CycleError::FetchFailed { source: FetchError::HttpStatus(404), .. }
    ));

    let report = scheduler.run_one_cycle(&shutdown).await.unwrap();
    assert_eq!(report.feed.url, "https://live.example/rss");
    assert_eq!(report.stored, 1);
}
