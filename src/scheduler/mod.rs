//! The ingestion loop.
//!
//! Each cycle claims the feed fetched longest ago (never-fetched feeds
//! first), stamps it as fetched *before* the network call, then fetches,
//! parses and ingests its items in document order. Stamping first means a
//! feed that keeps failing still moves to the back of the queue.

pub mod interval;

pub use interval::{format_interval, parse_interval, IntervalError};

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::time::MissedTickBehavior;

use crate::app::{GatorError, Shutdown};
use crate::domain::{self, Feed};
use crate::fetcher::{FetchError, Fetcher};
use crate::ingest::{IngestOutcome, IngestionSink};
use crate::parser::{FeedParser, ParseError};
use crate::store::{FeedCatalog, PostStore};

#[derive(Debug, Error)]
pub enum CycleError {
    #[error("No feed available to fetch")]
    NoFeedAvailable,

    #[error("Failed to fetch {feed}: {source}")]
    FetchFailed { feed: String, source: FetchError },

    #[error("Failed to parse {feed}: {source}")]
    ParseFailed { feed: String, source: ParseError },

    #[error("Feed catalog error: {0}")]
    Catalog(#[source] GatorError),
}

/// What one cycle did with the feed it claimed.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub feed: Feed,
    pub stored: usize,
    pub already_known: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl CycleReport {
    fn new(feed: Feed) -> Self {
        Self {
            feed,
            stored: 0,
            already_known: 0,
            skipped: 0,
            failed: 0,
        }
    }

    pub fn items_seen(&self) -> usize {
        self.stored + self.already_known + self.skipped + self.failed
    }
}

pub struct FetchScheduler<S> {
    store: Arc<S>,
    fetcher: Arc<dyn Fetcher + Send + Sync>,
    parser: FeedParser,
    sink: IngestionSink<S>,
}

impl<S: FeedCatalog + PostStore> FetchScheduler<S> {
    pub fn new(store: Arc<S>, fetcher: Arc<dyn Fetcher + Send + Sync>, parser: FeedParser) -> Self {
        Self {
            sink: IngestionSink::new(store.clone()),
            store,
            fetcher,
            parser,
        }
    }

    pub async fn run_one_cycle(&self, shutdown: &Shutdown) -> Result<CycleReport, CycleError> {
        let feed = self
            .store
            .claim_next_feed(domain::now())
            .map_err(CycleError::Catalog)?
            .ok_or(CycleError::NoFeedAvailable)?;

        tracing::info!(feed = %feed.url, "Fetching feed");

        let body = self
            .fetcher
            .fetch(&feed.url, shutdown)
            .await
            .map_err(|source| CycleError::FetchFailed {
                feed: feed.url.clone(),
                source,
            })?;

        let document = self
            .parser
            .parse(&body)
            .map_err(|source| CycleError::ParseFailed {
                feed: feed.url.clone(),
                source,
            })?;

        let mut report = CycleReport::new(feed);
        for item in &document.items {
            match self.sink.ingest(item, report.feed.id) {
                Ok(IngestOutcome::Stored(post)) => {
                    tracing::debug!(url = %post.url, "Stored post");
                    report.stored += 1;
                }
                Ok(IngestOutcome::AlreadyKnown) => report.already_known += 1,
                Ok(IngestOutcome::Skipped) => report.skipped += 1,
                Err(e) => {
                    tracing::warn!(url = %item.link, error = %e, "Failed to store post");
                    report.failed += 1;
                }
            }
        }

        tracing::info!(
            feed = %report.feed.url,
            title = %document.title,
            stored = report.stored,
            already_known = report.already_known,
            skipped = report.skipped,
            failed = report.failed,
            "Feed processed"
        );

        Ok(report)
    }

    /// Run a cycle now and then every `every` until `shutdown` fires.
    pub async fn run_forever(&self, every: Duration, shutdown: Shutdown) {
        tracing::info!(interval = %format_interval(every), "Collecting feeds");

        let mut timer = tokio::time::interval(every);
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = timer.tick() => {}
            }

            match self.run_one_cycle(&shutdown).await {
                Ok(_) => {}
                Err(CycleError::NoFeedAvailable) => tracing::info!("No feeds to fetch"),
                Err(e) => tracing::warn!(error = %e, "Cycle failed"),
            }
        }

        tracing::info!("Scheduler stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::User;
    use crate::store::{SqliteStore, UserStore};
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use std::collections::HashMap;
    use std::sync::Mutex;
    use tokio::time::Instant;
    use tokio_test::{assert_err, assert_ok};

    enum Reply {
        Body(&'static str),
        Status(u16),
    }

    /// Serves canned replies and records each feed's `last_fetched_at` as
    /// seen from inside the fetch. The first fetch takes `first_delay`.
    struct StubFetcher {
        store: Arc<SqliteStore>,
        replies: HashMap<String, Reply>,
        first_delay: Duration,
        seen: Mutex<Vec<(String, Option<DateTime<Utc>>)>>,
        started: Mutex<Vec<Instant>>,
    }

    #[async_trait]
    impl Fetcher for StubFetcher {
        async fn fetch(&self, url: &str, _shutdown: &Shutdown) -> Result<Vec<u8>, FetchError> {
            let marked = self
                .store
                .get_feed_by_url(url)
                .unwrap()
                .and_then(|f| f.last_fetched_at);
            let first = {
                let mut started = self.started.lock().unwrap();
                started.push(Instant::now());
                self.seen.lock().unwrap().push((url.to_string(), marked));
                started.len() == 1
            };
            if first && !self.first_delay.is_zero() {
                tokio::time::sleep(self.first_delay).await;
            }

            match self.replies.get(url) {
                Some(Reply::Body(body)) => Ok(body.as_bytes().to_vec()),
                Some(Reply::Status(code)) => Err(FetchError::HttpStatus(*code)),
                None => Err(FetchError::HttpStatus(404)),
            }
        }
    }

    const EMPTY_RSS: &str = r#"<rss version="2.0"><channel><title>Quiet</title></channel></rss>"#;

    const TWO_ITEMS: &str = r#"<rss version="2.0"><channel><title>Busy</title>
        <item><title>One</title><link>https://example.com/1</link></item>
        <item><title>No link</title></item>
        <item><title>Two</title><link>https://example.com/2</link></item>
    </channel></rss>"#;

    type Fixture = (FetchScheduler<SqliteStore>, Arc<SqliteStore>, Arc<StubFetcher>);

    fn setup(replies: Vec<(&str, Reply)>) -> Fixture {
        setup_with_delay(replies, Duration::ZERO)
    }

    fn setup_with_delay(replies: Vec<(&str, Reply)>, first_delay: Duration) -> Fixture {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let user = User::new("alice");
        store.create_user(&user).unwrap();
        for (url, _) in &replies {
            store.add_feed(&Feed::new(*url, *url, user.id)).unwrap();
        }

        let fetcher = Arc::new(StubFetcher {
            store: store.clone(),
            replies: replies
                .into_iter()
                .map(|(url, reply)| (url.to_string(), reply))
                .collect(),
            first_delay,
            seen: Mutex::new(Vec::new()),
            started: Mutex::new(Vec::new()),
        });
        let scheduler = FetchScheduler::new(store.clone(), fetcher.clone(), FeedParser::new());
        (scheduler, store, fetcher)
    }

    #[tokio::test]
    async fn test_empty_catalog() {
        let (scheduler, _, _) = setup(vec![]);
        let err = assert_err!(scheduler.run_one_cycle(&Shutdown::never()).await);
        assert!(matches!(err, CycleError::NoFeedAvailable));
    }

    #[tokio::test]
    async fn test_zero_item_feed_is_marked() {
        let (scheduler, store, _) = setup(vec![("https://quiet.example/rss", Reply::Body(EMPTY_RSS))]);

        let report = assert_ok!(scheduler.run_one_cycle(&Shutdown::never()).await);

        assert_eq!(report.items_seen(), 0);
        let feed = store.get_feed_by_url("https://quiet.example/rss").unwrap().unwrap();
        assert!(feed.last_fetched_at.is_some());
        assert_eq!(feed.last_fetched_at, report.feed.last_fetched_at);
    }

    #[tokio::test]
    async fn test_counts_outcomes() {
        let (scheduler, store, _) = setup(vec![("https://busy.example/rss", Reply::Body(TWO_ITEMS))]);

        let first = assert_ok!(scheduler.run_one_cycle(&Shutdown::never()).await);
        assert_eq!(first.stored, 2);
        assert_eq!(first.skipped, 1);
        assert_eq!(first.already_known, 0);

        let second = assert_ok!(scheduler.run_one_cycle(&Shutdown::never()).await);
        assert_eq!(second.stored, 0);
        assert_eq!(second.already_known, 2);
        assert_eq!(store.count_posts().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_failed_fetch_still_marks_feed_first() {
        let (scheduler, store, fetcher) = setup(vec![("https://down.example/rss", Reply::Status(500))]);

        let err = assert_err!(scheduler.run_one_cycle(&Shutdown::never()).await);
        assert!(matches!(
            err,
            CycleError::FetchFailed { source: FetchError::HttpStatus(500), .. }
        ));

        let seen = fetcher.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].1.is_some(), "feed must be marked before the fetch");
        assert_eq!(store.count_posts().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_parse_failure() {
        let (scheduler, store, _) = setup(vec![("https://html.example/", Reply::Body("<html><body/></html>"))]);

        let err = assert_err!(scheduler.run_one_cycle(&Shutdown::never()).await);
        assert!(matches!(err, CycleError::ParseFailed { .. }));

        let feed = store.get_feed_by_url("https://html.example/").unwrap().unwrap();
        assert!(feed.last_fetched_at.is_some());
    }

    #[tokio::test]
    async fn test_failing_feed_does_not_block_others() {
        let (scheduler, _, fetcher) = setup(vec![
            ("https://down.example/rss", Reply::Status(503)),
            ("https://quiet.example/rss", Reply::Body(EMPTY_RSS)),
        ]);

        for _ in 0..3 {
            let _ = scheduler.run_one_cycle(&Shutdown::never()).await;
        }

        let urls: Vec<String> = fetcher.seen.lock().unwrap().iter().map(|(u, _)| u.clone()).collect();
        assert_eq!(
            urls,
            vec![
                "https://down.example/rss",
                "https://quiet.example/rss",
                "https://down.example/rss",
            ]
        );
    }

    #[tokio::test]
    async fn test_run_forever_runs_immediately_and_stops() {
        let (scheduler, _, fetcher) = setup(vec![("https://quiet.example/rss", Reply::Body(EMPTY_RSS))]);
        let (trigger, shutdown) = Shutdown::channel();

        let stopper = async {
            while fetcher.seen.lock().unwrap().is_empty() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
            trigger.trigger();
        };

        let run = scheduler.run_forever(Duration::from_secs(3600), shutdown);
        assert_ok!(
            tokio::time::timeout(Duration::from_secs(5), async { tokio::join!(run, stopper) }).await
        );
        assert_eq!(fetcher.seen.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_forever_fires_every_interval() {
        let (scheduler, _, fetcher) = setup(vec![("https://quiet.example/rss", Reply::Body(EMPTY_RSS))]);
        let (trigger, shutdown) = Shutdown::channel();

        let stopper = async {
            tokio::time::sleep(Duration::from_secs(150)).await;
            trigger.trigger();
        };
        tokio::join!(scheduler.run_forever(Duration::from_secs(60), shutdown), stopper);

        let started = fetcher.started.lock().unwrap();
        let offsets: Vec<u64> = started.iter().map(|t| (*t - started[0]).as_secs()).collect();
        assert_eq!(offsets, vec![0, 60, 120]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_cycle_does_not_burst() {
        let (scheduler, _, fetcher) = setup_with_delay(
            vec![("https://slow.example/rss", Reply::Body(EMPTY_RSS))],
            Duration::from_secs(200),
        );
        let (trigger, shutdown) = Shutdown::channel();

        let stopper = async {
            tokio::time::sleep(Duration::from_secs(330)).await;
            trigger.trigger();
        };
        tokio::join!(scheduler.run_forever(Duration::from_secs(60), shutdown), stopper);

        // The ticks missed at 60s, 120s and 180s collapse into one at 200s,
        // then the schedule resumes on the original grid.
        let started = fetcher.started.lock().unwrap();
        let offsets: Vec<u64> = started.iter().map(|t| (*t - started[0]).as_secs()).collect();
        assert_eq!(offsets, vec![0, 200, 240, 300]);
    }
}
