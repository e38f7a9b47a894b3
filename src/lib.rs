//! # gator
//!
//! A multi-user RSS feed aggregator that runs unattended.
//!
//! ## Architecture
//!
//! The core is a single ingestion loop:
//!
//! ```text
//! Scheduler → Fetcher → Parser → (per item) Timestamp + Ingest → Store
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! gator register alice
//! gator addfeed "Rust Blog" https://blog.rust-lang.org/feed.xml
//! gator agg 1m
//! gator browse 5
//! ```

/// Application context, error types and the shutdown signal.
///
/// The [`AppContext`](app::AppContext) struct wires together the
/// configuration, store, fetcher and parser.
pub mod app;

/// Command-line interface using clap.
pub mod cli;

/// Configuration loaded from `~/.config/gator/config.toml`.
pub mod config;

/// Core domain models: users, feeds, follows and posts.
pub mod domain;

/// HTTP fetching.
///
/// - [`Fetcher`](fetcher::Fetcher): Async trait for feed fetching
/// - [`HttpFetcher`](fetcher::HttpFetcher): reqwest-based implementation
pub mod fetcher;

/// Turning parsed feed items into stored posts.
pub mod ingest;

/// Tracing subscriber setup.
pub mod logging;

/// Feed decoding for RSS 2.0 (quick-xml) and everything else (feed-rs).
pub mod parser;

/// Least-recently-fetched scheduling and the ingestion cycle.
pub mod scheduler;

/// SQLite persistence layer.
///
/// - [`FeedCatalog`](store::FeedCatalog), [`PostStore`](store::PostStore),
///   [`UserStore`](store::UserStore): storage traits
/// - [`SqliteStore`](store::SqliteStore): SQLite implementation
pub mod store;

/// Publication date normalization.
pub mod timestamp;
