pub mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "gator")]
#[command(about = "A multi-user RSS feed aggregator", long_about = None)]
pub struct Cli {
    /// Path to the configuration file (default: ~/.config/gator/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a user and log in as them
    Register {
        name: String,
    },
    /// Switch the current user
    Login {
        name: String,
    },
    /// List all users
    Users,
    /// Delete every user along with their feeds and posts
    Reset,
    /// Add a feed and follow it
    #[command(name = "addfeed")]
    AddFeed {
        /// Display name of the feed
        name: String,
        /// URL of the feed
        url: String,
    },
    /// List all feeds
    Feeds,
    /// Follow an existing feed
    Follow {
        url: String,
    },
    /// List feeds the current user follows
    Following,
    /// Stop following a feed
    Unfollow {
        url: String,
    },
    /// Show the newest posts from followed feeds
    Browse {
        /// Number of posts to show
        #[arg(default_value_t = 2)]
        limit: usize,
    },
    /// Fetch the next due feed once
    Scrape,
    /// Fetch feeds continuously
    Agg {
        /// Time between requests (e.g., "30s", "1m", "1h30m")
        time_between_reqs: String,
    },
}
