use thiserror::Error;

use crate::config::ConfigError;
use crate::scheduler::IntervalError;

#[derive(Error, Debug)]
pub enum GatorError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] rusqlite_migration::Error),

    #[error("Unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid interval: {0}")]
    InvalidInterval(#[from] IntervalError),

    #[error("No user logged in, please log in first")]
    NotLoggedIn,

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("User already exists: {0}")]
    UserExists(String),

    #[error("Feed not found: {0}")]
    FeedNotFound(String),

    #[error("Already following: {0}")]
    AlreadyFollowing(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, GatorError>;
