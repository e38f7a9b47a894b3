pub mod http_fetcher;

use async_trait::async_trait;
use thiserror::Error;

use crate::app::Shutdown;

pub use http_fetcher::HttpFetcher;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Unexpected HTTP status {0}")]
    HttpStatus(u16),

    #[error("Request timed out")]
    Timeout,

    #[error("Fetch cancelled")]
    Cancelled,

    #[error("Response body exceeds {limit} bytes")]
    ResponseTooLarge { limit: usize },
}

/// One bounded GET of a feed URL.
///
/// Implementations must give up with [`FetchError::Cancelled`] once
/// `shutdown` fires.
#[async_trait]
pub trait Fetcher {
    async fn fetch(&self, url: &str, shutdown: &Shutdown) -> Result<Vec<u8>, FetchError>;
}
