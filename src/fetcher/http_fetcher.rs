use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::app::{Result, Shutdown};
use crate::config::FetchSettings;
use crate::fetcher::{FetchError, Fetcher};

pub struct HttpFetcher {
    client: Client,
    max_body_bytes: usize,
}

impl HttpFetcher {
    pub fn new(settings: &FetchSettings) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .user_agent(settings.user_agent.clone())
            .build()?;

        Ok(Self {
            client,
            max_body_bytes: settings.max_body_bytes,
        })
    }

    async fn get(&self, url: &str) -> std::result::Result<Vec<u8>, FetchError> {
        let mut response = self.client.get(url).send().await.map_err(classify)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus(status.as_u16()));
        }

        let limit = self.max_body_bytes;
        if response.content_length().is_some_and(|len| len > limit as u64) {
            return Err(FetchError::ResponseTooLarge { limit });
        }

        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(classify)? {
            if body.len() + chunk.len() > limit {
                return Err(FetchError::ResponseTooLarge { limit });
            }
            body.extend_from_slice(&chunk);
        }

        Ok(body)
    }
}

fn classify(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout
    } else {
        FetchError::Network(err)
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str, shutdown: &Shutdown) -> std::result::Result<Vec<u8>, FetchError> {
        if shutdown.is_cancelled() {
            return Err(FetchError::Cancelled);
        }

        tokio::select! {
            result = self.get(url) => result,
            _ = shutdown.cancelled() => Err(FetchError::Cancelled),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn settings() -> FetchSettings {
        FetchSettings {
            user_agent: "gator-test/1.0".to_string(),
            timeout_secs: 5,
            max_body_bytes: 1024,
        }
    }

    #[tokio::test]
    async fn test_fetch_success_sends_user_agent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/feed.xml"))
            .and(header("user-agent", "gator-test/1.0"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<rss/>"))
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new(&settings()).unwrap();
        let body = fetcher
            .fetch(&format!("{}/feed.xml", server.uri()), &Shutdown::never())
            .await
            .unwrap();

        assert_eq!(body, b"<rss/>");
    }

    #[tokio::test]
    async fn test_fetch_non_success_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new(&settings()).unwrap();
        let err = fetcher
            .fetch(&format!("{}/missing.xml", server.uri()), &Shutdown::never())
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::HttpStatus(404)));
    }

    #[tokio::test]
    async fn test_fetch_rejects_oversized_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![b'x'; 4096]))
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new(&settings()).unwrap();
        let err = fetcher
            .fetch(&server.uri(), &Shutdown::never())
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::ResponseTooLarge { limit: 1024 }));
    }

    #[tokio::test]
    async fn test_fetch_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new(&FetchSettings {
            timeout_secs: 1,
            ..settings()
        })
        .unwrap();
        let err = fetcher
            .fetch(&server.uri(), &Shutdown::never())
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::Timeout));
    }

    #[tokio::test]
    async fn test_fetch_cancelled_mid_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new(&settings()).unwrap();
        let (trigger, shutdown) = Shutdown::channel();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.trigger();
        });

        let err = fetcher.fetch(&server.uri(), &shutdown).await.unwrap_err();
        assert!(matches!(err, FetchError::Cancelled));
    }

    #[tokio::test]
    async fn test_fetch_already_cancelled() {
        let (trigger, shutdown) = Shutdown::channel();
        trigger.trigger();

        let fetcher = HttpFetcher::new(&settings()).unwrap();
        let err = fetcher
            .fetch("http://127.0.0.1:9/feed.xml", &shutdown)
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Cancelled));
    }

    #[tokio::test]
    async fn test_fetch_invalid_url() {
        let fetcher = HttpFetcher::new(&settings()).unwrap();
        let err = fetcher
            .fetch("not a url", &Shutdown::never())
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Network(_)));
    }
}
