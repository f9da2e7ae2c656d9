//! Fetching and parsing of the news source.
//!
//! Scraping is split in two phases:
//!
//! 1. **Fetching**: Download the raw markup of the source page ([`Fetch`])
//! 2. **Extraction**: Turn the markup into candidate [`Record`]s, one per
//!    repeating content block ([`allsides::extract`])
//!
//! Extraction is a pure function of the document, so it is tested against
//! inline fixtures without any network.
//!
//! [`Record`]: crate::models::Record

pub mod allsides;

use crate::error::FetchError;
use std::future::Future;
use std::time::Duration;
use tracing::{info, instrument};
use url::Url;

/// Something that can produce the source document.
pub trait Fetch: Send + Sync {
    /// Retrieve the raw markup of the configured source page.
    fn fetch(&self) -> impl Future<Output = Result<String, FetchError>> + Send;
}

/// Fetches a single fixed URL over HTTP.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    url: Url,
}

impl HttpFetcher {
    pub fn new(url: Url, timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, url })
    }
}

impl Fetch for HttpFetcher {
    #[instrument(level = "info", skip_all, fields(url = %self.url))]
    async fn fetch(&self) -> Result<String, FetchError> {
        let response = self.client.get(self.url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: self.url.to_string(),
                status,
            });
        }
        let html = response.text().await?;
        info!(bytes = html.len(), %status, "Fetched source page");
        Ok(html)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve exactly one canned HTTP response on a random local port.
    async fn serve_once(status_line: &'static str, body: &'static str) -> Url {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4096];
            let _ = socket.read(&mut buf).await;
            let response = format!(
                "{status_line}\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
        });
        Url::parse(&format!("http://{addr}/unbiased-balanced-news")).unwrap()
    }

    /// Same as `HttpFetcher::new` but ignoring any proxy set in the environment.
    fn local_fetcher(url: Url) -> HttpFetcher {
        let client = reqwest::Client::builder()
            .no_proxy()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap();
        HttpFetcher { client, url }
    }

    #[tokio::test]
    async fn test_fetch_returns_body() {
        let url = serve_once("HTTP/1.1 200 OK", "<html>ok</html>").await;
        let fetcher = local_fetcher(url);
        assert_eq!(fetcher.fetch().await.unwrap(), "<html>ok</html>");
    }

    #[tokio::test]
    async fn test_fetch_non_success_status_fails() {
        let url = serve_once("HTTP/1.1 503 Service Unavailable", "down").await;
        let fetcher = local_fetcher(url);
        match fetcher.fetch().await {
            Err(FetchError::Status { status, .. }) => assert_eq!(status.as_u16(), 503),
            other => panic!("expected status error, got {other:?}"),
        }
    }

    #[test]
    fn test_new_builds_client() {
        let url = Url::parse("https://www.allsides.com/unbiased-balanced-news").unwrap();
        let fetcher = HttpFetcher::new(url.clone(), Duration::from_secs(1)).unwrap();
        assert_eq!(fetcher.url, url);
    }

    #[tokio::test]
    async fn test_fetch_connection_refused_fails() {
        // Bind then drop to get a port nothing listens on.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let url = Url::parse(&format!("http://{addr}/")).unwrap();
        let fetcher = local_fetcher(url);
        assert!(matches!(
            fetcher.fetch().await,
            Err(FetchError::Transport(_))
        ));
    }
}
