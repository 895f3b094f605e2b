use futures::StreamExt;
use std::time::Duration;
use thiserror::Error;

use super::parser::{parse_entries, RawEntry};
use crate::storage::FeedConfig;
use crate::util::{validate_feed_url, UrlValidationError};

pub const DEFAULT_FEED_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_MAX_FEED_BYTES: usize = 10 * 1024 * 1024; // 10MB

/// Errors that make a feed unavailable for this run.
///
/// None of these are fatal to a generation run; [`FeedFetcher::fetch_entries`]
/// turns them into an empty feed.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The configured URL is not a fetchable http(s) URL
    #[error("Invalid feed URL: {0}")]
    InvalidUrl(#[from] UrlValidationError),
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Request (including the body) exceeded the configured timeout
    #[error("Request timed out")]
    Timeout,
    /// Response body exceeded the size cap
    #[error("Response too large (exceeds {0} bytes)")]
    ResponseTooLarge(usize),
    /// Response was incomplete (received fewer bytes than Content-Length)
    #[error("Incomplete response: expected {expected} bytes, received {received}")]
    IncompleteResponse { expected: u64, received: usize },
    /// Body is not an RSS, Atom or JSON feed
    #[error("Malformed feed: {0}")]
    Malformed(String),
}

/// Knobs for feed retrieval.
#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub timeout: Duration,
    pub max_feed_bytes: usize,
    pub user_agent: String,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_FEED_TIMEOUT,
            max_feed_bytes: DEFAULT_MAX_FEED_BYTES,
            user_agent: concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Retrieves one feed document and turns it into at most `num_articles` raw entries.
///
/// One attempt per feed and per run: no retry, no backoff.
#[derive(Debug, Clone)]
pub struct FeedFetcher {
    client: reqwest::Client,
    settings: FetchSettings,
}

impl FeedFetcher {
    pub fn new(settings: FetchSettings) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(settings.user_agent.as_str())
            .pool_idle_timeout(Duration::from_secs(30))
            .tcp_keepalive(Duration::from_secs(60))
            .build()?;
        Ok(Self::with_client(client, settings))
    }

    /// Share an existing client (connection pool) with other components.
    pub fn with_client(client: reqwest::Client, settings: FetchSettings) -> Self {
        Self { client, settings }
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// Fetch and parse `feed`, keeping the first `num_articles` entries in
    /// document order.
    ///
    /// # Errors
    ///
    /// - [`FetchError::Timeout`] - no complete response within the timeout
    /// - [`FetchError::Network`] - connection or TLS errors
    /// - [`FetchError::HttpStatus`] - non-2xx response
    /// - [`FetchError::ResponseTooLarge`] - body larger than `max_feed_bytes`
    /// - [`FetchError::Malformed`] - body is not a feed
    pub async fn fetch(&self, feed: &FeedConfig) -> Result<Vec<RawEntry>, FetchError> {
        let url = validate_feed_url(&feed.url)?;

        let bytes = tokio::time::timeout(self.settings.timeout, self.download(url))
            .await
            .map_err(|_| FetchError::Timeout)??;

        let entries = parse_entries(&bytes, feed.num_articles)
            .map_err(|e| FetchError::Malformed(e.to_string()))?;

        tracing::debug!(feed = %feed.url, entries = entries.len(), "Fetched feed");
        Ok(entries)
    }

    /// Like [`fetch`](Self::fetch), but an unavailable feed is logged and
    /// yields no entries.
    pub async fn fetch_entries(&self, feed: &FeedConfig) -> Vec<RawEntry> {
        match self.fetch(feed).await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(feed = %feed.url, error = %e, "Feed unavailable, skipping");
                Vec::new()
            }
        }
    }

    async fn download(&self, url: url::Url) -> Result<Vec<u8>, FetchError> {
        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            return Err(FetchError::HttpStatus(response.status().as_u16()));
        }

        read_limited_bytes(response, self.settings.max_feed_bytes).await
    }
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    let expected_length = response.content_length();

    // Fast path: check Content-Length header
    if let Some(len) = expected_length {
        if len > limit as u64 {
            return Err(FetchError::ResponseTooLarge(limit));
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge(limit));
        }
        bytes.extend_from_slice(&chunk);
    }

    if let Some(expected) = expected_length {
        if (bytes.len() as u64) < expected {
            return Err(FetchError::IncompleteResponse {
                expected,
                received: bytes.len(),
            });
        }
    }

    Ok(bytes)
}
