use async_trait::async_trait;
use futures::StreamExt;
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;
use thiserror::Error;

use crate::util::validate_url;

pub const DEFAULT_BASE_URL: &str = "https://r.jina.ai";
pub const DEFAULT_ENRICH_TIMEOUT: Duration = Duration::from_secs(20);
const MAX_CONTENT_SIZE: usize = 5 * 1024 * 1024; // 5MB

/// Hosts that may receive the API key.
const OFFICIAL_PREFIXES: &[&str] = &["https://r.jina.ai/", "https://api.jina.ai/"];

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    #[error("Response too large (exceeds {0} bytes)")]
    ResponseTooLarge(usize),
    #[error("Invalid UTF-8 in response")]
    InvalidUtf8,
    #[error("Invalid article URL: {0}")]
    InvalidUrl(String),
    #[error("Insecure base URL: HTTPS required (except localhost for testing)")]
    InsecureBaseUrl,
    #[error("Reader returned no content")]
    Empty,
}

/// Turns an article link into its full plain-text body.
///
/// Implementations make a single attempt; callers decide what a failure means.
#[async_trait]
pub trait Enricher: Send + Sync {
    async fn enrich(&self, url: &str) -> Result<String, ContentError>;
}

/// [`Enricher`] backed by a jina.ai-style reader proxy
/// (`GET {base_url}/{article_url}` returns the page as Markdown).
#[derive(Debug, Clone)]
pub struct JinaEnricher {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<SecretString>,
    timeout: Duration,
}

impl JinaEnricher {
    /// Build an enricher for `base_url`.
    ///
    /// Plain `http` is only accepted for localhost so an API key can never
    /// travel unencrypted.
    pub fn new(
        client: reqwest::Client,
        base_url: &str,
        api_key: Option<SecretString>,
        timeout: Duration,
    ) -> Result<Self, ContentError> {
        let base = base_url.trim_end_matches('/');

        if !base.starts_with("https://") {
            let is_localhost =
                base.starts_with("http://127.0.0.1") || base.starts_with("http://localhost");
            if !is_localhost {
                tracing::error!(base_url = %base, "Rejecting non-HTTPS reader base URL");
                return Err(ContentError::InsecureBaseUrl);
            }
            tracing::warn!(base_url = %base, "Using non-HTTPS reader base URL (localhost only)");
        }

        if base != DEFAULT_BASE_URL {
            tracing::info!(base_url = %base, "Using custom reader base URL");
        }

        Ok(Self {
            client,
            base_url: base.to_string(),
            api_key,
            timeout,
        })
    }

    fn is_official(&self, reader_url: &str) -> bool {
        OFFICIAL_PREFIXES.iter().any(|p| reader_url.starts_with(p))
    }

    async fn request(&self, reader_url: &str) -> Result<String, ContentError> {
        let mut request = self.client.get(reader_url);

        // Custom base URLs never receive the key
        if let Some(key) = &self.api_key {
            if self.is_official(reader_url) {
                request = request.header("Authorization", format!("Bearer {}", key.expose_secret()));
            } else {
                tracing::debug!("Skipping API key for non-official reader URL");
            }
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(ContentError::HttpStatus(response.status().as_u16()));
        }

        read_limited_text(response, MAX_CONTENT_SIZE).await
    }
}

#[async_trait]
impl Enricher for JinaEnricher {
    async fn enrich(&self, url: &str) -> Result<String, ContentError> {
        // Article links come from third-party feeds
        let parsed = validate_url(url).map_err(|e| ContentError::InvalidUrl(e.to_string()))?;
        let reader_url = format!("{}/{}", self.base_url, parsed.as_str());

        let raw = tokio::time::timeout(self.timeout, self.request(&reader_url))
            .await
            .map_err(|_| ContentError::Timeout(self.timeout))??;

        let content = strip_boilerplate(&raw);
        if content.trim().is_empty() {
            return Err(ContentError::Empty);
        }

        tracing::debug!(article = %url, bytes = content.len(), "Enriched article");
        Ok(content)
    }
}

/// Strip common boilerplate the reader proxy leaves in.
///
/// Patterns targeted:
/// - "Skip to content" navigation links
/// - Comment section scaffolding (Loading Comments, form fields)
/// - WordPress "Powered by" footers
/// - Runs of three or more archive links (`*   [Month Year](url)`)
fn strip_boilerplate(content: &str) -> String {
    let lines = content.lines().filter(|line| !is_cruft_line(line.trim()));

    let mut result: Vec<&str> = Vec::new();
    let mut run_start = 0;
    let mut run_len = 0;

    for line in lines {
        if is_archive_link(line) {
            if run_len == 0 {
                run_start = result.len();
            }
            run_len += 1;
        } else {
            if run_len >= 3 {
                result.truncate(run_start);
            }
            run_len = 0;
        }
        result.push(line);
    }

    if run_len >= 3 {
        result.truncate(run_start);
    }

    result.join("\n")
}

fn is_cruft_line(trimmed: &str) -> bool {
    trimmed.starts_with("[Skip to content]")
        || trimmed == "Loading Comments..."
        || trimmed == "Write a Comment..."
        || trimmed.starts_with("Email (Required)")
        || trimmed == "%d"
        || trimmed.contains("Proudly powered by WordPress")
        || trimmed == "Menu"
}

const MONTHS: &[&str] = &[
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// `*   [March 2024](https://example.com/2024/03/)`
fn is_archive_link(line: &str) -> bool {
    let Some(rest) = line.trim().strip_prefix('*') else {
        return false;
    };
    let Some(label) = rest.trim_start().strip_prefix('[') else {
        return false;
    };

    MONTHS.iter().any(|month| {
        label
            .strip_prefix(month)
            .and_then(|after| after.strip_prefix(' '))
            .and_then(|after| after.get(..4))
            .is_some_and(|year| year.bytes().all(|b| b.is_ascii_digit()))
    })
}

async fn read_limited_text(
    response: reqwest::Response,
    limit: usize,
) -> Result<String, ContentError> {
    if let Some(len) = response.content_length() {
        if len > limit as u64 {
            return Err(ContentError::ResponseTooLarge(limit));
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(ContentError::ResponseTooLarge(limit));
        }
        bytes.extend_from_slice(&chunk);
    }

    String::from_utf8(bytes).map_err(|_| ContentError::InvalidUtf8)
}
