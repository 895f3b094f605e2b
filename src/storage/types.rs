use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

use crate::util::validate_feed_url;

/// Default number of entries consumed from each feed per run.
pub const DEFAULT_NUM_ARTICLES: usize = 5;

// ============================================================================
// Error Types
// ============================================================================

/// Errors raised by the feed list.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The persisted feed list is unreadable, malformed, or violates an
    /// invariant. Nothing from the file is used.
    #[error("Invalid feed configuration in {}: {reason}", path.display())]
    Configuration { path: PathBuf, reason: String },

    /// Writing the feed list failed. The previous file is left intact and the
    /// in-memory list keeps the change.
    #[error("Failed to save feeds to {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Another feed already uses this URL.
    #[error("Feed URL already exists: {0}")]
    DuplicateUrl(String),

    /// A feed configuration failed validation.
    #[error("Invalid feed '{url}': {reason}")]
    InvalidConfig { url: String, reason: String },
}

// ============================================================================
// Feed Configuration
// ============================================================================

/// One configured feed, keyed by its URL.
///
/// Serialized as `{"url": ..., "name": ...|null, "num_articles": ..., "category": ...|null}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedConfig {
    pub url: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default = "default_num_articles")]
    pub num_articles: usize,
    #[serde(default)]
    pub category: Option<String>,
}

fn default_num_articles() -> usize {
    DEFAULT_NUM_ARTICLES
}

impl FeedConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            name: None,
            num_articles: DEFAULT_NUM_ARTICLES,
            category: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_num_articles(mut self, num_articles: usize) -> Self {
        self.num_articles = num_articles;
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Check the invariants every stored feed must hold: an http(s) URL with a
    /// host, and a positive article cap.
    pub fn validate(&self) -> Result<(), StoreError> {
        validate_feed_url(&self.url).map_err(|e| StoreError::InvalidConfig {
            url: self.url.clone(),
            reason: e.to_string(),
        })?;

        if self.num_articles == 0 {
            return Err(StoreError::InvalidConfig {
                url: self.url.clone(),
                reason: "num_articles must be at least 1".to_string(),
            });
        }

        Ok(())
    }

    /// Label shown in the table of contents and chapter headings.
    ///
    /// Falls back to the URL's host (`blog.rust-lang.org`), then to the raw URL,
    /// when no name is configured or the name is blank.
    pub fn display_name(&self) -> String {
        if let Some(name) = self.name.as_deref().map(str::trim) {
            if !name.is_empty() {
                return name.to_string();
            }
        }

        url::Url::parse(&self.url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_else(|| self.url.clone())
    }
}

/// A partial edit of a [`FeedConfig`].
///
/// Optional fields use `Option<Option<_>>`: `None` keeps the current value,
/// `Some(None)` clears it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedPatch {
    pub url: Option<String>,
    pub name: Option<Option<String>>,
    pub num_articles: Option<usize>,
    pub category: Option<Option<String>>,
}

impl FeedPatch {
    pub fn apply(self, mut config: FeedConfig) -> FeedConfig {
        if let Some(url) = self.url {
            config.url = url;
        }
        if let Some(name) = self.name {
            config.name = name;
        }
        if let Some(num_articles) = self.num_articles {
            config.num_articles = num_articles;
        }
        if let Some(category) = self.category {
            config.category = category;
        }
        config
    }
}
