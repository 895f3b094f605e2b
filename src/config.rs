//! Configuration file parser for ~/.config/epistle/config.toml.
//!
//! The config file is optional and a missing file yields `Config::default()`.
//! Unknown keys are ignored by serde (with `deny_unknown_fields` off), though
//! we log a warning when the file contains potential typos.
use secrecy::SecretString;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::content::DEFAULT_BASE_URL;
use crate::document::ArticleLayout;
use crate::feed::fetcher::DEFAULT_MAX_FEED_BYTES;
use crate::feed::FetchSettings;

/// Environment variable that overrides `jina_api_key`.
pub const API_KEY_ENV: &str = "EPISTLE_JINA_API_KEY";

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config file too large: {0}")]
    TooLarge(String),

    #[error("Invalid config value: {0}")]
    Invalid(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Generation settings.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
/// The API key is masked in Debug output.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Document title; today's date is prepended at generation time.
    pub title: String,
    pub author: String,
    pub language: String,
    pub article_type: ArticleLayout,
    /// Order articles newest first instead of feed order.
    pub sort_by_date: bool,
    pub output_dir: PathBuf,
    pub cover_image: Option<PathBuf>,
    pub feed_timeout_secs: u64,
    pub enrich_timeout_secs: u64,
    pub feed_concurrency: usize,
    pub enrich_concurrency: usize,
    pub max_feed_bytes: usize,
    pub jina_base_url: String,
    /// Reader API key. `EPISTLE_JINA_API_KEY` takes precedence.
    pub jina_api_key: Option<String>,
}

const KNOWN_KEYS: &[&str] = &[
    "title",
    "author",
    "language",
    "article_type",
    "sort_by_date",
    "output_dir",
    "cover_image",
    "feed_timeout_secs",
    "enrich_timeout_secs",
    "feed_concurrency",
    "enrich_concurrency",
    "max_feed_bytes",
    "jina_base_url",
    "jina_api_key",
];

impl Default for Config {
    fn default() -> Self {
        Self {
            title: "Newspaper".to_string(),
            author: "Epistle".to_string(),
            language: "en".to_string(),
            article_type: ArticleLayout::Summary,
            sort_by_date: false,
            output_dir: PathBuf::from("newspapers"),
            cover_image: None,
            feed_timeout_secs: 30,
            enrich_timeout_secs: 20,
            feed_concurrency: 8,
            enrich_concurrency: 4,
            max_feed_bytes: DEFAULT_MAX_FEED_BYTES,
            jina_base_url: DEFAULT_BASE_URL.to_string(),
            jina_api_key: None,
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("title", &self.title)
            .field("author", &self.author)
            .field("language", &self.language)
            .field("article_type", &self.article_type)
            .field("sort_by_date", &self.sort_by_date)
            .field("output_dir", &self.output_dir)
            .field("cover_image", &self.cover_image)
            .field("feed_timeout_secs", &self.feed_timeout_secs)
            .field("enrich_timeout_secs", &self.enrich_timeout_secs)
            .field("feed_concurrency", &self.feed_concurrency)
            .field("enrich_concurrency", &self.enrich_concurrency)
            .field("max_feed_bytes", &self.max_feed_bytes)
            .field("jina_base_url", &self.jina_base_url)
            .field(
                "jina_api_key",
                &self.jina_api_key.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Zero timeouts or concurrency → `Err(ConfigError::Invalid)`
    /// - Unknown keys → accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // Deleted between metadata and read
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        tracing::info!(
            path = %path.display(),
            article_type = %config.article_type,
            "Loaded configuration"
        );
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let positive: [(&str, u64); 5] = [
            ("feed_timeout_secs", self.feed_timeout_secs),
            ("enrich_timeout_secs", self.enrich_timeout_secs),
            ("feed_concurrency", self.feed_concurrency as u64),
            ("enrich_concurrency", self.enrich_concurrency as u64),
            ("max_feed_bytes", self.max_feed_bytes as u64),
        ];
        match positive.iter().find(|(_, value)| *value == 0) {
            Some((key, _)) => Err(ConfigError::Invalid(format!("{key} must be greater than 0"))),
            None => Ok(()),
        }
    }

    pub fn feed_timeout(&self) -> Duration {
        Duration::from_secs(self.feed_timeout_secs)
    }

    pub fn enrich_timeout(&self) -> Duration {
        Duration::from_secs(self.enrich_timeout_secs)
    }

    pub fn fetch_settings(&self) -> FetchSettings {
        FetchSettings {
            timeout: self.feed_timeout(),
            max_feed_bytes: self.max_feed_bytes,
            ..FetchSettings::default()
        }
    }

    /// The reader API key: `EPISTLE_JINA_API_KEY` if set, else the config value.
    pub fn api_key(&self) -> Option<SecretString> {
        pick_api_key(std::env::var(API_KEY_ENV).ok(), self.jina_api_key.as_deref())
    }
}

fn pick_api_key(env: Option<String>, configured: Option<&str>) -> Option<SecretString> {
    env.filter(|k| !k.trim().is_empty())
        .or_else(|| configured.filter(|k| !k.trim().is_empty()).map(str::to_string))
        .map(SecretString::from)
}

// ============================================================================
// Tests
// ============================================================================
