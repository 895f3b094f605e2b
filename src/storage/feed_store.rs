use std::collections::HashSet;
use std::path::{Path, PathBuf};

use super::types::{FeedConfig, StoreError};
use crate::util::write_bytes_atomic;

/// Durable, ordered list of configured feeds backed by a JSON file.
///
/// Every mutation takes `&mut self` and rewrites the whole file atomically, so
/// the file on disk always holds either the previous or the new list.
#[derive(Debug)]
pub struct FeedStore {
    path: PathBuf,
    feeds: Vec<FeedConfig>,
}

impl FeedStore {
    /// Load the feed list at `path`, creating an empty one if it is missing.
    ///
    /// A malformed file, an invalid record or a duplicated URL is a
    /// [`StoreError::Configuration`]; nothing from such a file is used.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let mut store = Self {
            path: path.into(),
            feeds: Vec::new(),
        };
        store.load()?;
        Ok(store)
    }

    /// Re-read the file, replacing the in-memory list.
    pub fn load(&mut self) -> Result<(), StoreError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %self.path.display(), "Feed list not found, creating an empty one");
                if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                        path: self.path.clone(),
                        source,
                    })?;
                }
                self.feeds.clear();
                return self.save();
            }
            Err(e) => {
                return Err(StoreError::Configuration {
                    path: self.path.clone(),
                    reason: format!("unreadable: {e}"),
                })
            }
        };

        self.feeds = parse_feeds(&content).map_err(|reason| StoreError::Configuration {
            path: self.path.clone(),
            reason,
        })?;

        tracing::debug!(path = %self.path.display(), feeds = self.feeds.len(), "Loaded feed list");
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn feeds(&self) -> &[FeedConfig] {
        &self.feeds
    }

    pub fn get(&self, url: &str) -> Option<&FeedConfig> {
        self.feeds.iter().find(|f| f.url == url)
    }

    pub fn len(&self) -> usize {
        self.feeds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.feeds.is_empty()
    }

    /// Append a feed and persist.
    ///
    /// Fails with [`StoreError::DuplicateUrl`] if the URL is already present.
    pub fn add(&mut self, config: FeedConfig) -> Result<(), StoreError> {
        config.validate()?;
        if self.get(&config.url).is_some() {
            return Err(StoreError::DuplicateUrl(config.url));
        }

        tracing::info!(feed = %config.url, "Adding feed");
        self.feeds.push(config);
        self.save()
    }

    /// Drop every feed with this exact URL and persist, returning how many were removed.
    ///
    /// Removing an unknown URL is not an error; the file is still rewritten.
    pub fn remove(&mut self, url: &str) -> Result<usize, StoreError> {
        let before = self.feeds.len();
        self.feeds.retain(|f| f.url != url);
        let removed = before - self.feeds.len();

        if removed == 0 {
            tracing::debug!(feed = %url, "Remove matched no feed");
        } else {
            tracing::info!(feed = %url, "Removed feed");
        }

        self.save()?;
        Ok(removed)
    }

    /// Replace the first feed with this URL and persist.
    ///
    /// Returns `false` when nothing matched (the file is still rewritten).
    /// Moving a feed onto a URL held by another entry is
    /// [`StoreError::DuplicateUrl`].
    pub fn update(&mut self, url: &str, config: FeedConfig) -> Result<bool, StoreError> {
        config.validate()?;

        let Some(index) = self.feeds.iter().position(|f| f.url == url) else {
            tracing::debug!(feed = %url, "Update matched no feed");
            self.save()?;
            return Ok(false);
        };

        let collides = self
            .feeds
            .iter()
            .enumerate()
            .any(|(i, f)| i != index && f.url == config.url);
        if collides {
            return Err(StoreError::DuplicateUrl(config.url));
        }

        tracing::info!(feed = %url, new_url = %config.url, "Updating feed");
        self.feeds[index] = config;
        self.save()?;
        Ok(true)
    }

    /// Write the whole list to disk atomically.
    pub fn save(&self) -> Result<(), StoreError> {
        let mut json =
            serde_json::to_vec_pretty(&self.feeds).map_err(|e| StoreError::Io {
                path: self.path.clone(),
                source: e.into(),
            })?;
        json.push(b'\n');

        write_bytes_atomic(&self.path, &json).map_err(|source| {
            tracing::error!(path = %self.path.display(), error = %source, "Failed to save feed list");
            StoreError::Io {
                path: self.path.clone(),
                source,
            }
        })
    }
}

fn parse_feeds(content: &str) -> Result<Vec<FeedConfig>, String> {
    let feeds: Vec<FeedConfig> =
        serde_json::from_str(content).map_err(|e| format!("malformed JSON: {e}"))?;

    let mut seen = HashSet::with_capacity(feeds.len());
    for (i, feed) in feeds.iter().enumerate() {
        feed.validate().map_err(|e| format!("entry {i}: {e}"))?;
        if !seen.insert(feed.url.as_str()) {
            return Err(format!("entry {i}: duplicate URL {}", feed.url));
        }
    }

    Ok(feeds)
}
