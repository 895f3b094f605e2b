use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use thiserror::Error;

use super::parser::RawEntry;
use crate::content::Enricher;
use crate::storage::FeedConfig;
use crate::util::{clean_inline, strip_control_chars};

/// Values used when a feed entry leaves a field out.
pub mod fallback {
    pub const TITLE: &str = "No Title";
    pub const LINK: &str = "";
    pub const AUTHOR: &str = "Unknown Author";
    pub const PUBLISHED: &str = "No Date";
    /// Article text when enrichment was attempted and failed.
    pub const ENRICHMENT_FAILED: &str = "Error parsing full article content.";
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EntryError {
    /// No title, link or summary: nothing to show or link to.
    #[error("Entry has no title, link or summary")]
    MissingIdentity,
}

/// A normalized article, ready for assembly. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Article {
    pub title: String,
    pub link: String,
    /// Raw summary markup from the feed.
    pub summary: Option<String>,
    pub author: String,
    pub published: String,
    pub published_at: Option<DateTime<Utc>>,
    /// Full body from enrichment, or the failure placeholder.
    pub text: Option<String>,
}

/// Applies the fallback table to raw entries and optionally enriches them.
#[derive(Debug, Clone, Copy)]
pub struct ArticleNormalizer {
    enrich_concurrency: usize,
}

impl Default for ArticleNormalizer {
    fn default() -> Self {
        Self::new(4)
    }
}

impl ArticleNormalizer {
    /// `enrich_concurrency` bounds in-flight enrichment requests per feed.
    pub fn new(enrich_concurrency: usize) -> Self {
        Self {
            enrich_concurrency: enrich_concurrency.max(1),
        }
    }

    /// Build an [`Article`] from `entry` without enrichment.
    pub fn normalize_entry(&self, entry: &RawEntry) -> Result<Article, EntryError> {
        let link = non_blank(entry.link.as_deref()).map(str::to_string);
        let summary = non_blank(entry.summary.as_deref()).map(str::to_string);
        let has_title = non_blank(entry.title.as_deref()).is_some();

        if !has_title && link.is_none() && summary.is_none() {
            return Err(EntryError::MissingIdentity);
        }

        // A present but blank title stays blank; the assembler drops it
        let title = match entry.title.as_deref() {
            Some(title) => clean_inline(title),
            None => fallback::TITLE.to_string(),
        };

        let author = entry
            .author
            .as_deref()
            .map(clean_inline)
            .filter(|a| !a.is_empty())
            .unwrap_or_else(|| fallback::AUTHOR.to_string());

        let published = non_blank(entry.published.as_deref())
            .map(str::to_string)
            .unwrap_or_else(|| fallback::PUBLISHED.to_string());

        Ok(Article {
            title,
            link: link.unwrap_or_else(|| fallback::LINK.to_string()),
            summary,
            author,
            published,
            published_at: entry.published_at,
            text: None,
        })
    }

    /// Normalize `entry` and, when an enricher is given and the entry has a
    /// link, fetch its full text. An enrichment failure never fails the
    /// article; its text becomes [`fallback::ENRICHMENT_FAILED`].
    pub async fn normalize(
        &self,
        entry: &RawEntry,
        enricher: Option<&dyn Enricher>,
    ) -> Result<Article, EntryError> {
        let mut article = self.normalize_entry(entry)?;

        if let Some(enricher) = enricher {
            if !article.link.is_empty() {
                article.text = Some(match enricher.enrich(&article.link).await {
                    Ok(text) => strip_control_chars(&text).into_owned(),
                    Err(e) => {
                        tracing::warn!(article = %article.link, error = %e, "Enrichment failed");
                        fallback::ENRICHMENT_FAILED.to_string()
                    }
                });
            }
        }

        Ok(article)
    }

    /// Normalize every entry of one feed, preserving entry order.
    ///
    /// Entries that fail are logged and skipped; their siblings are unaffected.
    pub async fn normalize_all(
        &self,
        feed: &FeedConfig,
        entries: &[RawEntry],
        enricher: Option<&dyn Enricher>,
    ) -> Vec<Article> {
        let results: Vec<_> = stream::iter(entries.iter().enumerate())
            .map(|(index, entry)| async move { (index, self.normalize(entry, enricher).await) })
            .buffered(self.enrich_concurrency)
            .collect()
            .await;

        results
            .into_iter()
            .filter_map(|(index, result)| match result {
                Ok(article) => Some(article),
                Err(e) => {
                    tracing::warn!(feed = %feed.url, entry = index, error = %e, "Skipping entry");
                    None
                }
            })
            .collect()
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
