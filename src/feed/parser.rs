use chrono::{DateTime, Utc};
use feed_rs::model::{Entry, Link};
use feed_rs::parser;

/// A feed entry as parsed, before any fallback is applied.
///
/// Every field is optional because feeds in the wild omit all of them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawEntry {
    pub title: Option<String>,
    pub link: Option<String>,
    /// Entry summary, or the content body when the feed has no summary.
    pub summary: Option<String>,
    /// Human-readable publication date (RFC 2822).
    pub published: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub author: Option<String>,
}

impl From<Entry> for RawEntry {
    fn from(entry: Entry) -> Self {
        let published_at = entry.published.or(entry.updated);
        let summary = entry
            .summary
            .map(|s| s.content)
            .or_else(|| entry.content.and_then(|c| c.body));

        Self {
            title: entry.title.map(|t| t.content),
            link: article_link(entry.links),
            summary,
            published: published_at.map(|dt| dt.to_rfc2822()),
            published_at,
            author: entry.authors.into_iter().next().map(|p| p.name),
        }
    }
}

/// The entry's own page: the first `alternate` (or untyped) link, else the
/// first link of any kind. Atom feeds often list `replies`, `edit` or `self`
/// links ahead of it.
fn article_link(links: Vec<Link>) -> Option<String> {
    let alternate = links
        .iter()
        .position(|l| matches!(l.rel.as_deref(), None | Some("alternate")));
    let index = alternate.unwrap_or(0);
    links.into_iter().nth(index).map(|l| l.href)
}

/// Parse an RSS, Atom or JSON Feed document, keeping at most `limit` entries
/// in document order. Entries past the limit are never converted.
pub fn parse_entries(bytes: &[u8], limit: usize) -> Result<Vec<RawEntry>, parser::ParseFeedError> {
    let feed = parser::parse(bytes)?;
    Ok(feed
        .entries
        .into_iter()
        .take(limit)
        .map(RawEntry::from)
        .collect())
}
