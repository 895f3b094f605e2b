use sha2::{Digest, Sha256};

use super::model::{ArticleLayout, Chapter, CoverImage, Document, Metadata, TocEntry};
use super::render::{self, NAV_FILE, NAV_ID};
use super::AssemblyError;
use crate::feed::FeedArticles;

/// Title of the first table-of-contents entry.
pub const CONTENTS_TITLE: &str = "Contents";

/// Turns grouped articles into a [`Document`]: one chapter per non-empty
/// feed, in input order.
#[derive(Debug, Clone)]
pub struct DocumentAssembler {
    metadata: Metadata,
    layout: ArticleLayout,
    stylesheet: String,
    cover: Option<CoverImage>,
}

impl DocumentAssembler {
    pub fn new(metadata: Metadata, layout: ArticleLayout) -> Self {
        Self {
            metadata,
            layout,
            stylesheet: render::DEFAULT_STYLESHEET.to_string(),
            cover: None,
        }
    }

    pub fn with_cover(mut self, cover: CoverImage) -> Self {
        self.cover = Some(cover);
        self
    }

    pub fn with_stylesheet(mut self, stylesheet: impl Into<String>) -> Self {
        self.stylesheet = stylesheet.into();
        self
    }

    /// Build the document.
    ///
    /// Feeds without articles get no chapter and articles with a blank title
    /// are skipped. If nothing is left the result is
    /// [`AssemblyError::NoContent`].
    pub fn assemble(&self, groups: &[FeedArticles]) -> Result<Document, AssemblyError> {
        let mut chapters = Vec::new();
        let mut toc = vec![TocEntry::new(CONTENTS_TITLE, NAV_FILE)];
        let mut hasher = Sha256::new();

        for group in groups {
            let feed_name = group.feed.display_name();
            let id = format!("feed_{:03}", chapters.len() + 1);
            let file_name = format!("{id}.xhtml");

            let mut sections = String::new();
            let mut section_entry = TocEntry::new(feed_name.as_str(), file_name.as_str());
            let mut included = 0;

            for article in &group.articles {
                if article.title.trim().is_empty() {
                    tracing::warn!(feed = %group.feed.url, link = %article.link, "Skipping article without a title");
                    continue;
                }

                included += 1;
                let anchor = format!("article-{included}");
                sections.push_str(&render::article_section(&anchor, article, self.layout));
                hasher.update(article.link.as_bytes());
                hasher.update(article.title.as_bytes());

                if self.layout == ArticleLayout::Full {
                    section_entry
                        .children
                        .push(TocEntry::new(article.title.as_str(), format!("{file_name}#{anchor}")));
                }
            }

            if included == 0 {
                tracing::info!(feed = %group.feed.url, "No articles, skipping feed");
                continue;
            }

            tracing::debug!(feed = %group.feed.url, chapter = %file_name, articles = included, "Added chapter");
            chapters.push(Chapter {
                content: render::chapter_xhtml(&feed_name, &self.metadata.language, &sections),
                id,
                file_name,
                title: feed_name,
            });
            toc.push(section_entry);
        }

        if chapters.is_empty() {
            return Err(AssemblyError::NoContent);
        }

        let mut metadata = self.metadata.clone();
        if metadata.identifier.is_empty() {
            hasher.update(metadata.title.as_bytes());
            let digest = hasher.finalize();
            metadata.identifier = format!("urn:epistle:{:x}", digest);
        }

        let spine = std::iter::once(NAV_ID.to_string())
            .chain(chapters.iter().map(|c| c.id.clone()))
            .collect();

        Ok(Document {
            metadata,
            stylesheet: self.stylesheet.clone(),
            chapters,
            toc,
            spine,
            cover: self.cover.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::render::tests::assert_well_formed;
    use crate::feed::Article;
    use crate::storage::FeedConfig;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;

    fn metadata() -> Metadata {
        Metadata::new(
            "2024-01-01 Newspaper",
            "Epistle",
            "en",
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        )
    }

    fn article(title: &str) -> Article {
        Article {
            title: title.to_string(),
            link: format!("https://example.com/{}", title.replace(' ', "-")),
            summary: Some(format!("<p>About {title}</p>")),
            author: "Unknown Author".to_string(),
            published: "No Date".to_string(),
            published_at: None,
            text: Some(format!("Full text of {title}")),
        }
    }

    fn group(name: &str, titles: &[&str]) -> FeedArticles {
        FeedArticles {
            feed: FeedConfig::new(format!("https://{name}.example.com/rss")).with_name(name),
            articles: titles.iter().map(|t| article(t)).collect(),
        }
    }

    fn toc_titles(entries: &[TocEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.title.as_str()).collect()
    }

    #[test]
    fn test_one_chapter_per_non_empty_feed_in_order() {
        let groups = vec![
            group("Alpha", &["a1", "a2"]),
            group("Empty", &[]),
            group("Beta", &["b1"]),
        ];

        let doc = DocumentAssembler::new(metadata(), ArticleLayout::Full)
            .assemble(&groups)
            .unwrap();

        let files: Vec<_> = doc.chapters.iter().map(|c| c.file_name.as_str()).collect();
        assert_eq!(files, vec!["feed_001.xhtml", "feed_002.xhtml"]);
        assert_eq!(doc.chapters[0].title, "Alpha");
        assert_eq!(doc.chapters[1].title, "Beta");
        assert_eq!(doc.spine, vec!["nav", "feed_001", "feed_002"]);
        assert_eq!(toc_titles(&doc.toc), vec![CONTENTS_TITLE, "Alpha", "Beta"]);
    }

    #[test]
    fn test_full_layout_links_every_article() {
        let doc = DocumentAssembler::new(metadata(), ArticleLayout::Full)
            .assemble(&[group("Alpha", &["a1", "a2"])])
            .unwrap();

        let section = &doc.toc[1];
        assert_eq!(toc_titles(&section.children), vec!["a1", "a2"]);
        assert_eq!(section.children[1].href, "feed_001.xhtml#article-2");

        let content = &doc.chapters[0].content;
        assert!(content.contains("<section id=\"article-1\">"));
        assert!(content.contains("<section id=\"article-2\">"));
        assert!(content.contains("Full text of a1"));
        assert_well_formed(content);
    }

    #[test]
    fn test_summary_layout_lists_feeds_only() {
        let doc = DocumentAssembler::new(metadata(), ArticleLayout::Summary)
            .assemble(&[group("Alpha", &["a1", "a2"])])
            .unwrap();

        assert!(doc.toc[1].children.is_empty());
        assert_eq!(doc.toc[1].href, "feed_001.xhtml");
        let content = &doc.chapters[0].content;
        assert!(content.contains("<p>About a1</p>"));
        assert!(!content.contains("Full text"));
    }

    #[test]
    fn test_blank_titles_skipped_and_anchors_stay_dense() {
        let mut feed = group("Alpha", &["a1", "a3"]);
        feed.articles.insert(1, article("  "));

        let doc = DocumentAssembler::new(metadata(), ArticleLayout::Full)
            .assemble(&[feed])
            .unwrap();

        let children = &doc.toc[1].children;
        assert_eq!(toc_titles(children), vec!["a1", "a3"]);
        assert_eq!(children[1].href, "feed_001.xhtml#article-2");
        assert!(!doc.chapters[0].content.contains("article-3"));
    }

    #[test]
    fn test_feed_of_only_blank_titles_is_skipped() {
        let doc = DocumentAssembler::new(metadata(), ArticleLayout::Full)
            .assemble(&[group("Blank", &[""]), group("Real", &["r1"])])
            .unwrap();

        assert_eq!(doc.chapters.len(), 1);
        assert_eq!(doc.chapters[0].title, "Real");
        assert_eq!(doc.chapters[0].file_name, "feed_001.xhtml");
    }

    #[test]
    fn test_no_content() {
        let assembler = DocumentAssembler::new(metadata(), ArticleLayout::Summary);

        assert!(matches!(assembler.assemble(&[]), Err(AssemblyError::NoContent)));
        assert!(matches!(
            assembler.assemble(&[group("Empty", &[])]),
            Err(AssemblyError::NoContent)
        ));
    }

    #[test]
    fn test_unnamed_feed_uses_host() {
        let groups = vec![FeedArticles {
            feed: FeedConfig::new("https://news.example.org/feed"),
            articles: vec![article("x")],
        }];

        let doc = DocumentAssembler::new(metadata(), ArticleLayout::Summary)
            .assemble(&groups)
            .unwrap();

        assert_eq!(doc.chapters[0].title, "news.example.org");
    }

    #[test]
    fn test_identifier_is_deterministic() {
        let assembler = DocumentAssembler::new(metadata(), ArticleLayout::Full);
        let groups = vec![group("Alpha", &["a1"])];

        let first = assembler.assemble(&groups).unwrap();
        let second = assembler.assemble(&groups).unwrap();
        let other = assembler.assemble(&[group("Alpha", &["a2"])]).unwrap();

        assert!(first.metadata.identifier.starts_with("urn:epistle:"));
        assert_eq!(first.metadata.identifier, second.metadata.identifier);
        assert_ne!(first.metadata.identifier, other.metadata.identifier);
    }
}
