//! Text generation for every file in the package.
//!
//! Everything that comes from a feed passes through [`escape`] (or the
//! Markdown renderer, which escapes on its own) before it lands in markup.

use std::borrow::Cow;

use pulldown_cmark::{html, CowStr, Event, Options, Parser, Tag, TagEnd};

use super::model::{ArticleLayout, Document, TocEntry};
use crate::feed::Article;
use crate::util::{strip_control_chars, strip_html};

pub const NAV_ID: &str = "nav";
pub const NAV_FILE: &str = "nav.xhtml";
pub const NCX_FILE: &str = "toc.ncx";
pub const STYLESHEET_FILE: &str = "style/nav.css";
pub const COVER_ID: &str = "cover-image";

pub const NO_CONTENT: &str = "No content available.";
pub const READ_ORIGINAL: &str = "Read original article";

pub const DEFAULT_STYLESHEET: &str = r#"@namespace html url(http://www.w3.org/1999/xhtml);
body { line-height: 1.6; }
h1, h2 { margin-bottom: 0.5em; }
a { text-decoration: underline; }
hr { border: none; }
p.meta { margin: 0; font-size: 0.9em; }
section { margin-bottom: 2em; }
"#;

pub const CONTAINER_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>
"#;

const XML_DECLARATION: &str = "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n";

/// Escape text for use in XHTML content or a double-quoted attribute.
/// Characters XML 1.0 cannot carry are dropped.
pub fn escape(s: &str) -> String {
    quick_xml::escape::escape(strip_control_chars(s).as_ref()).into_owned()
}

/// Render an enriched article body (Markdown or plain text) to an XHTML fragment.
///
/// Raw HTML in the source is shown as text and images are dropped, since
/// neither can be trusted to be well-formed or available offline.
pub fn markdown_to_xhtml(text: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);

    let mut image_depth = 0usize;
    let events = Parser::new_ext(text, options).filter_map(|event| match event {
        Event::Start(Tag::Image { .. }) => {
            image_depth += 1;
            None
        }
        Event::End(TagEnd::Image) => {
            image_depth = image_depth.saturating_sub(1);
            None
        }
        _ if image_depth > 0 => None,
        // Character references like `&#11;` decode to controls XML cannot carry
        Event::Html(text) | Event::InlineHtml(text) | Event::Text(text) => {
            Some(Event::Text(without_controls(text)))
        }
        Event::Code(code) => Some(Event::Code(without_controls(code))),
        other => Some(other),
    });

    let mut out = String::with_capacity(text.len() + text.len() / 2);
    html::push_html(&mut out, events);
    out
}

fn without_controls(text: CowStr<'_>) -> CowStr<'_> {
    let cleaned = match strip_control_chars(&text) {
        Cow::Owned(clean) => Some(clean),
        Cow::Borrowed(_) => None,
    };
    match cleaned {
        Some(clean) => CowStr::from(clean),
        None => text,
    }
}

/// Render plain text paragraphs (separated by blank lines) as `<p>` elements.
pub fn paragraphs_to_xhtml(text: &str) -> String {
    text.split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| format!("<p>{}</p>\n", escape(p)))
        .collect()
}

fn article_body(article: &Article, layout: ArticleLayout) -> String {
    let body = match layout {
        ArticleLayout::Full => article
            .text
            .as_deref()
            .map(markdown_to_xhtml)
            .unwrap_or_default(),
        ArticleLayout::Summary => article
            .summary
            .as_deref()
            .map(|s| paragraphs_to_xhtml(&strip_html(s)))
            .unwrap_or_default(),
    };

    if body.trim().is_empty() {
        format!("<p>{NO_CONTENT}</p>\n")
    } else {
        body
    }
}

/// One `<section>` for an article, anchored at `anchor`.
pub fn article_section(anchor: &str, article: &Article, layout: ArticleLayout) -> String {
    let mut out = format!("<section id=\"{anchor}\">\n");
    out.push_str(&format!("<h2>{}</h2>\n", escape(&article.title)));
    out.push_str(&format!(
        "<p class=\"meta\"><strong>Author:</strong> {}</p>\n",
        escape(&article.author)
    ));
    out.push_str(&format!(
        "<p class=\"meta\"><strong>Published:</strong> {}</p>\n",
        escape(&article.published)
    ));
    if !article.link.is_empty() {
        out.push_str(&format!(
            "<p class=\"source\"><a href=\"{}\">{READ_ORIGINAL}</a></p>\n",
            escape(&article.link)
        ));
    }
    out.push_str("<hr/>\n<div class=\"body\">\n");
    out.push_str(&article_body(article, layout));
    out.push_str("</div>\n</section>\n");
    out
}

fn xhtml_head(title: &str, language: &str) -> String {
    let lang = escape(language);
    format!(
        "{XML_DECLARATION}<!DOCTYPE html>\n\
         <html xmlns=\"http://www.w3.org/1999/xhtml\" xmlns:epub=\"http://www.idpf.org/2007/ops\" lang=\"{lang}\" xml:lang=\"{lang}\">\n\
         <head>\n<title>{}</title>\n\
         <link rel=\"stylesheet\" type=\"text/css\" href=\"{STYLESHEET_FILE}\"/>\n</head>\n",
        escape(title)
    )
}

/// A complete chapter document: heading plus pre-rendered sections.
pub fn chapter_xhtml(title: &str, language: &str, sections: &str) -> String {
    let mut out = xhtml_head(title, language);
    out.push_str(&format!("<body>\n<h1>{}</h1>\n", escape(title)));
    out.push_str(sections);
    out.push_str("</body>\n</html>\n");
    out
}

/// The EPUB 3 navigation document.
pub fn nav_xhtml(doc: &Document) -> String {
    let title = &doc.metadata.title;
    let mut out = xhtml_head(title, &doc.metadata.language);
    out.push_str(&format!(
        "<body>\n<nav epub:type=\"toc\" id=\"toc\">\n<h1>{}</h1>\n",
        escape(title)
    ));
    push_nav_list(&mut out, &doc.toc);
    out.push_str("</nav>\n</body>\n</html>\n");
    out
}

fn push_nav_list(out: &mut String, entries: &[TocEntry]) {
    if entries.is_empty() {
        return;
    }
    out.push_str("<ol>\n");
    for entry in entries {
        out.push_str(&format!(
            "<li><a href=\"{}\">{}</a>",
            escape(&entry.href),
            escape(&entry.title)
        ));
        if !entry.children.is_empty() {
            out.push('\n');
            push_nav_list(out, &entry.children);
        }
        out.push_str("</li>\n");
    }
    out.push_str("</ol>\n");
}

/// The EPUB 2 NCX table of contents, kept for older readers.
pub fn toc_ncx(doc: &Document) -> String {
    let depth = toc_depth(&doc.toc).max(1);
    let mut out = String::from(XML_DECLARATION);
    out.push_str("<ncx xmlns=\"http://www.daisy.org/z3986/2005/ncx/\" version=\"2005-1\">\n<head>\n");
    out.push_str(&format!(
        "<meta name=\"dtb:uid\" content=\"{}\"/>\n",
        escape(&doc.metadata.identifier)
    ));
    out.push_str(&format!("<meta name=\"dtb:depth\" content=\"{depth}\"/>\n"));
    out.push_str("<meta name=\"dtb:totalPageCount\" content=\"0\"/>\n");
    out.push_str("<meta name=\"dtb:maxPageNumber\" content=\"0\"/>\n</head>\n");
    out.push_str(&format!(
        "<docTitle><text>{}</text></docTitle>\n<navMap>\n",
        escape(&doc.metadata.title)
    ));
    let mut play_order = 0;
    push_nav_points(&mut out, &doc.toc, &mut play_order);
    out.push_str("</navMap>\n</ncx>\n");
    out
}

fn push_nav_points(out: &mut String, entries: &[TocEntry], play_order: &mut usize) {
    for entry in entries {
        *play_order += 1;
        out.push_str(&format!(
            "<navPoint id=\"navpoint-{order}\" playOrder=\"{order}\">\n\
             <navLabel><text>{}</text></navLabel>\n<content src=\"{}\"/>\n",
            escape(&entry.title),
            escape(&entry.href),
            order = *play_order,
        ));
        push_nav_points(out, &entry.children, play_order);
        out.push_str("</navPoint>\n");
    }
}

fn toc_depth(entries: &[TocEntry]) -> usize {
    entries
        .iter()
        .map(|e| 1 + toc_depth(&e.children))
        .max()
        .unwrap_or(0)
}

/// The OPF package document: metadata, manifest and spine.
pub fn content_opf(doc: &Document) -> String {
    let m = &doc.metadata;
    let lang = escape(&m.language);

    let mut out = String::from(XML_DECLARATION);
    out.push_str(&format!(
        "<package xmlns=\"http://www.idpf.org/2007/opf\" version=\"3.0\" unique-identifier=\"id\" xml:lang=\"{lang}\">\n"
    ));
    out.push_str("<metadata xmlns:dc=\"http://purl.org/dc/elements/1.1/\">\n");
    out.push_str(&format!("<dc:identifier id=\"id\">{}</dc:identifier>\n", escape(&m.identifier)));
    out.push_str(&format!("<dc:title>{}</dc:title>\n", escape(&m.title)));
    out.push_str(&format!("<dc:language>{lang}</dc:language>\n"));
    out.push_str(&format!("<dc:creator id=\"creator\">{}</dc:creator>\n", escape(&m.author)));
    out.push_str(&format!(
        "<meta property=\"dcterms:modified\">{}</meta>\n",
        m.modified.format("%Y-%m-%dT%H:%M:%SZ")
    ));
    if doc.cover.is_some() {
        out.push_str(&format!("<meta name=\"cover\" content=\"{COVER_ID}\"/>\n"));
    }
    out.push_str("</metadata>\n<manifest>\n");

    out.push_str(&format!(
        "<item href=\"{NAV_FILE}\" id=\"{NAV_ID}\" media-type=\"application/xhtml+xml\" properties=\"nav\"/>\n"
    ));
    out.push_str(&format!(
        "<item href=\"{NCX_FILE}\" id=\"ncx\" media-type=\"application/x-dtbncx+xml\"/>\n"
    ));
    out.push_str(&format!(
        "<item href=\"{STYLESHEET_FILE}\" id=\"style_nav\" media-type=\"text/css\"/>\n"
    ));
    for chapter in &doc.chapters {
        out.push_str(&format!(
            "<item href=\"{}\" id=\"{}\" media-type=\"application/xhtml+xml\"/>\n",
            escape(&chapter.file_name),
            escape(&chapter.id)
        ));
    }
    if let Some(cover) = &doc.cover {
        out.push_str(&format!(
            "<item href=\"{}\" id=\"{COVER_ID}\" media-type=\"{}\" properties=\"cover-image\"/>\n",
            escape(&cover.file_name),
            cover.media_type
        ));
    }
    out.push_str("</manifest>\n<spine toc=\"ncx\">\n");
    for idref in &doc.spine {
        out.push_str(&format!("<itemref idref=\"{}\"/>\n", escape(idref)));
    }
    out.push_str("</spine>\n</package>\n");
    out
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::document::model::{Chapter, Metadata};
    use chrono::{TimeZone, Utc};
    use quick_xml::events::Event as XmlEvent;
    use quick_xml::Reader;

    /// Panics unless `xml` parses cleanly with matched tags.
    pub(crate) fn assert_well_formed(xml: &str) {
        let mut reader = Reader::from_str(xml);
        loop {
            match reader.read_event() {
                Ok(XmlEvent::Eof) => break,
                Ok(_) => {}
                Err(e) => panic!("not well-formed: {e}\n{xml}"),
            }
        }
    }

    fn article() -> Article {
        Article {
            title: "Title".to_string(),
            link: "https://example.com/a?x=1&y=2".to_string(),
            summary: Some("<p>Summary <b>text</b></p><p>Second</p>".to_string()),
            author: "Ann".to_string(),
            published: "Mon, 1 Jan 2024 00:00:00 +0000".to_string(),
            published_at: None,
            text: Some("# Heading\n\nBody with <script>alert(1)</script> and ![img](x.png).".to_string()),
        }
    }

    fn document() -> Document {
        let mut metadata = Metadata::new(
            "2024-01-01 Newspaper",
            "Epistle",
            "en",
            Utc.with_ymd_and_hms(2024, 1, 1, 6, 0, 0).unwrap(),
        );
        metadata.identifier = "urn:epistle:abc".to_string();
        let mut section = TocEntry::new("Feed & Co", "feed_001.xhtml");
        section.children.push(TocEntry::new("Title", "feed_001.xhtml#article-1"));
        Document {
            metadata,
            stylesheet: DEFAULT_STYLESHEET.to_string(),
            chapters: vec![Chapter {
                id: "feed_001".to_string(),
                file_name: "feed_001.xhtml".to_string(),
                title: "Feed & Co".to_string(),
                content: String::new(),
            }],
            toc: vec![TocEntry::new("Contents", NAV_FILE), section],
            spine: vec![NAV_ID.to_string(), "feed_001".to_string()],
            cover: None,
        }
    }

    #[test]
    fn test_escape_markup_and_controls() {
        assert_eq!(escape("a < b & \"c\"\x0b"), "a &lt; b &amp; &quot;c&quot;");
    }

    #[test]
    fn test_markdown_escapes_raw_html_and_drops_images() {
        let out = markdown_to_xhtml("Hi <b>there</b>\n\n![alt text](https://x/y.png)\n\n<div>block</div>");
        assert!(out.contains("&lt;b&gt;there&lt;/b&gt;"));
        assert!(!out.contains("<img"));
        assert!(!out.contains("alt text"));
        assert!(out.contains("&lt;div&gt;"));
        assert_well_formed(&format!("<div>{out}</div>"));
    }

    fn assert_no_c0_controls(xml: &str) {
        let bad: Vec<char> = xml
            .chars()
            .filter(|&c| (c < ' ' && !matches!(c, '\t' | '\n' | '\r')) || c == '\u{7f}')
            .collect();
        assert!(bad.is_empty(), "control characters {bad:?} in {xml:?}");
    }

    #[test]
    fn test_markdown_drops_control_character_references() {
        let out = markdown_to_xhtml("Hello &#11; world &#27; and `code &#8;` done");
        assert_no_c0_controls(&out);
        assert!(out.contains("Hello"));
        assert!(out.contains("done"));
    }

    #[test]
    fn test_full_section_with_control_references_is_clean() {
        let mut article = article();
        article.text = Some("Body &#11; x\n\n<span>&#27;[31m</span>".to_string());

        let out = article_section("article-1", &article, ArticleLayout::Full);

        assert_no_c0_controls(&out);
        assert!(out.contains("Body"));
        assert_well_formed(&chapter_xhtml("Feed", "en", &out));
    }

    #[test]
    fn test_paragraphs_to_xhtml() {
        assert_eq!(paragraphs_to_xhtml("One\n\n  \n\nTwo & three"), "<p>One</p>\n<p>Two &amp; three</p>\n");
    }

    #[test]
    fn test_full_section_renders_text() {
        let out = article_section("article-1", &article(), ArticleLayout::Full);

        assert!(out.starts_with("<section id=\"article-1\">"));
        assert!(out.contains("<h1>Heading</h1>"));
        assert!(out.contains("&lt;script&gt;"));
        assert!(out.contains("href=\"https://example.com/a?x=1&amp;y=2\""));
        assert!(out.contains(READ_ORIGINAL));
        assert_well_formed(&out);
    }

    #[test]
    fn test_summary_section_strips_html() {
        let out = article_section("article-2", &article(), ArticleLayout::Summary);

        assert!(out.contains("<p>Summary text</p>"));
        assert!(out.contains("<p>Second</p>"));
        assert!(!out.contains("Heading"));
        assert_well_formed(&out);
    }

    #[test]
    fn test_section_without_body_or_link() {
        let bare = Article {
            link: String::new(),
            summary: None,
            text: None,
            ..article()
        };

        for layout in [ArticleLayout::Full, ArticleLayout::Summary] {
            let out = article_section("article-1", &bare, layout);
            assert!(out.contains(NO_CONTENT));
            assert!(!out.contains(READ_ORIGINAL));
        }
    }

    #[test]
    fn test_chapter_with_hostile_title_is_well_formed() {
        let hostile = Article {
            title: "<script>&amp;\x01 \"quoted\" </h2>".to_string(),
            author: "O'Brien & <Sons>".to_string(),
            ..article()
        };
        let sections = article_section("article-1", &hostile, ArticleLayout::Full);

        let out = chapter_xhtml("Feed <One> & Two", "en", &sections);

        assert_well_formed(&out);
        assert!(out.contains("<h1>Feed &lt;One&gt; &amp; Two</h1>"));
    }

    #[test]
    fn test_nav_nests_children() {
        let out = nav_xhtml(&document());

        assert_well_formed(&out);
        assert!(out.contains("epub:type=\"toc\""));
        assert!(out.contains("<li><a href=\"nav.xhtml\">Contents</a></li>"));
        assert!(out.contains("Feed &amp; Co</a>\n<ol>"));
        assert!(out.contains("feed_001.xhtml#article-1"));
    }

    #[test]
    fn test_ncx_play_order_and_depth() {
        let out = toc_ncx(&document());

        assert_well_formed(&out);
        assert!(out.contains("playOrder=\"1\""));
        assert!(out.contains("playOrder=\"3\""));
        assert!(!out.contains("playOrder=\"4\""));
        assert!(out.contains("<meta name=\"dtb:depth\" content=\"2\"/>"));
        assert!(out.contains("content=\"urn:epistle:abc\""));
    }

    #[test]
    fn test_opf_manifest_and_spine() {
        let out = content_opf(&document());

        assert_well_formed(&out);
        assert!(out.contains("<dc:title>2024-01-01 Newspaper</dc:title>"));
        assert!(out.contains("<dc:creator id=\"creator\">Epistle</dc:creator>"));
        assert!(out.contains("2024-01-01T06:00:00Z"));
        assert!(out.contains("properties=\"nav\""));
        let nav = out.find("<itemref idref=\"nav\"/>").unwrap();
        let chapter = out.find("<itemref idref=\"feed_001\"/>").unwrap();
        assert!(nav < chapter);
        assert!(!out.contains("cover-image"));
    }
}
