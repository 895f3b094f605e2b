use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use super::AssemblyError;

/// What each article section shows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArticleLayout {
    /// Enriched full text; the table of contents links every article.
    Full,
    /// Feed summary only; the table of contents lists feeds.
    #[default]
    Summary,
}

impl FromStr for ArticleLayout {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "full" => Ok(Self::Full),
            "summary" => Ok(Self::Summary),
            other => Err(format!("unknown article type '{other}' (expected 'full' or 'summary')")),
        }
    }
}

impl fmt::Display for ArticleLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Full => "full",
            Self::Summary => "summary",
        })
    }
}

/// Publication metadata written to the package document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    pub title: String,
    pub author: String,
    pub language: String,
    /// Filled in by the assembler from the document's content.
    pub identifier: String,
    pub modified: DateTime<Utc>,
}

impl Metadata {
    pub fn new(
        title: impl Into<String>,
        author: impl Into<String>,
        language: impl Into<String>,
        modified: DateTime<Utc>,
    ) -> Self {
        Self {
            title: title.into(),
            author: author.into(),
            language: language.into(),
            identifier: String::new(),
            modified,
        }
    }
}

/// Cover image bundled into the package.
#[derive(Clone, PartialEq, Eq)]
pub struct CoverImage {
    pub file_name: String,
    pub media_type: &'static str,
    pub data: Vec<u8>,
}

impl fmt::Debug for CoverImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoverImage")
            .field("file_name", &self.file_name)
            .field("media_type", &self.media_type)
            .field("bytes", &self.data.len())
            .finish()
    }
}

impl CoverImage {
    /// Read an image from disk. The media type comes from the extension.
    pub fn load(path: &Path) -> Result<Self, AssemblyError> {
        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();

        let media_type = media_type_for(&extension).ok_or_else(|| AssemblyError::Cover {
            path: path.to_path_buf(),
            reason: format!("unsupported image type '{extension}'"),
        })?;

        let data = std::fs::read(path).map_err(|e| AssemblyError::Cover {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            file_name: format!("cover.{extension}"),
            media_type,
            data,
        })
    }
}

fn media_type_for(extension: &str) -> Option<&'static str> {
    match extension {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "svg" => Some("image/svg+xml"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}

/// One XHTML content document, one per non-empty feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chapter {
    /// Manifest id, e.g. `feed_001`.
    pub id: String,
    /// Path inside `OEBPS/`, e.g. `feed_001.xhtml`.
    pub file_name: String,
    pub title: String,
    /// Complete XHTML document.
    pub content: String,
}

/// A node of the navigation tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TocEntry {
    pub title: String,
    pub href: String,
    pub children: Vec<TocEntry>,
}

impl TocEntry {
    pub fn new(title: impl Into<String>, href: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            href: href.into(),
            children: Vec::new(),
        }
    }
}

/// An assembled publication, ready to be packaged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub metadata: Metadata,
    pub stylesheet: String,
    pub chapters: Vec<Chapter>,
    pub toc: Vec<TocEntry>,
    /// Manifest ids in reading order, starting with `nav`.
    pub spine: Vec<String>,
    pub cover: Option<CoverImage>,
}

/// Default output location: `{dir}/newspaper_{YYYY-MM-DD}.epub`.
pub fn default_output_path(dir: &Path, date: DateTime<Utc>) -> PathBuf {
    dir.join(format!("newspaper_{}.epub", date.format("%Y-%m-%d")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_layout_parse_and_display() {
        assert_eq!("full".parse::<ArticleLayout>(), Ok(ArticleLayout::Full));
        assert_eq!("Summary".parse::<ArticleLayout>(), Ok(ArticleLayout::Summary));
        assert!("digest".parse::<ArticleLayout>().is_err());
        assert_eq!(ArticleLayout::Full.to_string(), "full");
    }

    #[test]
    fn test_default_output_path() {
        let date = Utc.with_ymd_and_hms(2024, 5, 7, 18, 0, 0).unwrap();
        assert_eq!(
            default_output_path(Path::new("newspapers"), date),
            PathBuf::from("newspapers/newspaper_2024-05-07.epub")
        );
    }

    #[test]
    fn test_cover_load_detects_media_type() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Front.JPG");
        std::fs::write(&path, [0xff, 0xd8, 0xff]).unwrap();

        let cover = CoverImage::load(&path).unwrap();

        assert_eq!(cover.media_type, "image/jpeg");
        assert_eq!(cover.file_name, "cover.jpg");
        assert_eq!(cover.data.len(), 3);
    }

    #[test]
    fn test_cover_load_rejects_unknown_type() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cover.bmp");
        std::fs::write(&path, b"BM").unwrap();

        assert!(matches!(
            CoverImage::load(&path),
            Err(AssemblyError::Cover { .. })
        ));
    }

    #[test]
    fn test_cover_load_missing_file() {
        let result = CoverImage::load(Path::new("/definitely/not/here.png"));
        assert!(matches!(result, Err(AssemblyError::Cover { .. })));
    }
}
