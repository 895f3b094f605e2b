//! Newspaper assembly and EPUB packaging.
//!
//! [`DocumentAssembler`] turns grouped articles into a [`Document`] (chapters,
//! navigation tree, spine) and [`write_epub`] packages it as an EPUB 3 file.

mod assembler;
mod epub;
mod model;
pub mod render;

use std::path::PathBuf;
use thiserror::Error;

pub use assembler::{DocumentAssembler, CONTENTS_TITLE};
pub use epub::{package, write_epub};
pub use model::{
    default_output_path, ArticleLayout, Chapter, CoverImage, Document, Metadata, TocEntry,
};

#[derive(Debug, Error)]
pub enum AssemblyError {
    /// Every feed was empty or unavailable; no file is produced.
    #[error("No articles to assemble")]
    NoContent,
    #[error("Failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to package EPUB: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("Invalid cover image {}: {reason}", path.display())]
    Cover { path: PathBuf, reason: String },
}
