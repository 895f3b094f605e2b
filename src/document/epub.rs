use std::io::{Cursor, Write};
use std::path::Path;

use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::model::Document;
use super::render::{self, NAV_FILE, NCX_FILE, STYLESHEET_FILE};
use super::AssemblyError;
use crate::util::write_bytes_atomic;

const MIMETYPE: &[u8] = b"application/epub+zip";
const CONTENT_DIR: &str = "OEBPS";

/// Package `doc` as an EPUB 3 container in memory.
///
/// `mimetype` is the first entry and stored uncompressed, as EPUB readers
/// require; everything else is deflated.
pub fn package(doc: &Document) -> Result<Vec<u8>, AssemblyError> {
    let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    let deflated = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));

    zip.start_file("mimetype", stored)?;
    zip.write_all(MIMETYPE).map_err(ZipError::from)?;

    let mut add = |name: String, data: &[u8]| -> Result<(), ZipError> {
        zip.start_file(name, deflated)?;
        zip.write_all(data)?;
        Ok(())
    };

    add("META-INF/container.xml".to_string(), render::CONTAINER_XML.as_bytes())?;
    add(format!("{CONTENT_DIR}/content.opf"), render::content_opf(doc).as_bytes())?;
    add(format!("{CONTENT_DIR}/{NCX_FILE}"), render::toc_ncx(doc).as_bytes())?;
    add(format!("{CONTENT_DIR}/{NAV_FILE}"), render::nav_xhtml(doc).as_bytes())?;
    add(format!("{CONTENT_DIR}/{STYLESHEET_FILE}"), doc.stylesheet.as_bytes())?;
    for chapter in &doc.chapters {
        add(format!("{CONTENT_DIR}/{}", chapter.file_name), chapter.content.as_bytes())?;
    }
    if let Some(cover) = &doc.cover {
        add(format!("{CONTENT_DIR}/{}", cover.file_name), &cover.data)?;
    }

    Ok(zip.finish()?.into_inner())
}

/// Write `doc` to `path`, creating parent directories as needed.
///
/// The file appears atomically: a failed write leaves any previous file at
/// `path` untouched and no partial output behind.
pub fn write_epub(doc: &Document, path: &Path) -> Result<(), AssemblyError> {
    let bytes = package(doc)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| AssemblyError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    write_bytes_atomic(path, &bytes).map_err(|source| AssemblyError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    tracing::info!(
        path = %path.display(),
        chapters = doc.chapters.len(),
        bytes = bytes.len(),
        "EPUB written"
    );
    Ok(())
}
