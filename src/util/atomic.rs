use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Atomically replace `dst` with whatever `write` puts into a fresh file.
///
/// The content goes to a randomly named sibling temp file first, is synced
/// to disk, and only then renamed over `dst`. Readers see either the old file
/// or the complete new one. On any failure the temp file is removed and `dst`
/// is left untouched.
pub fn write_atomic<F>(dst: &Path, write: F) -> io::Result<()>
where
    F: FnOnce(&mut File) -> io::Result<()>,
{
    let temp_path = temp_path_for(dst);

    // create_new fails if the path exists, so a planted symlink is never followed
    let temp_file = OpenOptions::new()
        .write(true)
        .read(true)
        .create_new(true)
        .open(&temp_path)?;

    let result = fill_and_publish(temp_file, write, &temp_path, dst);
    if result.is_err() {
        let _ = std::fs::remove_file(&temp_path);
    }
    result
}

fn fill_and_publish<F>(mut temp_file: File, write: F, temp_path: &Path, dst: &Path) -> io::Result<()>
where
    F: FnOnce(&mut File) -> io::Result<()>,
{
    write(&mut temp_file)?;
    temp_file.sync_all()?;
    // Handle must be closed before rename on Windows
    drop(temp_file);
    replace(temp_path, dst)
}

/// Convenience wrapper for writing a byte buffer atomically.
pub fn write_bytes_atomic(dst: &Path, bytes: &[u8]) -> io::Result<()> {
    write_atomic(dst, |file| io::Write::write_all(file, bytes))
}

fn replace(temp_path: &Path, dst: &Path) -> io::Result<()> {
    // On Windows, rename fails if destination exists
    #[cfg(windows)]
    if dst.exists() {
        std::fs::remove_file(dst)?;
    }

    std::fs::rename(temp_path, dst)
}

fn temp_path_for(dst: &Path) -> PathBuf {
    let random_suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let file_name = dst
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    dst.with_file_name(format!(".{file_name}.tmp.{random_suffix:016x}"))
}
