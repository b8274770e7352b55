//! Conditional persistence of compact sidecars.

use std::io::Write as _;
use std::path::Path;

use atomic_write_file::AtomicWriteFile;
use chrono::Utc;

use crate::error::{Result, SongbookError};
use crate::sidecar::compact;
use crate::types::BookMetadata;

/// Persist `book` to its sidecar path when dirty (or when `force` is set).
///
/// Returns `true` only when a write happened. Failures are logged and leave
/// the dirty flag set so a later save can retry.
pub fn save_if_dirty(book: &mut BookMetadata, force: bool) -> bool {
    if !book.dirty && !force {
        return false;
    }
    match persist(book) {
        Ok(()) => {
            book.dirty = false;
            book.last_written = Some(Utc::now());
            true
        }
        Err(err) => {
            tracing::warn!(
                book.path = %book.source_path.display(),
                error = %err,
                "sidecar save failed"
            );
            false
        }
    }
}

/// Save every dirty book; returns the number persisted.
pub fn save_all_dirty(books: &mut [BookMetadata]) -> usize {
    let mut saved = 0;
    for book in &mut *books {
        if book.dirty && save_if_dirty(book, false) {
            saved += 1;
        }
    }
    saved
}

fn persist(book: &BookMetadata) -> Result<()> {
    let path = book.sidecar_path();
    let text = compact::to_string(book)?;
    write_text(&path, &text)
}

/// Atomically replace `path` with `text`.
pub(crate) fn write_text(path: &Path, text: &str) -> Result<()> {
    let write_err = |err: std::io::Error| SongbookError::Write {
        path: path.to_path_buf(),
        reason: err.to_string(),
    };
    let mut file = AtomicWriteFile::open(path).map_err(write_err)?;
    file.write_all(text.as_bytes()).map_err(write_err)?;
    file.commit().map_err(write_err)?;
    tracing::debug!(sidecar.path = %path.display(), sidecar.bytes = text.len(), "sidecar written");
    Ok(())
}
