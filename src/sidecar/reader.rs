//! Sidecar reading with in-load repair.
//!
//! Repair rules run in a fixed order after a successful parse; each rule that
//! fires marks the book dirty so the auto-save pass rewrites the sidecar.

use std::path::Path;

use crate::error::Result;
use crate::pages::{ErrorSink, PageCountProvider};
use crate::sidecar;
use crate::types::{BookMetadata, TocEntry, Volume};

/// Outcome of loading one document's sidecar.
#[derive(Debug)]
pub enum ReadOutcome {
    Loaded(BookMetadata),
    /// Total pages resolved to zero — usually an unreachable placeholder
    /// file. The caller drops the document from the aggregate.
    Excluded,
}

/// Read and repair the sidecar at `sidecar_path` for the document whose
/// primary physical file is `primary`.
///
/// Parse and I/O failures propagate for the caller to report; the sidecar
/// file itself is never touched on failure.
pub fn read_book(
    sidecar_path: &Path,
    primary: &Path,
    provider: &dyn PageCountProvider,
    sink: &dyn ErrorSink,
) -> Result<ReadOutcome> {
    let text = fs_err::read_to_string(sidecar_path)?;
    let mut book = sidecar::parse_sidecar(&text, sidecar_path)?;
    book.source_path = primary.to_path_buf();
    repair(&mut book, provider, sink);
    if book.total_pages() == 0 {
        tracing::debug!(book.path = %primary.display(), "zero pages, excluding");
        return Ok(ReadOutcome::Excluded);
    }
    Ok(ReadOutcome::Loaded(book))
}

/// Apply the load-time repair rules in order.
pub(crate) fn repair(
    book: &mut BookMetadata,
    provider: &dyn PageCountProvider,
    sink: &dyn ErrorSink,
) {
    let primary = book.source_path.clone();
    let primary_name = primary
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    // Sidecars written before volume tracking carry no volume list.
    if book.volumes.is_empty() {
        let page_count = match provider.page_count(&primary) {
            Ok(count) => count,
            Err(err) => {
                sink.report("repair/pages", &err);
                0
            }
        };
        book.volumes.push(Volume::new(primary_name.clone(), page_count));
        book.dirty = true;
    }

    if let Some(first) = book.volumes.first_mut() {
        if first.file_name.is_empty() {
            first.file_name = primary_name;
            book.dirty = true;
        }
    }

    if book.toc.is_empty() {
        let title = book.title();
        book.toc.push(TocEntry::titled(title, book.page_offset));
        book.dirty = true;
    }

    if book.clamp_last_viewed() {
        book.dirty = true;
    }
}
