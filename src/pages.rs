//! Collaborator interfaces consumed by the load pipeline: page counts and
//! non-fatal error reporting.

use std::path::Path;

use crate::error::{Result, SongbookError};

/// Source of page counts for physical document files.
///
/// Lookups run on pipeline worker threads; implementations must be shareable
/// across threads. A failed lookup is never fatal: callers keep a zero page
/// count and leave the book dirty for a later repair.
pub trait PageCountProvider: Send + Sync {
    fn page_count(&self, path: &Path) -> Result<u32>;
}

/// Default provider backed by `lopdf`.
pub struct PdfPageCounter;

impl PageCountProvider for PdfPageCounter {
    fn page_count(&self, path: &Path) -> Result<u32> {
        let document = lopdf::Document::load(path).map_err(|err| SongbookError::Provider {
            path: path.to_path_buf(),
            reason: err.to_string(),
        })?;
        Ok(document.get_pages().len() as u32)
    }
}

/// Collector for non-fatal, file-scoped failures raised during batch work.
///
/// Reports never abort the batch that raised them.
pub trait ErrorSink: Send + Sync {
    fn report(&self, context: &str, error: &SongbookError);
}

/// Default sink forwarding every report to `tracing`.
pub struct TraceSink;

impl ErrorSink for TraceSink {
    fn report(&self, context: &str, error: &SongbookError) {
        tracing::warn!(context, error = %error, "non-fatal failure");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::content::Content;
    use lopdf::{Document, Object, Stream, dictionary};
    use tempfile::tempdir;

    fn write_pdf(path: &Path, pages: usize) {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let mut kids = Vec::new();
        for _ in 0..pages {
            let content = Content { operations: vec![] };
            let content_id =
                doc.add_object(Stream::new(dictionary! {}, content.encode().expect("encode")));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(Object::Reference(page_id));
        }
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => pages as i64,
            }),
        );
        let catalog_id = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
        doc.trailer.set("Root", catalog_id);
        doc.save(path).expect("save pdf");
    }

    #[test]
    fn counts_pages_of_a_generated_pdf() {
        let dir = tempdir().expect("tmp");
        let path = dir.path().join("three.pdf");
        write_pdf(&path, 3);
        assert_eq!(PdfPageCounter.page_count(&path).expect("count"), 3);
    }

    #[test]
    fn missing_file_is_a_provider_failure() {
        let dir = tempdir().expect("tmp");
        let err = PdfPageCounter
            .page_count(&dir.path().join("absent.pdf"))
            .expect_err("missing file");
        assert!(matches!(err, SongbookError::Provider { .. }));
    }
}
