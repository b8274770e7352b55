//! Error taxonomy for scanning, parsing, migration, and persistence.
//!
//! Every variant except a bare [`SongbookError::Io`] carries the path it is
//! scoped to; batch operations report these through an
//! [`ErrorSink`](crate::pages::ErrorSink) and keep going.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SongbookError>;

#[derive(Debug, Error)]
pub enum SongbookError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    /// A directory could not be read during a scan; the subtree is skipped.
    #[error("cannot scan {}: {reason}", path.display())]
    Scan { path: PathBuf, reason: String },

    /// Sidecar content is malformed; the document is skipped, the file kept.
    #[error("malformed sidecar {}: {reason}", path.display())]
    Parse { path: PathBuf, reason: String },

    /// A migration round-trip produced a document that differs from its
    /// source; the legacy file is retained.
    #[error("migration verify failed for {}: {field}", path.display())]
    VerifyMismatch { path: PathBuf, field: String },

    /// Page-count lookup failed; the volume keeps a zero count and the book
    /// stays dirty for a later repair.
    #[error("page count unavailable for {}: {reason}", path.display())]
    Provider { path: PathBuf, reason: String },

    /// Sidecar persistence failed; the dirty flag is retained for retry.
    #[error("cannot write sidecar {}: {reason}", path.display())]
    Write { path: PathBuf, reason: String },
}
