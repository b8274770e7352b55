//! Sidecar metadata files: location, schema sniffing, and parse dispatch.
//!
//! A sidecar shares its document's base name under one of two extensions: the
//! legacy hierarchical format (`sbx`) and the compact format (`sbm`).
//! Generation is decided by content, never by extension — legacy text is
//! found under either extension in the wild.

pub mod compact;
pub mod legacy;
pub mod migrate;
pub mod reader;
pub mod writer;

use std::path::{Path, PathBuf};

use crate::constants::{LEGACY_SIDECAR_EXT, SIDECAR_EXT};
use crate::error::{Result, SongbookError};
use crate::types::{BookMetadata, ReadPreference};

/// On-disk schema generation of a sidecar file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaGeneration {
    Legacy,
    Compact,
}

/// Classify sidecar text by its first structural character.
#[must_use]
pub fn sniff_schema(text: &str) -> Option<SchemaGeneration> {
    match text.trim_start().as_bytes().first() {
        Some(b'<') => Some(SchemaGeneration::Legacy),
        Some(b'{') => Some(SchemaGeneration::Compact),
        _ => None,
    }
}

/// Locate the sidecar for a document base path, honoring the preference
/// order between generations.
#[must_use]
pub fn locate_sidecar(base: &Path, preference: ReadPreference) -> Option<PathBuf> {
    let ordered = match preference {
        ReadPreference::PreferCompact => [SIDECAR_EXT, LEGACY_SIDECAR_EXT],
        ReadPreference::PreferLegacy => [LEGACY_SIDECAR_EXT, SIDECAR_EXT],
    };
    ordered
        .iter()
        .map(|ext| base.with_extension(ext))
        .find(|candidate| candidate.is_file())
}

/// Parse sidecar text of either generation into a book shell.
///
/// `origin` scopes parse errors to the file they came from; the caller fills
/// `source_path` and `singles` afterwards.
pub fn parse_sidecar(text: &str, origin: &Path) -> Result<BookMetadata> {
    match sniff_schema(text) {
        Some(SchemaGeneration::Legacy) => legacy::parse(text, origin),
        Some(SchemaGeneration::Compact) => compact::parse(text, origin),
        None => Err(SongbookError::Parse {
            path: origin.to_path_buf(),
            reason: "unrecognized sidecar content".into(),
        }),
    }
}
