//! Legacy→compact sidecar migration with round-trip verification.
//!
//! Every candidate is parsed, serialized to the compact schema, re-parsed,
//! and compared field-by-field against the original before anything touches
//! the disk. The legacy file is removed only on explicit request, and only
//! after a verified write.

use std::path::Path;

use walkdir::WalkDir;

use crate::constants::{LEGACY_SIDECAR_EXT, SIDECAR_EXT};
use crate::error::SongbookError;
use crate::pages::ErrorSink;
use crate::sidecar::{self, SchemaGeneration, compact, writer};
use crate::text::{ext_of, is_excluded_dir, is_os_artifact};
use crate::types::{BookMetadata, MigrateOptions};

/// Aggregate counts for one migration sweep.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MigrationReport {
    /// Legacy sidecars converted and written under the compact extension.
    pub converted: usize,
    /// Candidates skipped because the compact target already exists.
    pub skipped_existing: usize,
    pub parse_failures: usize,
    pub verify_failures: usize,
    /// Legacy files removed after a verified write.
    pub deleted: usize,
}

/// Migrate every legacy-schema sidecar under `root`.
///
/// Candidates are files under either sidecar extension whose content sniffs
/// as the legacy generation. Failures are reported through `sink` and
/// counted; no failure aborts the sweep.
pub fn migrate_tree(root: &Path, options: MigrateOptions, sink: &dyn ErrorSink) -> MigrationReport {
    let mut report = MigrationReport::default();
    let mut walker = WalkDir::new(root).follow_links(false).into_iter();
    while let Some(entry) = walker.next() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                let path = err
                    .path()
                    .map_or_else(|| root.to_path_buf(), Path::to_path_buf);
                sink.report(
                    "migrate/scan",
                    &SongbookError::Scan {
                        path,
                        reason: err.to_string(),
                    },
                );
                continue;
            }
        };
        let name = entry.file_name().to_string_lossy().into_owned();
        if entry.file_type().is_dir() {
            if entry.depth() > 0 && is_excluded_dir(&name) {
                walker.skip_current_dir();
            }
            continue;
        }
        if is_os_artifact(&name) || !has_sidecar_extension(&name) {
            continue;
        }
        migrate_file(entry.path(), options, sink, &mut report);
    }
    tracing::debug!(
        migrate.converted = report.converted,
        migrate.verify_failures = report.verify_failures,
        migrate.parse_failures = report.parse_failures,
        "migration sweep complete"
    );
    report
}

fn has_sidecar_extension(name: &str) -> bool {
    ext_of(name).is_some_and(|ext| {
        ext.eq_ignore_ascii_case(SIDECAR_EXT) || ext.eq_ignore_ascii_case(LEGACY_SIDECAR_EXT)
    })
}

fn migrate_file(
    path: &Path,
    options: MigrateOptions,
    sink: &dyn ErrorSink,
    report: &mut MigrationReport,
) {
    let text = match fs_err::read_to_string(path) {
        Ok(text) => text,
        Err(err) => {
            report.parse_failures += 1;
            sink.report("migrate/read", &err.into());
            return;
        }
    };
    match sidecar::sniff_schema(&text) {
        Some(SchemaGeneration::Legacy) => {}
        Some(SchemaGeneration::Compact) => return,
        None => {
            report.parse_failures += 1;
            sink.report(
                "migrate/sniff",
                &SongbookError::Parse {
                    path: path.to_path_buf(),
                    reason: "unrecognized sidecar content".into(),
                },
            );
            return;
        }
    }

    let original = match sidecar::legacy::parse(&text, path) {
        Ok(book) => book,
        Err(err) => {
            report.parse_failures += 1;
            sink.report("migrate/parse", &err);
            return;
        }
    };

    // Round-trip through the compact codec before touching the disk.
    let serialized = match compact::to_string(&original) {
        Ok(serialized) => serialized,
        Err(err) => {
            report.parse_failures += 1;
            sink.report("migrate/encode", &err);
            return;
        }
    };
    let reparsed = match compact::parse(&serialized, path) {
        Ok(book) => book,
        Err(err) => {
            report.parse_failures += 1;
            sink.report("migrate/reparse", &err);
            return;
        }
    };
    if let Err(field) = verify_equivalent(&original, &reparsed) {
        report.verify_failures += 1;
        sink.report(
            "migrate/verify",
            &SongbookError::VerifyMismatch {
                path: path.to_path_buf(),
                field,
            },
        );
        return;
    }

    let target = path.with_extension(SIDECAR_EXT);
    if target.exists() {
        report.skipped_existing += 1;
        return;
    }
    if let Err(err) = writer::write_text(&target, &serialized) {
        sink.report("migrate/write", &err);
        return;
    }
    report.converted += 1;

    if options.delete_legacy {
        match fs_err::remove_file(path) {
            Ok(()) => report.deleted += 1,
            Err(err) => sink.report("migrate/delete", &err.into()),
        }
    }
}

/// Field-by-field equivalence between a source document and its round-tripped
/// serialization: every scalar, and for every list the count plus each
/// element's salient fields.
///
/// Returns the first mismatching field on failure.
pub fn verify_equivalent(
    original: &BookMetadata,
    reparsed: &BookMetadata,
) -> std::result::Result<(), String> {
    if original.page_offset != reparsed.page_offset {
        return Err("page offset".into());
    }
    if original.last_viewed_page != reparsed.last_viewed_page {
        return Err("last viewed page".into());
    }
    if original.notes != reparsed.notes {
        return Err("notes".into());
    }
    if original.volumes.len() != reparsed.volumes.len() {
        return Err("volume count".into());
    }
    for (index, (a, b)) in original.volumes.iter().zip(&reparsed.volumes).enumerate() {
        if a.page_count != b.page_count || a.file_name != b.file_name {
            return Err(format!("volume {}", index + 1));
        }
    }
    if original.toc.len() != reparsed.toc.len() {
        return Err("toc count".into());
    }
    for (index, (a, b)) in original.toc.iter().zip(&reparsed.toc).enumerate() {
        if a.title != b.title || a.page != b.page {
            return Err(format!("toc entry {}", index + 1));
        }
    }
    if original.favorites.len() != reparsed.favorites.len() {
        return Err("favorite count".into());
    }
    if original.annotations.len() != reparsed.annotations.len() {
        return Err("annotation count".into());
    }
    Ok(())
}
