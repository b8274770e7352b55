#![deny(clippy::all, clippy::pedantic)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![cfg_attr(
    test,
    allow(
        clippy::float_cmp,
        clippy::unreadable_literal,
        clippy::uninlined_format_args
    )
)]
#![allow(clippy::module_name_repetitions)]
//
// Strategic lint exceptions, allowed project-wide:
//
// Documentation lints: internal helpers are self-documenting; public APIs
// still carry proper docs.
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]
//
// Cast safety: casts here are bounded by real-world sizes (page counts,
// volume counts, sidecar text lengths).
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_lossless)]
//
// Style trade-offs kept for readability:
#![allow(clippy::too_many_lines)]
#![allow(clippy::similar_names)]
#![allow(clippy::manual_let_else)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::needless_continue)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::field_reassign_with_default)]
#![allow(clippy::case_sensitive_file_extension_comparisons)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::map_unwrap_or)]
//
// Result wrapping kept so task kinds share one signature in the pipeline.
#![allow(clippy::unnecessary_wraps)]

//! Core library for Songbook: discovery, sidecar metadata, and caching for
//! multi-volume PDF score libraries.
//!
//! The crate walks a root folder of page-bearing documents, infers which
//! physical files are continuation volumes of one logical book
//! ([`continuation`]), reads and repairs a per-book sidecar across two
//! on-disk schema generations ([`sidecar`]), loads everything in parallel
//! into a [`Library`] aggregate ([`library`]), and caches raw volume bytes
//! for fast repeated access ([`cache`]). Page counts come from a
//! [`PageCountProvider`]; failures flow through an [`ErrorSink`] and never
//! abort a batch.

/// The songbook-core crate version (matches `Cargo.toml`).
pub const SONGBOOK_CORE_VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod cache;
pub mod constants;
pub mod continuation;
pub mod error;
pub mod library;
pub mod pages;
pub mod sidecar;
pub mod text;
pub mod types;

pub use cache::{ArtifactCache, VolumeCache, VolumeRead};
pub use continuation::{ContinuationGroup, base_stem, group_stems};
pub use error::{Result, SongbookError};
pub use library::{
    FolderIndex, Library, LoadPipeline, LoadReport, ScanOutcome, ScannedGroup, scan_root,
};
pub use pages::{ErrorSink, PageCountProvider, PdfPageCounter, TraceSink};
pub use sidecar::migrate::{MigrationReport, migrate_tree, verify_equivalent};
pub use sidecar::reader::{ReadOutcome, read_book};
pub use sidecar::writer::{save_all_dirty, save_if_dirty};
pub use sidecar::{SchemaGeneration, locate_sidecar, parse_sidecar, sniff_schema};
pub use types::{
    Annotation, BookMetadata, Favorite, LoadOptions, MigrateOptions, ReadPreference, Rotation,
    TocEntry, Volume,
};

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock a mutex, recovering the guard when a previous holder panicked.
pub(crate) fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
