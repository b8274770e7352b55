//! Root traversal and classification of documents, sidecars, and singles
//! folders.
//!
//! The walk is a flat iteration over the tree; per-folder state lives in an
//! explicit bucket map rather than in traversal-captured variables, and the
//! grouping heuristic runs once per folder over its sorted stems.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::constants::{
    DOCUMENT_EXTENSIONS, LEGACY_SIDECAR_EXT, SIDECAR_EXT, SINGLES_DIR_SUFFIX,
};
use crate::continuation;
use crate::error::SongbookError;
use crate::pages::ErrorSink;
use crate::text::{cmp_ci, ext_of, is_excluded_dir, is_os_artifact, stem_of, strip_prefix_ci};
use crate::types::ReadPreference;

/// A grouped document with no sidecar yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedGroup {
    pub primary: PathBuf,
    /// Continuation volume paths in sort order.
    pub continuations: Vec<PathBuf>,
}

/// Classified scan output: three disjoint sets plus the singles folders.
#[derive(Debug, Default)]
pub struct ScanOutcome {
    /// One sidecar path per logical document that has one.
    pub with_sidecar: Vec<PathBuf>,
    /// Grouped document files lacking any sidecar.
    pub new_documents: Vec<ScannedGroup>,
    /// Folders treated as singles collections.
    pub singles_folders: Vec<PathBuf>,
}

#[derive(Debug, Default)]
struct DirBucket {
    /// Document file names in this folder.
    documents: Vec<String>,
    /// Sidecar file names in this folder.
    sidecars: Vec<String>,
}

enum FileKind {
    Document,
    Sidecar,
    Other,
}

fn classify_name(name: &str) -> FileKind {
    let Some(ext) = ext_of(name) else {
        return FileKind::Other;
    };
    if DOCUMENT_EXTENSIONS
        .iter()
        .any(|known| ext.eq_ignore_ascii_case(known))
    {
        return FileKind::Document;
    }
    if ext.eq_ignore_ascii_case(SIDECAR_EXT) || ext.eq_ignore_ascii_case(LEGACY_SIDECAR_EXT) {
        return FileKind::Sidecar;
    }
    FileKind::Other
}

fn is_singles_dir(name: &str) -> bool {
    name.to_ascii_lowercase().ends_with(SINGLES_DIR_SUFFIX)
}

/// Walk `root` and classify everything beneath it.
///
/// Unreadable entries are reported through `sink` and skipped; a missing or
/// unreadable root yields an empty outcome.
pub fn scan_root(root: &Path, preference: ReadPreference, sink: &dyn ErrorSink) -> ScanOutcome {
    let mut outcome = ScanOutcome::default();
    let mut buckets: BTreeMap<PathBuf, DirBucket> = BTreeMap::new();

    let mut walker = WalkDir::new(root).follow_links(false).into_iter();
    while let Some(entry) = walker.next() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                let path = err
                    .path()
                    .map_or_else(|| root.to_path_buf(), Path::to_path_buf);
                sink.report(
                    "scan",
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
            if entry.depth() == 0 {
                continue;
            }
            if is_excluded_dir(&name) {
                walker.skip_current_dir();
                continue;
            }
            if is_singles_dir(&name) {
                outcome.singles_folders.push(entry.into_path());
                walker.skip_current_dir();
            }
            continue;
        }
        if is_os_artifact(&name) {
            continue;
        }
        let Some(parent) = entry.path().parent().map(Path::to_path_buf) else {
            continue;
        };
        match classify_name(&name) {
            FileKind::Document => buckets.entry(parent).or_default().documents.push(name),
            FileKind::Sidecar => buckets.entry(parent).or_default().sidecars.push(name),
            FileKind::Other => {}
        }
    }

    for (folder, bucket) in buckets {
        classify_folder(&folder, bucket, preference, &mut outcome);
    }
    tracing::debug!(
        scan.with_sidecar = outcome.with_sidecar.len(),
        scan.new_documents = outcome.new_documents.len(),
        scan.singles = outcome.singles_folders.len(),
        "scan complete"
    );
    outcome
}

fn classify_folder(
    folder: &Path,
    bucket: DirBucket,
    preference: ReadPreference,
    outcome: &mut ScanOutcome,
) {
    let mut documents = bucket.documents;
    documents.sort_by(|a, b| cmp_ci(a, b));

    // Lowercased stem → file name, for rebuilding paths from grouped stems.
    let file_by_stem: HashMap<String, &str> = documents
        .iter()
        .map(|name| (stem_of(name).to_ascii_lowercase(), name.as_str()))
        .collect();

    // Lowercased stem → sidecar file names (both generations may exist).
    let mut sidecars_by_stem: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for name in bucket.sidecars {
        sidecars_by_stem
            .entry(stem_of(&name).to_ascii_lowercase())
            .or_default()
            .push(name);
    }

    let stems: Vec<&str> = documents.iter().map(|name| stem_of(name)).collect();
    let mut claimed: HashSet<String> = HashSet::new();

    for group in continuation::group_stems(&stems) {
        let key = group.primary.to_ascii_lowercase();
        // A sidecar claims a group by exact stem, or by the volume-marker
        // pattern the pipeline resolves with ("Concerto.sbm" ↔ "Concerto1.pdf").
        let exact = (sidecars_by_stem.contains_key(&key) && !claimed.contains(&key))
            .then(|| key.clone());
        let matched = exact.or_else(|| {
            sidecars_by_stem
                .keys()
                .find(|stem| !claimed.contains(*stem) && claims_by_pattern(stem, &key))
                .cloned()
        });
        if let Some(stem) = matched {
            if let Some(names) = sidecars_by_stem.get(&stem) {
                outcome.with_sidecar.push(folder.join(pick_sidecar(names, preference)));
            }
            claimed.insert(stem);
            continue;
        }
        let Some(primary_name) = file_by_stem.get(&key) else {
            continue;
        };
        let continuations = group
            .continuations
            .iter()
            .filter_map(|stem| file_by_stem.get(&stem.to_ascii_lowercase()))
            .map(|name| folder.join(name))
            .collect();
        outcome.new_documents.push(ScannedGroup {
            primary: folder.join(primary_name),
            continuations,
        });
    }

    // Orphan sidecars keep flowing: the pipeline resolves their physical file
    // by pattern, or excludes them when nothing is reachable.
    for (stem, names) in &sidecars_by_stem {
        if !claimed.contains(stem) {
            outcome.with_sidecar.push(folder.join(pick_sidecar(names, preference)));
        }
    }
}

/// True when a document stem is the sidecar stem plus a volume marker
/// (digit-led remainder), matching the pipeline's pattern resolution.
fn claims_by_pattern(sidecar_stem: &str, primary_stem: &str) -> bool {
    strip_prefix_ci(primary_stem, sidecar_stem)
        .and_then(|rest| rest.chars().next())
        .is_some_and(|c| c.is_ascii_digit())
}

fn pick_sidecar<'a>(names: &'a [String], preference: ReadPreference) -> &'a str {
    let preferred = match preference {
        ReadPreference::PreferCompact => SIDECAR_EXT,
        ReadPreference::PreferLegacy => LEGACY_SIDECAR_EXT,
    };
    names
        .iter()
        .find(|name| ext_of(name).is_some_and(|ext| ext.eq_ignore_ascii_case(preferred)))
        .or_else(|| names.first())
        .map_or("", String::as_str)
}
