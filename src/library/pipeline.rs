//! Concurrent load of scanner output into a [`Library`].
//!
//! One task per classified document, singles folder, or new file; workers
//! compete for tasks over a bounded channel, so completion order is
//! non-deterministic and load balances naturally. A failing task is reported
//! and excluded; siblings proceed.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::thread;

use crossbeam_channel::bounded;
use regex::Regex;

use crate::constants::{DOCUMENT_EXTENSIONS, LEGACY_SIDECAR_EXT, SIDECAR_EXT, TASK_CHANNEL_CAP};
use crate::error::Result;
use crate::library::scanner::{self, ScanOutcome, ScannedGroup};
use crate::library::{FolderIndex, Library, LoadReport};
use crate::lock_unpoisoned;
use crate::pages::{ErrorSink, PageCountProvider};
use crate::sidecar::reader::{self, ReadOutcome};
use crate::sidecar::{self, writer};
use crate::text::{cmp_ci, stem_of, title_from_stem};
use crate::types::{BookMetadata, LoadOptions, ReadPreference, TocEntry, Volume, book_folder};

/// Orchestrates scan → parallel load → auto-save for one root.
pub struct LoadPipeline<'a> {
    provider: &'a dyn PageCountProvider,
    sink: &'a dyn ErrorSink,
    options: LoadOptions,
}

enum LoadTask {
    Sidecar(PathBuf),
    Singles(PathBuf),
    NewDocument(ScannedGroup),
}

impl LoadTask {
    fn context(&self) -> &'static str {
        match self {
            Self::Sidecar(_) => "load/sidecar",
            Self::Singles(_) => "load/singles",
            Self::NewDocument(_) => "load/new",
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct WorkerStats {
    loaded: usize,
    excluded: usize,
    failed: usize,
}

impl<'a> LoadPipeline<'a> {
    #[must_use]
    pub fn new(provider: &'a dyn PageCountProvider, sink: &'a dyn ErrorSink) -> Self {
        Self {
            provider,
            sink,
            options: LoadOptions::default(),
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: LoadOptions) -> Self {
        self.options = options;
        self
    }

    /// Scan `root` and load everything found beneath it.
    pub fn load(&self, root: &Path) -> LoadReport {
        let outcome = scanner::scan_root(root, self.options.read_preference, self.sink);
        self.run(root, outcome)
    }

    fn run(&self, root: &Path, outcome: ScanOutcome) -> LoadReport {
        let mut tasks: Vec<LoadTask> = Vec::new();
        tasks.extend(outcome.with_sidecar.into_iter().map(LoadTask::Sidecar));
        tasks.extend(outcome.singles_folders.into_iter().map(LoadTask::Singles));
        tasks.extend(outcome.new_documents.into_iter().map(LoadTask::NewDocument));

        let worker_count = match self.options.workers {
            0 => num_cpus::get(),
            configured => configured,
        }
        .clamp(1, tasks.len().max(1));

        let books: Mutex<Vec<BookMetadata>> = Mutex::new(Vec::new());
        let folders: Mutex<FolderIndex> = Mutex::new(FolderIndex::new());
        let (task_tx, task_rx) = bounded::<LoadTask>(TASK_CHANNEL_CAP);
        let mut stats = WorkerStats::default();

        thread::scope(|scope| {
            let mut handles = Vec::with_capacity(worker_count);
            for worker_index in 0..worker_count {
                let task_rx = task_rx.clone();
                let books = &books;
                let folders = &folders;
                let spawned = thread::Builder::new()
                    .name(format!("load-worker-{worker_index}"))
                    .spawn_scoped(scope, move || {
                        let mut local = WorkerStats::default();
                        for task in task_rx.iter() {
                            self.run_task(root, &task, books, folders, &mut local);
                        }
                        local
                    });
                match spawned {
                    Ok(handle) => handles.push(handle),
                    Err(err) => self.sink.report("load/spawn", &err.into()),
                }
            }
            drop(task_rx);

            for task in tasks {
                if task_tx.send(task).is_err() {
                    break;
                }
            }
            drop(task_tx);

            for handle in handles {
                match handle.join() {
                    Ok(local) => {
                        stats.loaded += local.loaded;
                        stats.excluded += local.excluded;
                        stats.failed += local.failed;
                    }
                    Err(_) => stats.failed += 1,
                }
            }
        });

        let mut books = books.into_inner().unwrap_or_else(std::sync::PoisonError::into_inner);
        books.sort_by(|a, b| {
            cmp_ci(
                &a.source_path.to_string_lossy(),
                &b.source_path.to_string_lossy(),
            )
        });
        let saved = writer::save_all_dirty(&mut books);
        let folders = folders
            .into_inner()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        tracing::debug!(
            load.books = books.len(),
            load.excluded = stats.excluded,
            load.failed = stats.failed,
            load.saved = saved,
            "library load complete"
        );
        LoadReport {
            library: Library { books, folders },
            loaded: stats.loaded,
            excluded: stats.excluded,
            failed: stats.failed,
            saved,
        }
    }

    fn run_task(
        &self,
        root: &Path,
        task: &LoadTask,
        books: &Mutex<Vec<BookMetadata>>,
        folders: &Mutex<FolderIndex>,
        local: &mut WorkerStats,
    ) {
        let produced = match task {
            LoadTask::Sidecar(path) => self.load_sidecar(path),
            LoadTask::Singles(folder) => self.load_singles(folder),
            LoadTask::NewDocument(group) => self.load_new_document(group),
        };
        match produced {
            Ok(Some(book)) => {
                record_folder(root, &book, folders);
                lock_unpoisoned(books).push(book);
                local.loaded += 1;
            }
            Ok(None) => local.excluded += 1,
            Err(err) => {
                self.sink.report(task.context(), &err);
                local.failed += 1;
            }
        }
    }

    fn load_sidecar(&self, sidecar_path: &Path) -> Result<Option<BookMetadata>> {
        let primary = resolve_primary(sidecar_path);
        match reader::read_book(sidecar_path, &primary, self.provider, self.sink)? {
            ReadOutcome::Loaded(book) => Ok(Some(book)),
            ReadOutcome::Excluded => Ok(None),
        }
    }

    fn load_singles(&self, folder: &Path) -> Result<Option<BookMetadata>> {
        let mut book = match locate_singles_sidecar(folder, self.options.read_preference) {
            Some(path) => {
                let text = fs_err::read_to_string(&path)?;
                let mut parsed = sidecar::parse_sidecar(&text, &path)?;
                parsed.source_path = folder.to_path_buf();
                parsed.singles = true;
                parsed
            }
            None => {
                // First sighting of this folder: a dirty shell, reconciled below.
                let mut shell = BookMetadata::new(folder.to_path_buf(), true);
                shell.dirty = true;
                shell
            }
        };
        self.reconcile_singles(folder, &mut book)?;
        Ok(Some(book))
    }

    /// Bring a singles book in line with the physical folder contents.
    fn reconcile_singles(&self, folder: &Path, book: &mut BookMetadata) -> Result<()> {
        let present = document_files_in(folder)?;
        let present_keys: HashSet<String> =
            present.iter().map(|name| name.to_ascii_lowercase()).collect();

        let volumes_before = book.volumes.clone();
        let toc_before = book.toc.clone();

        book.volumes
            .retain(|volume| present_keys.contains(&volume.file_name.to_ascii_lowercase()));

        let declared: HashSet<String> = book
            .volumes
            .iter()
            .map(|volume| volume.file_name.to_ascii_lowercase())
            .collect();
        for name in &present {
            if declared.contains(&name.to_ascii_lowercase()) {
                continue;
            }
            let page_count = self.page_count_or_zero(&folder.join(name));
            book.volumes.push(Volume::new(name.clone(), page_count));
        }
        book.volumes
            .sort_by(|a, b| cmp_ci(&a.file_name, &b.file_name));

        // The TOC of a singles collection mirrors its volume list, one entry
        // per volume at its cumulative starting page.
        let mut page = book.page_offset;
        let mut toc = Vec::with_capacity(book.volumes.len());
        for volume in &book.volumes {
            toc.push(TocEntry::titled(
                title_from_stem(stem_of(&volume.file_name)),
                page,
            ));
            page = page.saturating_add(volume.page_count);
        }
        book.toc = toc;

        if book.volumes != volumes_before || book.toc != toc_before {
            book.dirty = true;
        }
        if book.clamp_last_viewed() {
            book.dirty = true;
        }
        Ok(())
    }

    fn load_new_document(&self, group: &ScannedGroup) -> Result<Option<BookMetadata>> {
        let mut book = BookMetadata::new(group.primary.clone(), false);
        book.dirty = true;
        book.volumes.push(Volume::new(
            file_name_of(&group.primary),
            self.page_count_or_zero(&group.primary),
        ));
        for path in &group.continuations {
            book.volumes
                .push(Volume::new(file_name_of(path), self.page_count_or_zero(path)));
        }
        if book.total_pages() == 0 {
            tracing::debug!(book.path = %group.primary.display(), "unreadable new document, excluding");
            return Ok(None);
        }
        // Short single pieces get their one TOC entry up front; longer books
        // wait for the user to fill in contents.
        if book.total_pages() < self.options.auto_toc_page_limit {
            let title = book.title();
            book.toc.push(TocEntry::titled(title, book.page_offset));
        }
        Ok(Some(book))
    }

    fn page_count_or_zero(&self, path: &Path) -> u32 {
        match self.provider.page_count(path) {
            Ok(count) => count,
            Err(err) => {
                self.sink.report("load/pages", &err);
                0
            }
        }
    }
}

fn record_folder(root: &Path, book: &BookMetadata, folders: &Mutex<FolderIndex>) {
    let folder = book_folder(book);
    let relative = folder
        .strip_prefix(root)
        .unwrap_or(folder)
        .to_string_lossy()
        .into_owned();
    let key = if relative.is_empty() {
        ".".to_string()
    } else {
        relative
    };
    lock_unpoisoned(folders).entry(key).or_default().insert(book.title());
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Sidecar of a singles folder: named after the folder, inside it. Probes
/// the same paths [`BookMetadata::sidecar_path_for`] produces.
fn locate_singles_sidecar(folder: &Path, preference: ReadPreference) -> Option<PathBuf> {
    let name = file_name_of(folder);
    let ordered = match preference {
        ReadPreference::PreferCompact => [SIDECAR_EXT, LEGACY_SIDECAR_EXT],
        ReadPreference::PreferLegacy => [LEGACY_SIDECAR_EXT, SIDECAR_EXT],
    };
    ordered
        .iter()
        .map(|ext| folder.join(format!("{name}.{ext}")))
        .find(|candidate| candidate.is_file())
}

/// Document file names inside one folder, sorted case-insensitively.
fn document_files_in(folder: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in fs_err::read_dir(folder)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with("._") {
            continue;
        }
        let is_document = name.rsplit_once('.').is_some_and(|(_, ext)| {
            DOCUMENT_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        });
        if is_document && entry.path().is_file() {
            names.push(name);
        }
    }
    names.sort_by(|a, b| cmp_ci(a, b));
    Ok(names)
}

/// Resolve the physical primary file for a sidecar: exact stem match first,
/// then a pattern match on the sidecar's base name.
///
/// Always returns a path; an unresolvable sidecar maps to the (nonexistent)
/// exact-match candidate, which the provider then fails on and the reader
/// excludes.
fn resolve_primary(sidecar_path: &Path) -> PathBuf {
    let folder = sidecar_path.parent().unwrap_or(Path::new(""));
    let stem = sidecar_path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();

    let fallback = folder.join(format!("{stem}.{}", DOCUMENT_EXTENSIONS[0]));
    if fallback.is_file() {
        return fallback;
    }

    let Ok(names) = document_files_in(folder) else {
        return fallback;
    };
    // Exact stem under a different case beats a volume-marker variant.
    if let Some(exact) = names
        .iter()
        .find(|name| stem_of(name).eq_ignore_ascii_case(&stem))
    {
        return folder.join(exact);
    }
    let pattern = format!(
        r"(?i)^{}\d.*\.(?:{})$",
        regex::escape(&stem),
        DOCUMENT_EXTENSIONS.join("|")
    );
    if let Ok(matcher) = Regex::new(&pattern) {
        if let Some(matched) = names.iter().find(|name| matcher.is_match(name)) {
            return folder.join(matched);
        }
    }
    fallback
}
