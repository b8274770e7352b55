//! In-memory byte caches: lazily loaded volume bytes with per-key locking,
//! and a simpler last-writer-wins cache for derived artifacts.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::thread::JoinHandle;

use crate::error::Result;
use crate::lock_unpoisoned;
use crate::types::{BookMetadata, book_folder};

/// Result of a volume lookup that may hit a missing backing file.
#[derive(Debug, Clone)]
pub enum VolumeRead {
    Bytes(Arc<Vec<u8>>),
    /// The backing file does not exist (remote placeholder or deleted
    /// volume).
    Missing,
}

impl VolumeRead {
    #[must_use]
    pub fn bytes(&self) -> Option<&Arc<Vec<u8>>> {
        match self {
            Self::Bytes(bytes) => Some(bytes),
            Self::Missing => None,
        }
    }
}

/// Lazy per-volume byte cache with double-checked locking.
///
/// Two lock granularities: the `slots` and `locks` maps are guarded by coarse
/// mutexes held only for map access, while the per-index lock is held across
/// the disk read. Distinct volumes load independently; concurrent requests
/// for one volume serialize, and late arrivals observe the cached bytes
/// instead of re-reading the file.
#[derive(Debug)]
pub struct VolumeCache {
    folder: PathBuf,
    file_names: Vec<String>,
    slots: Mutex<HashMap<usize, Arc<Vec<u8>>>>,
    locks: Mutex<HashMap<usize, Arc<Mutex<()>>>>,
}

impl VolumeCache {
    #[must_use]
    pub fn new(folder: PathBuf, file_names: Vec<String>) -> Self {
        Self {
            folder,
            file_names,
            slots: Mutex::new(HashMap::new()),
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Cache covering every volume of `book`.
    #[must_use]
    pub fn for_book(book: &BookMetadata) -> Self {
        Self::new(
            book_folder(book).to_path_buf(),
            book.volumes
                .iter()
                .map(|volume| volume.file_name.clone())
                .collect(),
        )
    }

    #[must_use]
    pub fn volume_count(&self) -> usize {
        self.file_names.len()
    }

    fn volume_path(&self, index: usize) -> Option<PathBuf> {
        self.file_names
            .get(index)
            .map(|name| self.folder.join(name))
    }

    /// Cached bytes if present; never blocks on a load in progress.
    #[must_use]
    pub fn get_cached(&self, index: usize) -> Option<Arc<Vec<u8>>> {
        lock_unpoisoned(&self.slots).get(&index).cloned()
    }

    /// Bytes for volume `index`, reading the backing file at most once.
    pub fn get_or_load(&self, index: usize) -> Result<VolumeRead> {
        if let Some(bytes) = self.get_cached(index) {
            return Ok(VolumeRead::Bytes(bytes));
        }
        let Some(path) = self.volume_path(index) else {
            return Ok(VolumeRead::Missing);
        };

        let slot = {
            let mut locks = lock_unpoisoned(&self.locks);
            Arc::clone(locks.entry(index).or_insert_with(|| Arc::new(Mutex::new(()))))
        };
        let _guard = lock_unpoisoned(&slot);

        // A concurrent holder of this slot may have finished the read.
        if let Some(bytes) = self.get_cached(index) {
            return Ok(VolumeRead::Bytes(bytes));
        }
        if !path.is_file() {
            return Ok(VolumeRead::Missing);
        }
        let bytes = Arc::new(fs_err::read(&path)?);
        lock_unpoisoned(&self.slots).insert(index, Arc::clone(&bytes));
        tracing::debug!(
            volume.path = %path.display(),
            volume.bytes = bytes.len(),
            "volume cached"
        );
        Ok(VolumeRead::Bytes(bytes))
    }

    /// Schedule a background load of every known volume.
    pub fn preload_all(self: Arc<Self>) -> Result<JoinHandle<()>> {
        let cache = self;
        let handle = std::thread::Builder::new()
            .name("volume-preload".into())
            .spawn(move || {
                for index in 0..cache.volume_count() {
                    if let Err(err) = cache.get_or_load(index) {
                        tracing::debug!(volume.index = index, error = %err, "preload failed");
                    }
                }
            })?;
        Ok(handle)
    }

    /// Drop cached bytes while keeping the per-index locks.
    ///
    /// Retaining the locks prevents a concurrent load from installing a
    /// second lock for the same index and re-reading the file. Callers must
    /// ensure no `get_or_load` for this cache is in flight.
    pub fn clear(&self) {
        lock_unpoisoned(&self.slots).clear();
    }
}

/// Compute-once cache for derived artifacts (previews, thumbnails).
///
/// Last writer wins under a single `RwLock`; a racing producer may compute
/// redundantly, which is a performance concern, not a correctness one.
#[derive(Debug, Default)]
pub struct ArtifactCache<T> {
    slots: RwLock<HashMap<usize, Arc<T>>>,
}

impl<T> ArtifactCache<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: RwLock::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<Arc<T>> {
        self.slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&index)
            .cloned()
    }

    /// Cached artifact for `index`, producing it when absent.
    pub fn get_or_insert_with(&self, index: usize, produce: impl FnOnce() -> T) -> Arc<T> {
        if let Some(found) = self.get(index) {
            return found;
        }
        let artifact = Arc::new(produce());
        self.slots
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(index, Arc::clone(&artifact));
        artifact
    }

    pub fn clear(&self) {
        self.slots
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::sync::Barrier;
    use tempfile::tempdir;

    fn cache_with_file(dir: &Path, name: &str, content: &[u8]) -> VolumeCache {
        std::fs::write(dir.join(name), content).expect("write volume");
        VolumeCache::new(dir.to_path_buf(), vec![name.to_string()])
    }

    #[test]
    fn loads_once_and_serves_from_memory() {
        let dir = tempdir().expect("tmp");
        let cache = cache_with_file(dir.path(), "a.pdf", b"volume bytes");

        assert!(cache.get_cached(0).is_none());
        let first = cache.get_or_load(0).expect("load");
        let first = first.bytes().expect("present");
        assert_eq!(first.as_slice(), b"volume bytes");

        // Remove the backing file: a cached volume must not re-read it.
        std::fs::remove_file(dir.path().join("a.pdf")).expect("remove");
        let second = cache.get_or_load(0).expect("cached");
        let second = second.bytes().expect("still present");
        assert!(Arc::ptr_eq(first, second));
    }

    #[test]
    fn missing_backing_file_is_explicit() {
        let dir = tempdir().expect("tmp");
        let cache = VolumeCache::new(dir.path().to_path_buf(), vec!["gone.pdf".to_string()]);
        assert!(matches!(
            cache.get_or_load(0).expect("load"),
            VolumeRead::Missing
        ));
        assert!(matches!(
            cache.get_or_load(7).expect("out of range"),
            VolumeRead::Missing
        ));
    }

    #[test]
    fn concurrent_readers_observe_one_physical_read() {
        let dir = tempdir().expect("tmp");
        let payload: Vec<u8> = (0..256).map(|_| fastrand::u8(..)).collect();
        let cache = Arc::new(cache_with_file(dir.path(), "big.pdf", &payload));

        let threads = 8;
        let barrier = Arc::new(Barrier::new(threads));
        let mut handles = Vec::new();
        for _ in 0..threads {
            let cache = Arc::clone(&cache);
            let barrier = Arc::clone(&barrier);
            handles.push(std::thread::spawn(move || {
                barrier.wait();
                let read = cache.get_or_load(0).expect("load");
                read.bytes().expect("present").clone()
            }));
        }
        let results: Vec<Arc<Vec<u8>>> =
            handles.into_iter().map(|h| h.join().expect("join")).collect();

        // One read means one allocation: every caller holds the same Arc.
        for result in &results {
            assert!(Arc::ptr_eq(result, &results[0]));
            assert_eq!(result.as_slice(), payload.as_slice());
        }
    }

    #[test]
    fn clear_drops_bytes_but_keeps_the_lock_table() {
        let dir = tempdir().expect("tmp");
        let cache = cache_with_file(dir.path(), "a.pdf", b"bytes");
        cache.get_or_load(0).expect("load");
        assert_eq!(lock_unpoisoned(&cache.locks).len(), 1);

        cache.clear();
        assert!(cache.get_cached(0).is_none());
        assert_eq!(lock_unpoisoned(&cache.locks).len(), 1);
    }

    #[test]
    fn preload_fills_every_slot() {
        let dir = tempdir().expect("tmp");
        std::fs::write(dir.path().join("a.pdf"), b"aa").expect("write");
        std::fs::write(dir.path().join("b.pdf"), b"bb").expect("write");
        let cache = Arc::new(VolumeCache::new(
            dir.path().to_path_buf(),
            vec!["a.pdf".to_string(), "b.pdf".to_string(), "gone.pdf".to_string()],
        ));

        cache.clone().preload_all().expect("spawn").join().expect("join");
        assert!(cache.get_cached(0).is_some());
        assert!(cache.get_cached(1).is_some());
        assert!(cache.get_cached(2).is_none());
    }

    #[test]
    fn artifact_cache_returns_cached_values() {
        let cache: ArtifactCache<String> = ArtifactCache::new();
        let first = cache.get_or_insert_with(3, || "preview".to_string());
        let second = cache.get_or_insert_with(3, || unreachable!("already cached"));
        assert!(Arc::ptr_eq(&first, &second));

        cache.clear();
        assert!(cache.get(3).is_none());
    }
}
