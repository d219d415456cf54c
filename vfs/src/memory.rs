use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use crate::error::VfsError;
use crate::provider::{FileStat, ScanKind, VfsFuture, VfsProvider};
use crate::time::FileTime;

struct MemoryFile {
    data: Vec<u8>,
    modified: FileTime,
}

struct MemoryState {
    files: RwLock<BTreeMap<String, MemoryFile>>,
    /// Logical clock; every write gets a strictly newer modification time.
    clock: AtomicU64,
}

impl MemoryState {
    fn tick(&self) -> FileTime {
        FileTime::from_millis(self.clock.fetch_add(1, Ordering::Relaxed) + 1)
    }

    fn put(&self, path: String, data: Vec<u8>, modified: FileTime) {
        let mut files = self.files.write();
        let current = self.clock.load(Ordering::Relaxed);
        if modified.as_millis() > current {
            self.clock.store(modified.as_millis(), Ordering::Relaxed);
        }
        files.insert(path, MemoryFile { data, modified });
    }
}

/// In-memory VFS provider for tests and tools.
///
/// Thread-safe and mutable even after being mounted in a [`Vfs`](crate::Vfs).
/// Supports both read and write operations.
///
/// Directories are implicit; they exist whenever a file path contains
/// that directory prefix. Modification times come from a logical clock
/// that advances on every write, so staleness checks are deterministic.
///
/// # Example
///
/// ```ignore
/// let mem = MemoryProvider::new();
/// mem.insert("Models/Hero.gltf", gltf_bytes);
/// mem.insert_with_time("Models/AssetPipeline.json", pipeline, FileTime::from_millis(10));
///
/// let mut vfs = Vfs::new();
/// vfs.mount("data", mem);
/// ```
#[derive(Clone)]
pub struct MemoryProvider {
    state: Arc<MemoryState>,
}

impl MemoryProvider {
    /// Create an empty in-memory provider.
    pub fn new() -> Self {
        Self {
            state: Arc::new(MemoryState {
                files: RwLock::new(BTreeMap::new()),
                clock: AtomicU64::new(0),
            }),
        }
    }

    /// Insert a file at the given path with a fresh modification time.
    ///
    /// The path should use forward slashes and have no leading slash.
    /// Overwrites any existing file at the same path.
    pub fn insert(&self, path: impl Into<String>, data: Vec<u8>) {
        let modified = self.state.tick();
        self.state.put(path.into(), data, modified);
    }

    /// Insert a file with an explicit modification time.
    pub fn insert_with_time(&self, path: impl Into<String>, data: Vec<u8>, modified: FileTime) {
        self.state.put(path.into(), data, modified);
    }

    /// Bump the modification time of an existing file, as if it was saved again.
    ///
    /// Returns `false` if the file does not exist.
    pub fn touch(&self, path: &str) -> bool {
        let modified = self.state.tick();
        match self.state.files.write().get_mut(path) {
            Some(file) => {
                file.modified = modified;
                true
            }
            None => false,
        }
    }

    /// Remove a file at the given path, returning its data if it existed.
    pub fn remove(&self, path: &str) -> Option<Vec<u8>> {
        self.state.files.write().remove(path).map(|file| file.data)
    }

    /// Whether a file exists at the given path.
    pub fn contains(&self, path: &str) -> bool {
        self.state.files.read().contains_key(path)
    }

    /// All file paths, sorted.
    pub fn paths(&self) -> Vec<String> {
        self.state.files.read().keys().cloned().collect()
    }
}

impl Default for MemoryProvider {
    fn default() -> Self {
        Self::new()
    }
}

fn dir_prefix(path: &str) -> String {
    if path.is_empty() {
        String::new()
    } else {
        format!("{path}/")
    }
}

impl VfsProvider for MemoryProvider {
    fn read(&self, path: &str) -> VfsFuture<Vec<u8>> {
        let state = self.state.clone();
        let path = path.to_owned();
        Box::pin(async move {
            let files = state.files.read();
            files
                .get(&path)
                .map(|file| file.data.clone())
                .ok_or(VfsError::NotFound(path))
        })
    }

    fn exists(&self, path: &str) -> VfsFuture<bool> {
        let state = self.state.clone();
        let path = path.to_owned();
        Box::pin(async move { Ok(state.files.read().contains_key(&path)) })
    }

    fn stat(&self, path: &str) -> VfsFuture<Option<FileStat>> {
        let state = self.state.clone();
        let path = path.to_owned();
        Box::pin(async move {
            let files = state.files.read();
            if let Some(file) = files.get(&path) {
                return Ok(Some(FileStat {
                    is_dir: false,
                    modified: file.modified,
                }));
            }

            // Implicit directory: newest modification time among its files.
            let prefix = dir_prefix(&path);
            let newest = files
                .range(prefix.clone()..)
                .take_while(|(key, _)| key.starts_with(&prefix))
                .map(|(_, file)| file.modified)
                .max();
            Ok(newest.map(|modified| FileStat {
                is_dir: true,
                modified,
            }))
        })
    }

    fn list_dir(&self, path: &str) -> VfsFuture<Vec<String>> {
        let state = self.state.clone();
        let path = path.to_owned();
        Box::pin(async move {
            let files = state.files.read();
            let prefix = dir_prefix(&path);
            let mut children = BTreeSet::new();

            for key in files.keys() {
                if let Some(rest) = key.strip_prefix(&prefix) {
                    let child = match rest.find('/') {
                        Some(pos) => &rest[..pos],
                        None => rest,
                    };
                    if !child.is_empty() {
                        children.insert(child.to_owned());
                    }
                }
            }

            Ok(children.into_iter().collect())
        })
    }

    fn scan(&self, path: &str, kind: ScanKind) -> VfsFuture<Vec<String>> {
        let state = self.state.clone();
        let path = path.to_owned();
        Box::pin(async move {
            let files = state.files.read();
            let prefix = dir_prefix(&path);
            let mut result = BTreeSet::new();

            for key in files.keys() {
                let Some(rest) = key.strip_prefix(&prefix) else {
                    continue;
                };
                match kind {
                    ScanKind::Files => {
                        result.insert(rest.to_owned());
                    }
                    ScanKind::Dirs => {
                        for (pos, _) in rest.match_indices('/') {
                            result.insert(rest[..pos].to_owned());
                        }
                    }
                }
            }

            Ok(result.into_iter().collect())
        })
    }

    fn is_read_only(&self) -> bool {
        false
    }

    fn write(&self, path: &str, data: Vec<u8>) -> VfsFuture<()> {
        let state = self.state.clone();
        let path = path.to_owned();
        Box::pin(async move {
            let modified = state.tick();
            state.put(path, data, modified);
            Ok(())
        })
    }

    fn delete(&self, path: &str) -> VfsFuture<()> {
        let state = self.state.clone();
        let path = path.to_owned();
        Box::pin(async move {
            state
                .files
                .write()
                .remove(&path)
                .ok_or(VfsError::NotFound(path))?;
            Ok(())
        })
    }

    fn create_dir(&self, _path: &str) -> VfsFuture<()> {
        // Directories are implicit in MemoryProvider
        Box::pin(async { Ok(()) })
    }

    fn remove_dir(&self, path: &str) -> VfsFuture<()> {
        let state = self.state.clone();
        let path = path.to_owned();
        Box::pin(async move {
            let prefix = dir_prefix(&path);
            let mut files = state.files.write();
            let before = files.len();
            files.retain(|key, _| !key.starts_with(&prefix));
            if files.len() == before {
                return Err(VfsError::NotFound(path));
            }
            Ok(())
        })
    }
}
