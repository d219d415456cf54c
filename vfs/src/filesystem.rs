use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::provider::{FileStat, ScanKind, VfsFuture, VfsProvider};
use crate::time::FileTime;

/// File system VFS provider for reading and writing project trees on disk.
///
/// The root path is joined with the VFS path to form the actual filesystem
/// path. All I/O is blocking (`std::fs`) inside the returned futures, so
/// they complete on the first poll.
///
/// Path traversal is prevented by the VFS path normalization which rejects
/// `..` segments before they reach the provider.
///
/// # Example
///
/// ```ignore
/// let mut vfs = Vfs::new();
/// vfs.mount("data", FileSystemProvider::new("./Data"));
///
/// // Reads ./Data/Textures/brick.png
/// let bytes = poll_now(vfs.read("data/Textures/brick.png"))?;
/// ```
pub struct FileSystemProvider {
    root: PathBuf,
}

impl FileSystemProvider {
    /// Create a provider rooted at the given directory.
    ///
    /// The directory does not need to exist yet.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a VFS path to a full filesystem path.
    fn resolve(&self, path: &str) -> PathBuf {
        if path.is_empty() {
            self.root.clone()
        } else {
            self.root.join(path)
        }
    }
}

fn relative_name(base: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(base).ok()?;
    let name = relative.to_string_lossy().replace('\\', "/");
    if name.is_empty() { None } else { Some(name) }
}

impl VfsProvider for FileSystemProvider {
    fn read(&self, path: &str) -> VfsFuture<Vec<u8>> {
        let full_path = self.resolve(path);
        Box::pin(async move { Ok(std::fs::read(full_path)?) })
    }

    fn exists(&self, path: &str) -> VfsFuture<bool> {
        let full_path = self.resolve(path);
        Box::pin(async move { Ok(full_path.is_file()) })
    }

    fn stat(&self, path: &str) -> VfsFuture<Option<FileStat>> {
        let full_path = self.resolve(path);
        Box::pin(async move {
            let metadata = match std::fs::metadata(&full_path) {
                Ok(metadata) => metadata,
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
                Err(err) => return Err(err.into()),
            };
            Ok(Some(FileStat {
                is_dir: metadata.is_dir(),
                modified: FileTime::from(metadata.modified()?),
            }))
        })
    }

    fn list_dir(&self, path: &str) -> VfsFuture<Vec<String>> {
        let full_path = self.resolve(path);
        Box::pin(async move {
            if !full_path.is_dir() {
                return Ok(Vec::new());
            }
            let mut entries = Vec::new();
            for entry in std::fs::read_dir(full_path)? {
                let entry = entry?;
                if let Some(name) = entry.file_name().to_str() {
                    entries.push(name.to_owned());
                }
            }
            entries.sort();
            Ok(entries)
        })
    }

    fn scan(&self, path: &str, kind: ScanKind) -> VfsFuture<Vec<String>> {
        let full_path = self.resolve(path);
        Box::pin(async move {
            if !full_path.is_dir() {
                return Ok(Vec::new());
            }
            let mut entries = Vec::new();
            for entry in WalkDir::new(&full_path).min_depth(1) {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(err) => {
                        // Entries may vanish while walking; skip them.
                        log::debug!("Skipping unreadable entry under {:?}: {err}", full_path);
                        continue;
                    }
                };
                let wanted = match kind {
                    ScanKind::Files => entry.file_type().is_file(),
                    ScanKind::Dirs => entry.file_type().is_dir(),
                };
                if wanted && let Some(name) = relative_name(&full_path, entry.path()) {
                    entries.push(name);
                }
            }
            entries.sort();
            Ok(entries)
        })
    }

    fn is_read_only(&self) -> bool {
        false
    }

    fn write(&self, path: &str, data: Vec<u8>) -> VfsFuture<()> {
        let full_path = self.resolve(path);
        Box::pin(async move {
            if let Some(parent) = full_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(full_path, data)?;
            Ok(())
        })
    }

    fn delete(&self, path: &str) -> VfsFuture<()> {
        let full_path = self.resolve(path);
        Box::pin(async move {
            std::fs::remove_file(full_path)?;
            Ok(())
        })
    }

    fn create_dir(&self, path: &str) -> VfsFuture<()> {
        let full_path = self.resolve(path);
        Box::pin(async move {
            std::fs::create_dir_all(full_path)?;
            Ok(())
        })
    }

    fn remove_dir(&self, path: &str) -> VfsFuture<()> {
        let full_path = self.resolve(path);
        Box::pin(async move {
            std::fs::remove_dir_all(full_path)?;
            Ok(())
        })
    }
}
