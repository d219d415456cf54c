use std::future::Future;
use std::pin::Pin;

use crate::{FileTime, VfsError};

/// A boxed, `Send` future returning a `Result`.
///
/// All [`VfsProvider`] methods return this type. The futures are `Send + 'static`
/// so they can be spawned on any async runtime or driven with
/// [`poll_now`](crate::poll_now).
pub type VfsFuture<T> = Pin<Box<dyn Future<Output = Result<T, VfsError>> + Send>>;

/// Metadata of a single path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    pub is_dir: bool,
    pub modified: FileTime,
}

/// Which entries a recursive [`scan`](VfsProvider::scan) reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanKind {
    Files,
    Dirs,
}

/// Trait for virtual file system backends.
///
/// Providers implement byte-level I/O operations. The returned futures do NOT
/// drive themselves; the caller polls them.
///
/// # Read vs Write
///
/// All providers must implement read operations (`read`, `exists`, `stat`,
/// `list_dir`, `scan`). Write operations (`write`, `delete`, `create_dir`,
/// `remove_dir`) have default implementations that return
/// [`VfsError::ReadOnly`].
///
/// # Path Contract
///
/// Paths passed to provider methods are already normalized by the [`Vfs`](crate::Vfs)
/// router: forward slashes, no leading/trailing slashes, no `..` or `.` segments.
/// The path is relative to the provider's root (the source prefix has been stripped)
/// and is empty for the provider root itself.
pub trait VfsProvider: Send + Sync + 'static {
    // --- Read operations (required) ---

    /// Read the entire contents of a file at the given path.
    fn read(&self, path: &str) -> VfsFuture<Vec<u8>>;

    /// Check whether a file exists at the given path.
    fn exists(&self, path: &str) -> VfsFuture<bool>;

    /// Query metadata. Resolves to `None` when the path does not exist.
    fn stat(&self, path: &str) -> VfsFuture<Option<FileStat>>;

    /// List the immediate children of a directory.
    ///
    /// Returns file and directory names (not full paths).
    /// Returns an empty vec for non-existent directories.
    fn list_dir(&self, path: &str) -> VfsFuture<Vec<String>>;

    /// Recursively list all files or directories below `path`.
    ///
    /// Returned paths are relative to `path`, use forward slashes and are
    /// sorted. Returns an empty vec for non-existent directories.
    fn scan(&self, path: &str, kind: ScanKind) -> VfsFuture<Vec<String>>;

    // --- Write operations (optional, default returns ReadOnly) ---

    /// Whether this provider is read-only.
    fn is_read_only(&self) -> bool {
        true
    }

    /// Write data to a file, creating or overwriting it.
    fn write(&self, _path: &str, _data: Vec<u8>) -> VfsFuture<()> {
        Box::pin(async { Err(VfsError::ReadOnly) })
    }

    /// Delete a file at the given path.
    fn delete(&self, _path: &str) -> VfsFuture<()> {
        Box::pin(async { Err(VfsError::ReadOnly) })
    }

    /// Create a directory at the given path.
    fn create_dir(&self, _path: &str) -> VfsFuture<()> {
        Box::pin(async { Err(VfsError::ReadOnly) })
    }

    /// Remove a directory and everything below it.
    fn remove_dir(&self, _path: &str) -> VfsFuture<()> {
        Box::pin(async { Err(VfsError::ReadOnly) })
    }
}
