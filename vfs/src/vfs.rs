use std::collections::HashMap;
use std::sync::Arc;

use crate::error::VfsError;
use crate::path;
use crate::provider::{FileStat, ScanKind, VfsFuture, VfsProvider};

/// Virtual file system that routes paths to mounted providers.
///
/// Paths are structured as `"source_name/rest/of/path"`. The first path
/// segment selects the provider. If no source name matches, the default
/// source (if set) is tried with the full path.
///
/// `Clone` is cheap (Arc internals). Thread-safe (`Send + Sync`).
///
/// # Example
///
/// ```ignore
/// let mut vfs = Vfs::new();
/// vfs.mount("data", FileSystemProvider::new("./Data"));
/// vfs.mount("cache", FileSystemProvider::new("./Cache"));
///
/// // Stats ./Data/Models/Hero.gltf
/// let stat = poll_now(vfs.stat("data/Models/Hero.gltf"))?;
///
/// // Copies ./Data/Textures/a.png to ./Cache/Textures/a.png
/// poll_now(vfs.copy("data/Textures/a.png", "cache/Textures/a.png"))?;
/// ```
#[derive(Clone)]
pub struct Vfs {
    inner: Arc<VfsInner>,
}

struct VfsInner {
    sources: HashMap<String, Box<dyn VfsProvider>>,
    default_source: Option<String>,
}

impl Vfs {
    /// Create an empty VFS with no mounted sources.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(VfsInner {
                sources: HashMap::new(),
                default_source: None,
            }),
        }
    }

    /// Mount a provider under the given source name.
    ///
    /// Replaces any previously mounted provider with the same name.
    ///
    /// # Panics
    ///
    /// Panics if the `Vfs` has already been cloned. All mounting must
    /// happen during the configuration phase before sharing the `Vfs`.
    pub fn mount(&mut self, name: impl Into<String>, provider: impl VfsProvider) {
        let inner = Arc::get_mut(&mut self.inner).expect("cannot mount after Vfs has been cloned");
        inner.sources.insert(name.into(), Box::new(provider));
    }

    /// Set the default source name used when a path does not match any mount.
    ///
    /// # Panics
    ///
    /// Panics if the `Vfs` has already been cloned.
    pub fn set_default(&mut self, name: impl Into<String>) {
        let inner =
            Arc::get_mut(&mut self.inner).expect("cannot set default after Vfs has been cloned");
        inner.default_source = Some(name.into());
    }

    /// Whether a source with the given name is mounted.
    pub fn has_source(&self, name: &str) -> bool {
        self.inner.sources.contains_key(name)
    }

    /// Read the entire contents of a file.
    ///
    /// The first path segment selects the source provider. Falls back
    /// to the default source if no mount matches.
    pub fn read(&self, raw_path: &str) -> VfsFuture<Vec<u8>> {
        self.route(raw_path, |provider, path| provider.read(path))
    }

    /// Check whether a file exists.
    pub fn exists(&self, raw_path: &str) -> VfsFuture<bool> {
        self.route(raw_path, |provider, path| provider.exists(path))
    }

    /// Query metadata. Resolves to `None` for missing paths.
    pub fn stat(&self, raw_path: &str) -> VfsFuture<Option<FileStat>> {
        self.route(raw_path, |provider, path| provider.stat(path))
    }

    /// List the immediate children of a directory.
    pub fn list_dir(&self, raw_path: &str) -> VfsFuture<Vec<String>> {
        self.route(raw_path, |provider, path| provider.list_dir(path))
    }

    /// Recursively list files or directories below a directory.
    ///
    /// Returned paths are relative to `raw_path`.
    pub fn scan(&self, raw_path: &str, kind: ScanKind) -> VfsFuture<Vec<String>> {
        self.route(raw_path, |provider, path| provider.scan(path, kind))
    }

    /// Write data to a file.
    ///
    /// Returns [`VfsError::ReadOnly`] if the resolved provider does not
    /// support writes.
    pub fn write(&self, raw_path: &str, data: Vec<u8>) -> VfsFuture<()> {
        self.route(raw_path, |provider, path| provider.write(path, data))
    }

    /// Delete a file.
    pub fn delete(&self, raw_path: &str) -> VfsFuture<()> {
        self.route(raw_path, |provider, path| provider.delete(path))
    }

    /// Create a directory.
    pub fn create_dir(&self, raw_path: &str) -> VfsFuture<()> {
        self.route(raw_path, |provider, path| provider.create_dir(path))
    }

    /// Remove a directory recursively.
    pub fn remove_dir(&self, raw_path: &str) -> VfsFuture<()> {
        self.route(raw_path, |provider, path| provider.remove_dir(path))
    }

    /// Copy a file, possibly across sources.
    pub fn copy(&self, from: &str, to: &str) -> VfsFuture<()> {
        let read = self.read(from);
        let vfs = self.clone();
        let to = to.to_owned();
        Box::pin(async move {
            let data = read.await?;
            vfs.write(&to, data).await
        })
    }

    /// Check if the provider for a given path is read-only.
    ///
    /// Returns `Err` if the path cannot be resolved to a provider.
    pub fn is_read_only(&self, raw_path: &str) -> Result<bool, VfsError> {
        let (provider, _) = self.resolve(raw_path)?;
        Ok(provider.is_read_only())
    }

    fn route<T: 'static>(
        &self,
        raw_path: &str,
        op: impl FnOnce(&dyn VfsProvider, &str) -> VfsFuture<T>,
    ) -> VfsFuture<T> {
        match self.resolve(raw_path) {
            Ok((provider, resolved_path)) => op(provider, &resolved_path),
            Err(e) => Box::pin(async move { Err(e) }),
        }
    }

    /// Resolve a raw path to a provider reference and the path within that provider.
    fn resolve(&self, raw_path: &str) -> Result<(&dyn VfsProvider, String), VfsError> {
        let normalized = path::normalize(raw_path)?;
        let (source, rest) = path::split_source(&normalized);

        if let Some(provider) = self.inner.sources.get(source) {
            return Ok((provider.as_ref(), rest.to_owned()));
        }

        if let Some(default_name) = &self.inner.default_source
            && let Some(provider) = self.inner.sources.get(default_name)
        {
            return Ok((provider.as_ref(), normalized));
        }

        Err(VfsError::NoSuchSource(source.to_owned()))
    }
}

impl Default for Vfs {
    fn default() -> Self {
        Self::new()
    }
}
