use std::sync::Arc;

use parking_lot::Mutex;

use crate::resource_path::is_under;

/// A change to a path in the data tree, relative to the data root.
///
/// Renames carry the previous name in `old_path`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    pub path: String,
    pub old_path: Option<String>,
}

impl FileChange {
    pub fn modified(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            old_path: None,
        }
    }

    pub fn renamed(old_path: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            old_path: Some(old_path.into()),
        }
    }
}

/// A feed of data-tree changes polled once per tick.
pub trait ChangeSource {
    /// Drain changes observed since the last call.
    fn poll_changes(&mut self) -> Vec<FileChange>;
}

/// A change feed filled by hand, e.g. by tests or by a host that already
/// watches the data tree. `Clone` shares the same queue.
#[derive(Clone, Default)]
pub struct ChangeQueue {
    changes: Arc<Mutex<Vec<FileChange>>>,
}

impl ChangeQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, change: FileChange) {
        self.changes.lock().push(change);
    }
}

impl ChangeSource for ChangeQueue {
    fn poll_changes(&mut self) -> Vec<FileChange> {
        std::mem::take(&mut *self.changes.lock())
    }
}

/// Collapse changed paths into the minimal set of invalidation roots.
///
/// Paths are sorted and any path lying under an earlier kept path (on
/// segment boundaries) is dropped. With `reload_all`, the single root `""`
/// is returned.
pub fn compress_path_updates(changes: &[FileChange], reload_all: bool) -> Vec<String> {
    if reload_all {
        return vec![String::new()];
    }

    let mut paths: Vec<&str> = changes
        .iter()
        .flat_map(|change| std::iter::once(change.path.as_str()).chain(change.old_path.as_deref()))
        .collect();
    paths.sort_unstable();
    paths.dedup();

    let mut compressed: Vec<String> = Vec::new();
    for path in paths {
        if let Some(last) = compressed.last()
            && is_under(path, last)
        {
            continue;
        }
        compressed.push(path.to_owned());
    }
    compressed
}
