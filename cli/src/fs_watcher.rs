use std::path::{Path, PathBuf};
use std::sync::mpsc;

use kiln_pipeline::{ChangeSource, FileChange};
use notify::event::{ModifyKind, RenameMode};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};

/// Watches the data directory and reports changed resource names.
pub struct FsWatcher {
    /// The underlying file watcher (kept alive).
    _watcher: RecommendedWatcher,
    /// Receives raw notify events from the background thread.
    event_rx: mpsc::Receiver<notify::Event>,
    root: PathBuf,
}

impl FsWatcher {
    /// Start watching `data_root` recursively.
    /// Returns `None` if the directory can't be watched.
    pub fn new(data_root: &Path) -> Option<Self> {
        let (tx, rx) = mpsc::channel::<notify::Event>();

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            if let Ok(event) = res {
                let _ = tx.send(event);
            }
        })
        .ok()?;

        let root = data_root.canonicalize().ok()?;
        if let Err(e) = watcher.watch(&root, RecursiveMode::Recursive) {
            log::warn!("Failed to watch {:?}: {e}", root);
            return None;
        }
        log::info!("Watching data directory {:?}", root);

        Some(Self {
            _watcher: watcher,
            event_rx: rx,
            root,
        })
    }
}

impl ChangeSource for FsWatcher {
    fn poll_changes(&mut self) -> Vec<FileChange> {
        let mut changes = Vec::new();
        while let Ok(event) = self.event_rx.try_recv() {
            changes.extend(event_changes(&self.root, &event));
        }
        changes
    }
}

/// Translate one notify event into data-relative changes.
fn event_changes(root: &Path, event: &notify::Event) -> Vec<FileChange> {
    match event.kind {
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) if event.paths.len() == 2 => {
            match (
                resource_name(root, &event.paths[0]),
                resource_name(root, &event.paths[1]),
            ) {
                (Some(from), Some(to)) => vec![FileChange::renamed(from, to)],
                // Moved in or out of the data directory.
                (from, to) => from.into_iter().chain(to).map(FileChange::modified).collect(),
            }
        }
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_) => event
            .paths
            .iter()
            .filter_map(|path| resource_name(root, path))
            .map(FileChange::modified)
            .collect(),
        _ => Vec::new(),
    }
}

/// Map a local path to its resource name (e.g. "Models/Hero.gltf").
fn resource_name(root: &Path, local_path: &Path) -> Option<String> {
    let relative = local_path.strip_prefix(root).ok()?;
    Some(relative.to_string_lossy().replace('\\', "/"))
}
