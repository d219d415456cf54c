use std::path::{Path, PathBuf};

use kiln_pipeline::{AssetManagerConfig, ProjectLayout};
use kiln_vfs::{FileSystemProvider, Vfs};
use serde::Deserialize;

/// Mount exposing the project root, where the cache state file lives.
pub const PROJECT_MOUNT: &str = "project";

/// Top-level project configuration loaded from `project.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectConfig {
    pub project: ProjectInfo,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub pipeline: AssetManagerConfig,
    /// Present when requests should run in separate worker processes.
    pub remote: Option<RemoteConfig>,
}

/// General project information.
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectInfo {
    pub name: String,
}

/// Directories of the project, relative to the directory holding
/// `project.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub data: String,
    pub cache: String,
    pub temp: String,
    /// Cache state file.
    pub state: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data: "Data".into(),
            cache: "Cache".into(),
            temp: "Temp".into(),
            state: "AssetCache.json".into(),
        }
    }
}

/// Out-of-process execution.
///
/// `command` is a template where `{request}` and `{response}` are replaced
/// by the exchange file paths. When empty, this executable is invoked with
/// the `process` subcommand.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteConfig {
    #[serde(default)]
    pub command: Vec<String>,
    #[serde(default = "default_exchange_dir")]
    pub exchange_dir: String,
}

fn default_exchange_dir() -> String {
    "Temp/exchange".into()
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            project: ProjectInfo {
                name: "Untitled".into(),
            },
            paths: PathsConfig::default(),
            pipeline: AssetManagerConfig::default(),
            remote: None,
        }
    }
}

/// A loaded config together with the directory it was loaded from.
#[derive(Debug, Clone)]
pub struct Project {
    pub root: PathBuf,
    pub file: PathBuf,
    pub config: ProjectConfig,
}

impl Project {
    /// Resolve a project-relative path.
    pub fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path)
    }

    pub fn layout(&self) -> ProjectLayout {
        ProjectLayout::default()
    }

    /// VFS path of the cache state file.
    pub fn state_path(&self) -> String {
        kiln_vfs::path::join(PROJECT_MOUNT, &self.config.paths.state)
    }

    /// Command template for remote workers, if remote execution is enabled.
    pub fn remote_command(&self) -> Result<Option<Vec<String>>, String> {
        let Some(remote) = &self.config.remote else {
            return Ok(None);
        };
        if !remote.command.is_empty() {
            return Ok(Some(remote.command.clone()));
        }

        let exe = std::env::current_exe()
            .map_err(|e| format!("failed to locate the kiln executable: {e}"))?;
        Ok(Some(vec![
            exe.to_string_lossy().into_owned(),
            "--project".into(),
            self.file.to_string_lossy().into_owned(),
            "process".into(),
            "--request".into(),
            kiln_pipeline::REQUEST_PLACEHOLDER.into(),
            "--response".into(),
            kiln_pipeline::RESPONSE_PLACEHOLDER.into(),
        ]))
    }

    pub fn exchange_dir(&self) -> Option<PathBuf> {
        self.config
            .remote
            .as_ref()
            .map(|remote| self.resolve(&remote.exchange_dir))
    }
}

/// Load a project config from a TOML file.
///
/// Returns `Err` with a human-readable message if the file cannot be read
/// or parsed.
pub fn load_project(path: &Path) -> Result<ProjectConfig, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("failed to read {}: {e}", path.display()))?;
    toml::from_str(&content).map_err(|e| format!("failed to parse {}: {e}", path.display()))
}

/// Load project config, falling back to a default if the file can't be read.
///
/// A file that exists but fails to parse is still an error.
pub fn load_or_default(path: &Path) -> Result<Project, String> {
    let config = if path.exists() {
        let config = load_project(path)?;
        log::info!("Loaded project: {}", config.project.name);
        config
    } else {
        log::warn!(
            "No project file ({} not found), using defaults",
            path.display()
        );
        ProjectConfig::default()
    };

    let root = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    Ok(Project {
        root,
        file: path.to_path_buf(),
        config,
    })
}

/// Build a [`Vfs`] with the `data`, `cache`, `temp` and `project` mounts.
///
/// Missing directories are created.
pub fn build_vfs(project: &Project) -> Result<Vfs, String> {
    let layout = project.layout();
    let paths = &project.config.paths;
    let mounts = [
        (layout.data.as_str(), project.resolve(&paths.data)),
        (layout.cache.as_str(), project.resolve(&paths.cache)),
        (layout.temp.as_str(), project.resolve(&paths.temp)),
        (PROJECT_MOUNT, project.root.clone()),
    ];

    let mut vfs = Vfs::new();
    for (name, path) in mounts {
        std::fs::create_dir_all(&path)
            .map_err(|e| format!("failed to create {}: {e}", path.display()))?;
        log::info!("VFS mount: \"{name}\" -> filesystem {path:?}");
        vfs.mount(name, FileSystemProvider::new(path));
    }
    vfs.set_default(&layout.data);
    Ok(vfs)
}
