use serde::{Deserialize, Serialize};

use crate::flavor::Flavor;
use crate::resource_path::{file_name, wildcard_match};

/// Tunables of the [`AssetManager`](crate::AssetManager).
///
/// This is the `[pipeline]` table of `project.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetManagerConfig {
    /// Maximum number of transform requests in flight.
    pub concurrency: usize,
    /// Rescan after every change; when off, scans run only on request.
    pub auto_process: bool,
    pub default_flavor: Flavor,
    /// File name patterns (`*`, `?`) excluded from scans.
    pub ignore_patterns: Vec<String>,
}

impl Default for AssetManagerConfig {
    fn default() -> Self {
        Self {
            concurrency: 1,
            auto_process: true,
            default_flavor: Flavor::any(),
            ignore_patterns: vec!["*.user.json".into()],
        }
    }
}

impl AssetManagerConfig {
    pub fn is_ignored(&self, resource_name: &str) -> bool {
        let name = file_name(resource_name);
        self.ignore_patterns
            .iter()
            .any(|pattern| wildcard_match(pattern, name))
    }
}
