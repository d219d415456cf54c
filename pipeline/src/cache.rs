use std::collections::{BTreeMap, BTreeSet};

use kiln_vfs::{FileTime, Vfs, poll_now};
use serde::{Deserialize, Serialize};

use crate::asset_pipeline::PipelineFileTimes;
use crate::error::{PipelineError, Result};
use crate::layout::ProjectLayout;
use crate::resource_path::is_under;

/// Cached processing state of one input resource.
///
/// An entry with no transformers marks a resource nothing applies to; it
/// stays ignored until a rule change invalidates it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetDescriptor {
    #[serde(skip)]
    pub resource_name: String,
    #[serde(rename = "Outputs", default)]
    pub outputs: Vec<String>,
    #[serde(rename = "Transformers", default)]
    pub transformers: BTreeSet<String>,
    #[serde(rename = "AssetModifiedTime", default)]
    pub modification_time: FileTime,
    #[serde(skip)]
    pub cache_invalid: bool,
}

impl AssetDescriptor {
    pub fn new(resource_name: impl Into<String>, modification_time: FileTime) -> Self {
        Self {
            resource_name: resource_name.into(),
            modification_time,
            ..Self::default()
        }
    }

    pub fn is_ignored(&self) -> bool {
        self.transformers.is_empty()
    }

    pub fn uses_any_transformer<'a>(&self, types: impl IntoIterator<Item = &'a String>) -> bool {
        types.into_iter().any(|ty| self.transformers.contains(ty))
    }

    /// `A, B` or `none` for log messages.
    pub fn transformer_summary(&self) -> String {
        if self.transformers.is_empty() {
            return "none".into();
        }
        self.transformers
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Durable state of the pipeline: per-asset descriptors and the pipeline
/// file times they were produced under.
///
/// ```json
/// {
///   "Assets": { "Models/Hero.gltf": { "Outputs": [...], "Transformers": [...], "AssetModifiedTime": 12 } },
///   "AssetPipelineModificationTimes": { "Models/AssetPipeline.json": 10 }
/// }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssetCache {
    #[serde(rename = "Assets", default)]
    assets: BTreeMap<String, AssetDescriptor>,
    #[serde(rename = "AssetPipelineModificationTimes", default)]
    pipeline_times: PipelineFileTimes,
    /// Resources whose next modification-time mismatch is accepted once.
    #[serde(skip)]
    ignore_once: BTreeSet<String>,
}

impl AssetCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(bytes: &[u8], origin: &str) -> Result<Self> {
        let mut cache: Self =
            serde_json::from_slice(bytes).map_err(|err| PipelineError::json(origin, err))?;
        for (name, descriptor) in cache.assets.iter_mut() {
            descriptor.resource_name = name.clone();
        }
        Ok(cache)
    }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        serde_json::to_vec_pretty(self).map_err(|err| PipelineError::json("asset cache", err))
    }

    pub fn get(&self, resource_name: &str) -> Option<&AssetDescriptor> {
        self.assets.get(resource_name)
    }

    pub fn insert(&mut self, descriptor: AssetDescriptor) {
        self.assets.insert(descriptor.resource_name.clone(), descriptor);
    }

    pub fn assets(&self) -> impl Iterator<Item = &AssetDescriptor> {
        self.assets.values()
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    pub fn pipeline_times(&self) -> &PipelineFileTimes {
        &self.pipeline_times
    }

    pub fn set_pipeline_times(&mut self, times: PipelineFileTimes) {
        self.pipeline_times = times;
    }

    /// Accept the next modification-time change of `resource_name` once.
    pub fn ignore_next_modification(&mut self, resource_name: impl Into<String>) {
        self.ignore_once.insert(resource_name.into());
    }

    /// Mark every asset under `path` matching `predicate` invalid.
    /// Returns how many were marked.
    pub fn invalidate_where(
        &mut self,
        path: &str,
        mut predicate: impl FnMut(&AssetDescriptor) -> bool,
    ) -> usize {
        let mut count = 0;
        for descriptor in self.assets.values_mut() {
            if is_under(&descriptor.resource_name, path) && predicate(descriptor) {
                descriptor.cache_invalid = true;
                count += 1;
            }
        }
        count
    }

    /// Mark every asset under `path` whose cached outputs are stale.
    pub fn invalidate_outdated(&mut self, vfs: &Vfs, layout: &ProjectLayout, path: &str) -> usize {
        let names: Vec<String> = self
            .assets
            .keys()
            .filter(|name| is_under(name, path))
            .cloned()
            .collect();
        let mut count = 0;
        for name in names {
            if !self.is_up_to_date(vfs, layout, &name)
                && let Some(descriptor) = self.assets.get_mut(&name)
            {
                descriptor.cache_invalid = true;
                count += 1;
            }
        }
        count
    }

    /// Remove and return every invalidated descriptor.
    pub fn take_invalidated(&mut self) -> Vec<AssetDescriptor> {
        let invalid: Vec<String> = self
            .assets
            .iter()
            .filter(|(_, descriptor)| descriptor.cache_invalid)
            .map(|(name, _)| name.clone())
            .collect();
        invalid
            .into_iter()
            .filter_map(|name| self.assets.remove(&name))
            .collect()
    }

    /// Every directory (cache-relative) that leads to a recorded output.
    pub fn output_dirs(&self) -> BTreeSet<String> {
        self.assets
            .values()
            .flat_map(|descriptor| descriptor.outputs.iter())
            .flat_map(|output| crate::resource_path::ancestor_dirs(output))
            .map(str::to_owned)
            .collect()
    }

    /// Whether the cached outputs of `resource_name` are still valid.
    ///
    /// Stale when the input is gone, its modification time differs from the
    /// recorded one, or any output is missing from the cache. A pending
    /// [`ignore_next_modification`](Self::ignore_next_modification) is
    /// consumed here whatever the outcome; if it was pending, a time
    /// mismatch updates the recorded time instead of making the asset stale.
    pub fn is_up_to_date(&mut self, vfs: &Vfs, layout: &ProjectLayout, resource_name: &str) -> bool {
        let ignore_modification = self.ignore_once.remove(resource_name);
        let Some(descriptor) = self.assets.get_mut(resource_name) else {
            return false;
        };

        let stat = match poll_now(vfs.stat(&layout.data_path(resource_name))) {
            Ok(Some(stat)) if !stat.is_dir => stat,
            Ok(_) => return false,
            Err(err) => {
                log::debug!("Cannot stat {resource_name}: {err}");
                return false;
            }
        };

        if stat.modified != descriptor.modification_time {
            if !ignore_modification {
                return false;
            }
            descriptor.modification_time = stat.modified;
        }

        descriptor.outputs.iter().all(|output| {
            poll_now(vfs.exists(&layout.cache_path(output))).unwrap_or(false)
        })
    }
}
