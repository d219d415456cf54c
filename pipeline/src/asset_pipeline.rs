use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use kiln_vfs::{FileTime, ScanKind, Vfs, poll_now};
use serde::Deserialize;
use serde_json::Value;

use crate::error::{PipelineError, Result};
use crate::layout::ProjectLayout;
use crate::registry::TransformerRegistry;
use crate::resource_path::{file_name, scope_of};
use crate::transformer::Transformer;

/// File name of a directory's pipeline rules.
pub const PIPELINE_FILE_NAME: &str = "AssetPipeline.json";
/// Extension of additional pipeline rule files.
pub const PIPELINE_FILE_EXTENSION: &str = ".assetpipeline";

/// Resource name → modification time of every pipeline file.
pub type PipelineFileTimes = BTreeMap<String, FileTime>;

/// One loaded pipeline file.
#[derive(Debug, Clone)]
pub struct PipelineDescriptor {
    pub resource_name: String,
    pub modification_time: FileTime,
    pub transformers: Vec<Arc<dyn Transformer>>,
    /// `(dependent, dependency)` type pairs.
    pub dependencies: Vec<(String, String)>,
}

impl PipelineDescriptor {
    /// Scope the pipeline's transformers apply to.
    pub fn scope(&self) -> &str {
        scope_of(&self.resource_name)
    }

    /// Distinct transformer type names declared by this pipeline.
    pub fn transformer_types(&self) -> BTreeSet<String> {
        self.transformers
            .iter()
            .map(|t| t.type_name().to_owned())
            .collect()
    }
}

/// Old and new versions of a pipeline file that changed.
#[derive(Debug, Clone, Copy, Default)]
pub struct PipelineChange<'a> {
    pub old: Option<&'a PipelineDescriptor>,
    pub new: Option<&'a PipelineDescriptor>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PipelineFile {
    #[serde(default)]
    transformers: Vec<Value>,
    #[serde(default)]
    dependencies: Vec<DependencyEntry>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DependencyEntry {
    class: String,
    depends_on: String,
}

pub fn is_pipeline_file(resource_name: &str) -> bool {
    file_name(resource_name) == PIPELINE_FILE_NAME || resource_name.ends_with(PIPELINE_FILE_EXTENSION)
}

/// Find every pipeline file under the data directory.
pub fn enumerate_asset_pipeline_files(vfs: &Vfs, layout: &ProjectLayout) -> Result<PipelineFileTimes> {
    let mut result = PipelineFileTimes::new();
    for resource_name in poll_now(vfs.scan(&layout.data, ScanKind::Files))? {
        if !is_pipeline_file(&resource_name) {
            continue;
        }
        let Some(stat) = poll_now(vfs.stat(&layout.data_path(&resource_name)))? else {
            continue;
        };
        result.insert(resource_name, stat.modified);
    }
    Ok(result)
}

/// Parse a pipeline file.
///
/// Transformer entries that name an unknown class or carry invalid settings
/// are logged and skipped; malformed JSON fails the whole file.
pub fn parse_asset_pipeline(
    registry: &TransformerRegistry,
    resource_name: &str,
    modification_time: FileTime,
    bytes: &[u8],
) -> Result<PipelineDescriptor> {
    let file: PipelineFile =
        serde_json::from_slice(bytes).map_err(|err| PipelineError::json(resource_name, err))?;

    let mut transformers = Vec::with_capacity(file.transformers.len());
    for entry in &file.transformers {
        let Some(class) = entry.get("_Class").and_then(Value::as_str) else {
            log::error!("Transformer entry without \"_Class\" in {resource_name}");
            continue;
        };
        match registry.create(class, entry) {
            Ok(transformer) => transformers.push(transformer),
            Err(err) => {
                log::error!("Failed to instantiate transformer {class} of {resource_name}: {err}")
            }
        }
    }

    Ok(PipelineDescriptor {
        resource_name: resource_name.to_owned(),
        modification_time,
        transformers,
        dependencies: file
            .dependencies
            .into_iter()
            .map(|dep| (dep.class, dep.depends_on))
            .collect(),
    })
}

/// Load every listed pipeline file, skipping those that fail to parse.
pub fn load_asset_pipelines(
    vfs: &Vfs,
    layout: &ProjectLayout,
    registry: &TransformerRegistry,
    files: &PipelineFileTimes,
) -> Vec<PipelineDescriptor> {
    let mut result = Vec::with_capacity(files.len());
    for (resource_name, &modification_time) in files {
        let loaded = poll_now(vfs.read(&layout.data_path(resource_name)))
            .map_err(PipelineError::from)
            .and_then(|bytes| parse_asset_pipeline(registry, resource_name, modification_time, &bytes));
        match loaded {
            Ok(pipeline) => result.push(pipeline),
            Err(err) => log::error!("Failed to load asset pipeline {resource_name}: {err}"),
        }
    }
    result
}

/// Pair old and new pipelines by resource name.
///
/// Pipelines present on both sides with the same modification time are
/// omitted.
pub fn diff_asset_pipelines<'a>(
    old: &'a [PipelineDescriptor],
    new: &'a [PipelineDescriptor],
) -> BTreeMap<String, PipelineChange<'a>> {
    let mut result: BTreeMap<String, PipelineChange<'a>> = BTreeMap::new();
    for pipeline in old {
        result.entry(pipeline.resource_name.clone()).or_default().old = Some(pipeline);
    }
    for pipeline in new {
        result.entry(pipeline.resource_name.clone()).or_default().new = Some(pipeline);
    }
    result.retain(|_, change| match (change.old, change.new) {
        (Some(old), Some(new)) => old.modification_time != new.modification_time,
        _ => true,
    });
    result
}

/// Pipeline files whose `(name, time)` entry appears on only one side.
pub fn changed_pipeline_files(old: &PipelineFileTimes, new: &PipelineFileTimes) -> BTreeSet<String> {
    let removed_or_changed = old
        .iter()
        .filter(|(name, time)| new.get(*name) != Some(*time))
        .map(|(name, _)| name.clone());
    let added_or_changed = new
        .iter()
        .filter(|(name, time)| old.get(*name) != Some(*time))
        .map(|(name, _)| name.clone());
    removed_or_changed.chain(added_or_changed).collect()
}
