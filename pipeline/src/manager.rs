use std::collections::BTreeSet;
use std::sync::Arc;

use kiln_vfs::{ScanKind, Vfs, path::join, poll_now};
use uuid::Uuid;

use crate::asset_pipeline::{
    PipelineDescriptor, PipelineFileTimes, changed_pipeline_files, diff_asset_pipelines,
    enumerate_asset_pipeline_files, is_pipeline_file, load_asset_pipelines,
};
use crate::cache::{AssetCache, AssetDescriptor};
use crate::config::AssetManagerConfig;
use crate::dispatcher::Dispatcher;
use crate::error::Result;
use crate::flavor::Flavor;
use crate::hierarchy::TransformerHierarchy;
use crate::layout::ProjectLayout;
use crate::processor::{AssetProcessor, InProcessProcessor, ProcessEnv, execute_and_store};
use crate::registry::TransformerRegistry;
use crate::request::{TransformOutcome, TransformRequest, TransformResult};
use crate::resource_path::{is_under, scope_of};
use crate::transformer::{Transformer, is_applicable_any};
use crate::watch::{ChangeSource, FileChange, compress_path_updates};

/// Lifecycle of an [`AssetManager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagerState {
    Uninitialized,
    /// Initial requests are still being processed.
    Initializing,
    /// Requests are queued or in flight.
    Busy,
    Settled,
}

/// Outcome counts of one scan.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ScanStats {
    /// Requests enqueued.
    pub processed: usize,
    pub up_to_date: usize,
    /// Resources no transformer applies to.
    pub ignored: usize,
}

/// Requests completed out of requests enqueued since the last settle.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
}

/// Owns the asset cache, the loaded pipelines and the transformer hierarchy,
/// and drives incremental processing from a cooperative [`update`] tick.
///
/// ```ignore
/// let mut manager = AssetManager::new(vfs, ProjectLayout::default(), registry, config);
/// manager.load_state("project/AssetCache.json");
/// manager.initialize(false);
/// while !manager.is_settled() {
///     manager.update();
/// }
/// manager.save_state("project/AssetCache.json")?;
/// ```
///
/// [`update`]: AssetManager::update
pub struct AssetManager {
    vfs: Vfs,
    layout: ProjectLayout,
    registry: TransformerRegistry,
    config: AssetManagerConfig,

    cache: AssetCache,
    pipelines: Vec<PipelineDescriptor>,
    hierarchy: TransformerHierarchy,
    dispatcher: Dispatcher,

    change_source: Option<Box<dyn ChangeSource>>,
    pending_changes: Vec<FileChange>,
    initialized_subscribers: Vec<Box<dyn FnMut()>>,

    state: ManagerState,
    read_only: bool,
    has_invalid_assets: bool,
    scan_requested: bool,
    reload_pipelines: bool,
    progress: Progress,
    last_scan: ScanStats,
}

impl AssetManager {
    pub fn new(
        vfs: Vfs,
        layout: ProjectLayout,
        registry: TransformerRegistry,
        config: AssetManagerConfig,
    ) -> Self {
        let dispatcher = Dispatcher::new(config.concurrency, Box::new(InProcessProcessor::new()));
        Self {
            vfs,
            layout,
            registry,
            config,
            cache: AssetCache::new(),
            pipelines: Vec::new(),
            hierarchy: TransformerHierarchy::new(),
            dispatcher,
            change_source: None,
            pending_changes: Vec::new(),
            initialized_subscribers: Vec::new(),
            state: ManagerState::Uninitialized,
            read_only: false,
            has_invalid_assets: false,
            scan_requested: false,
            reload_pipelines: false,
            progress: Progress::default(),
            last_scan: ScanStats::default(),
        }
    }

    /// Replace the processor that executes requests.
    pub fn set_processor(&mut self, processor: Box<dyn AssetProcessor>) {
        self.dispatcher.set_processor(processor);
    }

    pub fn set_change_source(&mut self, source: Box<dyn ChangeSource>) {
        self.change_source = Some(source);
    }

    /// Call `callback` once the initial processing has drained.
    pub fn subscribe_initialized(&mut self, callback: impl FnMut() + 'static) {
        self.initialized_subscribers.push(Box::new(callback));
    }

    pub fn state(&self) -> ManagerState {
        self.state
    }

    pub fn is_initialized(&self) -> bool {
        matches!(self.state, ManagerState::Busy | ManagerState::Settled)
    }

    /// Initialized with nothing queued or in flight.
    pub fn is_settled(&self) -> bool {
        self.state == ManagerState::Settled && self.dispatcher.is_idle()
    }

    pub fn progress(&self) -> Progress {
        self.progress
    }

    pub fn last_scan(&self) -> ScanStats {
        self.last_scan
    }

    pub fn cache(&self) -> &AssetCache {
        &self.cache
    }

    pub fn pipelines(&self) -> &[PipelineDescriptor] {
        &self.pipelines
    }

    pub fn hierarchy(&self) -> &TransformerHierarchy {
        &self.hierarchy
    }

    pub fn config(&self) -> &AssetManagerConfig {
        &self.config
    }

    pub fn queued_requests(&self) -> usize {
        self.dispatcher.queued()
    }

    pub fn in_flight_requests(&self) -> usize {
        self.dispatcher.in_flight()
    }

    /// Load a previously saved cache.
    ///
    /// A missing or unreadable file leaves the cache empty, so every asset
    /// is processed again.
    pub fn load_state(&mut self, path: &str) {
        let bytes = match poll_now(self.vfs.read(path)) {
            Ok(bytes) => bytes,
            Err(err) if err.is_not_found() => {
                log::info!("No asset cache at {path}, starting from scratch");
                return;
            }
            Err(err) => {
                log::warn!("Failed to read asset cache {path}: {err}");
                return;
            }
        };
        match AssetCache::from_json(&bytes, path) {
            Ok(cache) => {
                log::info!("Loaded asset cache with {} assets", cache.len());
                self.cache = cache;
            }
            Err(err) => log::warn!("Ignoring asset cache: {err}"),
        }
    }

    pub fn save_state(&self, path: &str) -> Result<()> {
        let result = self
            .cache
            .to_json()
            .and_then(|bytes| Ok(poll_now(self.vfs.write(path, bytes))?));
        if let Err(err) = &result {
            log::error!("Failed to save asset cache to {path}: {err}");
        }
        result
    }

    /// Load pipelines and bring the cache up to date.
    ///
    /// In read-only mode nothing is cleaned up or scanned; the manager only
    /// serves [`process_request`](Self::process_request).
    pub fn initialize(&mut self, read_only: bool) {
        self.state = ManagerState::Initializing;
        self.read_only = read_only;

        self.initialize_asset_pipelines();
        self.invalidate_outdated_assets_in_path("");
        if !read_only {
            self.ensure_assets_and_cache_valid();
            self.scan_and_queue_asset_processing();
        }

        if self.dispatcher.is_idle() {
            self.settle_initialized();
        }
    }

    /// One cooperative tick.
    pub fn update(&mut self) {
        if self.state == ManagerState::Uninitialized {
            log::warn!("AssetManager::update called before initialize");
            return;
        }

        if !self.dispatcher.is_idle() {
            if self.state != ManagerState::Initializing {
                self.state = ManagerState::Busy;
            }
            self.pump();
            return;
        }

        if self.state == ManagerState::Initializing {
            self.settle_initialized();
            return;
        }

        self.state = ManagerState::Settled;
        self.progress = Progress::default();
        if self.read_only {
            return;
        }

        self.process_removed_transformers();
        self.process_file_system_updates();
        if self.config.auto_process || self.scan_requested {
            self.ensure_assets_and_cache_valid();
            self.scan_and_queue_asset_processing();
        }

        if !self.dispatcher.is_idle() {
            self.state = ManagerState::Busy;
        }
    }

    /// Drop every cached asset under `path` and rescan on the next tick.
    pub fn mark_cache_dirty(&mut self, path: &str) {
        let count = self.cache.invalidate_where(path, |_| true);
        log::info!("Marked {count} cached assets under \"{path}\" dirty");
        self.has_invalid_assets = true;
        self.scan_requested = true;
    }

    /// Rescan on the next tick even when auto-processing is off.
    pub fn request_scan(&mut self) {
        self.scan_requested = true;
    }

    /// Report a change in the data tree, in addition to the change source.
    pub fn queue_path_update(&mut self, change: FileChange) {
        self.pending_changes.push(change);
    }

    /// Run one request synchronously against the loaded pipelines without
    /// touching the cache state.
    pub fn process_request(&self, request: &TransformRequest) -> TransformResult {
        let env = ProcessEnv {
            vfs: &self.vfs,
            layout: &self.layout,
            hierarchy: &self.hierarchy,
        };
        execute_and_store(&env, request)
    }

    /// Enqueue every unknown resource under `path`.
    pub fn scan_assets_in_path(&mut self, path: &str) -> ScanStats {
        let mut stats = ScanStats::default();
        let flavor = self.config.default_flavor.clone();
        for resource_name in self.enumerate_asset_files(path) {
            match self.cache.get(&resource_name) {
                None => {
                    if self.queue_asset_processing(&resource_name, &flavor) {
                        stats.processed += 1;
                    } else {
                        stats.ignored += 1;
                    }
                }
                Some(descriptor) if descriptor.is_ignored() => stats.ignored += 1,
                Some(_) => stats.up_to_date += 1,
            }
        }
        stats
    }

    /// Apply a finished request to the cache.
    ///
    /// # Panics
    ///
    /// Panics if no request is in flight.
    pub fn complete_asset_processing(&mut self, result: TransformResult) {
        self.dispatcher.finish();
        self.progress.completed += 1;

        match result.outcome {
            TransformOutcome::Success {
                outputs,
                transformers,
                source_modified,
            } => {
                let descriptor = AssetDescriptor {
                    outputs,
                    transformers,
                    ..AssetDescriptor::new(&result.resource_name, result.input_modification_time)
                };
                log::debug!(
                    "Asset {} was processed with {} ({} files generated)",
                    result.resource_name,
                    descriptor.transformer_summary(),
                    descriptor.outputs.len()
                );
                if source_modified {
                    self.cache.ignore_next_modification(&result.resource_name);
                }
                self.cache.insert(descriptor);
            }
            TransformOutcome::Failure { message } => {
                log::warn!("Failed to process asset {}: {message}", result.resource_name);
            }
        }
    }

    fn settle_initialized(&mut self) {
        self.state = ManagerState::Settled;
        log::info!("Asset manager initialized with {} cached assets", self.cache.len());
        for callback in &mut self.initialized_subscribers {
            callback();
        }
    }

    fn pump(&mut self) {
        self.drain_completed();
        let env = ProcessEnv {
            vfs: &self.vfs,
            layout: &self.layout,
            hierarchy: &self.hierarchy,
        };
        self.dispatcher.consume_queue(&env);
        self.drain_completed();
    }

    fn drain_completed(&mut self) {
        for result in self.dispatcher.poll_completed() {
            self.complete_asset_processing(result);
        }
    }

    fn process_removed_transformers(&mut self) {
        let removed = self.registry.take_removed();
        if removed.is_empty() {
            return;
        }
        for type_name in &removed {
            if self.hierarchy.remove_transformers(type_name) {
                log::info!("Transformer type {type_name} was removed, reloading pipelines");
            }
        }
        self.invalidate_assets_in_path("");
        self.reload_pipelines = true;
    }

    fn process_file_system_updates(&mut self) {
        let mut changes = std::mem::take(&mut self.pending_changes);
        if let Some(source) = &mut self.change_source {
            changes.extend(source.poll_changes());
        }
        let reload_all = std::mem::take(&mut self.reload_pipelines);
        let path_updates = compress_path_updates(&changes, reload_all);
        if path_updates.is_empty() {
            return;
        }

        let pipeline_files = self.enumerate_pipeline_files();
        if reload_all || &pipeline_files != self.cache.pipeline_times() {
            self.update_asset_pipelines(pipeline_files);
        }
        for path in &path_updates {
            self.invalidate_outdated_assets_in_path(path);
        }
    }

    fn enumerate_pipeline_files(&self) -> PipelineFileTimes {
        enumerate_asset_pipeline_files(&self.vfs, &self.layout).unwrap_or_else(|err| {
            log::error!("Failed to enumerate asset pipelines: {err}");
            PipelineFileTimes::new()
        })
    }

    fn initialize_asset_pipelines(&mut self) {
        let files = self.enumerate_pipeline_files();
        let pipelines = load_asset_pipelines(&self.vfs, &self.layout, &self.registry, &files);

        for resource_name in changed_pipeline_files(self.cache.pipeline_times(), &files) {
            self.invalidate_assets_in_path(scope_of(&resource_name));
        }

        self.pipelines = pipelines;
        self.cache.set_pipeline_times(files);
        self.update_transformer_hierarchy();
    }

    fn update_asset_pipelines(&mut self, files: PipelineFileTimes) {
        let new_pipelines = load_asset_pipelines(&self.vfs, &self.layout, &self.registry, &files);

        type Invalidation = (String, Option<BTreeSet<String>>, Option<Vec<Arc<dyn Transformer>>>);
        let invalidations: Vec<Invalidation> = diff_asset_pipelines(&self.pipelines, &new_pipelines)
            .into_iter()
            .map(|(resource_name, change)| {
                (
                    scope_of(&resource_name).to_owned(),
                    change.old.map(PipelineDescriptor::transformer_types),
                    change.new.map(|pipeline| pipeline.transformers.clone()),
                )
            })
            .collect();

        for (scope, old_types, new_transformers) in invalidations {
            if let Some(types) = old_types {
                self.invalidate_transformed_assets_in_path(&scope, &types);
            }
            if let Some(transformers) = new_transformers {
                self.invalidate_applicable_assets_in_path(&scope, &transformers);
            }
        }

        self.pipelines = new_pipelines;
        self.cache.set_pipeline_times(files);
        self.update_transformer_hierarchy();
    }

    fn update_transformer_hierarchy(&mut self) {
        self.hierarchy.clear();
        for pipeline in &self.pipelines {
            for transformer in &pipeline.transformers {
                self.hierarchy
                    .add_transformer(pipeline.scope(), Arc::clone(transformer));
            }
            for (dependent, dependency) in &pipeline.dependencies {
                self.hierarchy
                    .add_dependency(dependent.as_str(), dependency.as_str());
            }
        }
        self.hierarchy.commit_dependencies();
    }

    fn invalidate_assets_in_path(&mut self, path: &str) {
        self.has_invalid_assets = true;
        self.cache.invalidate_where(path, |_| true);
    }

    fn invalidate_transformed_assets_in_path(&mut self, path: &str, types: &BTreeSet<String>) {
        self.has_invalid_assets = true;
        self.cache
            .invalidate_where(path, |descriptor| descriptor.uses_any_transformer(types));
    }

    fn invalidate_applicable_assets_in_path(
        &mut self,
        path: &str,
        transformers: &[Arc<dyn Transformer>],
    ) {
        self.has_invalid_assets = true;
        let layout = &self.layout;
        let flavor = &self.config.default_flavor;
        self.cache.invalidate_where(path, |descriptor| {
            let probe = TransformRequest {
                resource_name: descriptor.resource_name.clone(),
                flavor: flavor.clone(),
                input_file: layout.data_path(&descriptor.resource_name),
                output_file: String::new(),
                temp_path: String::new(),
                input_modification_time: descriptor.modification_time,
            };
            is_applicable_any(&probe, transformers)
        });
    }

    fn invalidate_outdated_assets_in_path(&mut self, path: &str) {
        self.has_invalid_assets = true;
        self.cache.invalidate_outdated(&self.vfs, &self.layout, path);
    }

    fn ensure_assets_and_cache_valid(&mut self) {
        if !self.has_invalid_assets {
            return;
        }
        self.cleanup_invalidated_assets();
        self.cleanup_cache_folder();
        self.scan_requested = true;
        self.has_invalid_assets = false;
    }

    fn cleanup_invalidated_assets(&mut self) {
        for descriptor in self.cache.take_invalidated() {
            log::debug!("Asset {} was invalidated", descriptor.resource_name);
            for output in &descriptor.outputs {
                match poll_now(self.vfs.delete(&self.layout.cache_path(output))) {
                    Ok(()) => {}
                    Err(err) if err.is_not_found() => {}
                    Err(err) => log::warn!("Failed to delete cached output {output}: {err}"),
                }
            }
        }
    }

    /// Remove cache directories that lead to no recorded output.
    fn cleanup_cache_folder(&mut self) {
        let keep = self.cache.output_dirs();
        let dirs = match poll_now(self.vfs.scan(&self.layout.cache, ScanKind::Dirs)) {
            Ok(dirs) => dirs,
            Err(err) => {
                log::warn!("Failed to scan cache folder: {err}");
                return;
            }
        };

        let mut removed: Vec<String> = Vec::new();
        for dir in dirs {
            if keep.contains(&dir) || removed.iter().any(|parent| is_under(&dir, parent)) {
                continue;
            }
            match poll_now(self.vfs.remove_dir(&self.layout.cache_path(&dir))) {
                Ok(()) => {}
                Err(err) if err.is_not_found() => {}
                Err(err) => log::warn!("Failed to remove cache folder {dir}: {err}"),
            }
            removed.push(dir);
        }
    }

    fn scan_and_queue_asset_processing(&mut self) {
        if !self.scan_requested {
            return;
        }
        let stats = self.scan_assets_in_path("");
        log::info!(
            "Assets scanned: {} processed, {} up-to-date, {} ignored",
            stats.processed,
            stats.up_to_date,
            stats.ignored
        );
        self.progress.total += stats.processed;
        self.last_scan = stats;
        self.scan_requested = false;
    }

    fn enumerate_asset_files(&self, path: &str) -> Vec<String> {
        let root = self.layout.data_path(path);
        let files = match poll_now(self.vfs.scan(&root, ScanKind::Files)) {
            Ok(files) => files,
            Err(err) => {
                log::warn!("Failed to scan {root}: {err}");
                return Vec::new();
            }
        };
        files
            .into_iter()
            .map(|relative| join(path, &relative))
            .filter(|name| !is_pipeline_file(name) && !self.config.is_ignored(name))
            .collect()
    }

    /// Enqueue `resource_name` if any candidate applies; otherwise record it
    /// as ignored. Returns whether a request was enqueued.
    fn queue_asset_processing(&mut self, resource_name: &str, flavor: &Flavor) -> bool {
        let input_file = self.layout.data_path(resource_name);
        let input_modification_time = match poll_now(self.vfs.stat(&input_file)) {
            Ok(Some(stat)) => stat.modified,
            Ok(None) => return false,
            Err(err) => {
                log::warn!("Failed to stat {resource_name}: {err}");
                return false;
            }
        };

        let temp_path = self.layout.temp_path(&Uuid::new_v4().to_string());
        let request = TransformRequest {
            resource_name: resource_name.to_owned(),
            flavor: flavor.clone(),
            output_file: join(&temp_path, resource_name),
            input_file,
            temp_path,
            input_modification_time,
        };

        let candidates = self.hierarchy.candidates(resource_name, flavor);
        if !is_applicable_any(&request, &candidates) {
            self.cache
                .insert(AssetDescriptor::new(resource_name, input_modification_time));
            return false;
        }

        self.dispatcher.enqueue(request);
        true
    }
}
