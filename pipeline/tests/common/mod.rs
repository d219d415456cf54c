#![allow(dead_code)]

use std::sync::Arc;

use kiln_pipeline::{
    AssetManager, AssetManagerConfig, AssetProcessor, PipelineError, ProcessEnv, ProjectLayout,
    Result, TransformContext, TransformOutcome, TransformRequest, TransformResult, Transformer,
    TransformerOutput, TransformerRegistry,
};
use kiln_vfs::{MemoryProvider, Vfs, poll_now};
use parking_lot::Mutex;

pub const STATE_FILE: &str = "project/AssetCache.json";

// ---------------------------------------------------------------------------
// Test transformers
// ---------------------------------------------------------------------------

fn replace_extension(name: &str, extension: &str) -> String {
    match name.rfind('.') {
        Some(pos) => format!("{}{extension}", &name[..pos]),
        None => format!("{name}{extension}"),
    }
}

/// `*.gltf` → `*.mdl`.
pub struct ModelImporter;

impl Transformer for ModelImporter {
    fn type_name(&self) -> &str {
        "ModelImporter"
    }

    fn is_applicable(&self, request: &TransformRequest) -> bool {
        request.resource_name.ends_with(".gltf")
    }

    fn execute(
        &self,
        ctx: &TransformContext<'_>,
        request: &TransformRequest,
        _output: &mut TransformerOutput,
    ) -> Result<()> {
        let data = ctx.read_input(request)?;
        ctx.write_output(request, &replace_extension(&request.resource_name, ".mdl"), data)
    }
}

/// `*.png` → `*.tex`.
pub struct TextureImporter;

impl Transformer for TextureImporter {
    fn type_name(&self) -> &str {
        "TextureImporter"
    }

    fn is_applicable(&self, request: &TransformRequest) -> bool {
        request.resource_name.ends_with(".png")
    }

    fn execute(
        &self,
        ctx: &TransformContext<'_>,
        request: &TransformRequest,
        _output: &mut TransformerOutput,
    ) -> Result<()> {
        let data = ctx.read_input(request)?;
        ctx.write_output(request, &replace_extension(&request.resource_name, ".tex"), data)
    }
}

/// Rewrites `*.src` inputs in place (e.g. upgrading their format) and
/// emits `*.out`.
pub struct SourceRewriter;

impl Transformer for SourceRewriter {
    fn type_name(&self) -> &str {
        "SourceRewriter"
    }

    fn is_applicable(&self, request: &TransformRequest) -> bool {
        request.resource_name.ends_with(".src")
    }

    fn execute(
        &self,
        ctx: &TransformContext<'_>,
        request: &TransformRequest,
        output: &mut TransformerOutput,
    ) -> Result<()> {
        let data = ctx.read_input(request)?;
        poll_now(ctx.vfs.write(&request.input_file, data.clone()))?;
        output.source_modified = true;
        ctx.write_output(request, &replace_extension(&request.resource_name, ".out"), data)
    }
}

/// Always fails on `*.bad`.
pub struct FailingImporter;

impl Transformer for FailingImporter {
    fn type_name(&self) -> &str {
        "FailingImporter"
    }

    fn is_applicable(&self, request: &TransformRequest) -> bool {
        request.resource_name.ends_with(".bad")
    }

    fn execute(
        &self,
        _ctx: &TransformContext<'_>,
        request: &TransformRequest,
        _output: &mut TransformerOutput,
    ) -> Result<()> {
        Err(PipelineError::Transform {
            resource: request.resource_name.clone(),
            message: "corrupt input".into(),
        })
    }
}

pub fn test_registry() -> TransformerRegistry {
    let registry = TransformerRegistry::with_builtins();
    registry.register("ModelImporter", |_| Ok(Arc::new(ModelImporter)));
    registry.register("TextureImporter", |_| Ok(Arc::new(TextureImporter)));
    registry.register("SourceRewriter", |_| Ok(Arc::new(SourceRewriter)));
    registry.register("FailingImporter", |_| Ok(Arc::new(FailingImporter)));
    registry
}

/// Pipeline file body declaring the given transformer classes.
pub fn pipeline(classes: &[&str]) -> Vec<u8> {
    let transformers: Vec<serde_json::Value> = classes
        .iter()
        .map(|class| serde_json::json!({ "_Class": class }))
        .collect();
    serde_json::to_vec(&serde_json::json!({ "Transformers": transformers })).unwrap()
}

// ---------------------------------------------------------------------------
// Project fixture
// ---------------------------------------------------------------------------

/// In-memory project with `data`, `cache`, `temp` and `project` mounts.
pub struct TestProject {
    pub data: MemoryProvider,
    pub cache: MemoryProvider,
    pub temp: MemoryProvider,
    pub project: MemoryProvider,
    pub registry: TransformerRegistry,
}

impl TestProject {
    pub fn new() -> Self {
        Self {
            data: MemoryProvider::new(),
            cache: MemoryProvider::new(),
            temp: MemoryProvider::new(),
            project: MemoryProvider::new(),
            registry: test_registry(),
        }
    }

    pub fn vfs(&self) -> Vfs {
        let mut vfs = Vfs::new();
        vfs.mount("data", self.data.clone());
        vfs.mount("cache", self.cache.clone());
        vfs.mount("temp", self.temp.clone());
        vfs.mount("project", self.project.clone());
        vfs
    }

    pub fn manager(&self) -> AssetManager {
        self.manager_with(AssetManagerConfig::default())
    }

    pub fn manager_with(&self, config: AssetManagerConfig) -> AssetManager {
        AssetManager::new(
            self.vfs(),
            ProjectLayout::default(),
            self.registry.clone(),
            config,
        )
    }

    pub fn add_pipeline(&self, resource_name: &str, classes: &[&str]) {
        self.data.insert(resource_name, pipeline(classes));
    }

    pub fn add_file(&self, resource_name: &str) {
        self.data
            .insert(resource_name, resource_name.as_bytes().to_vec());
    }
}

/// Tick until nothing is queued or running.
pub fn settle(manager: &mut AssetManager) {
    for _ in 0..1000 {
        if manager.is_settled() {
            return;
        }
        manager.update();
    }
    panic!("asset manager did not settle");
}

// ---------------------------------------------------------------------------
// Deferred processor
// ---------------------------------------------------------------------------

/// Holds started requests until the test completes them, and records the
/// highest number of requests it saw running at once.
#[derive(Clone, Default)]
pub struct DeferredProcessor {
    state: Arc<Mutex<DeferredState>>,
}

#[derive(Default)]
struct DeferredState {
    running: Vec<TransformRequest>,
    finished: Vec<TransformResult>,
    peak: usize,
}

impl DeferredProcessor {
    pub fn running(&self) -> usize {
        self.state.lock().running.len()
    }

    pub fn peak(&self) -> usize {
        self.state.lock().peak
    }

    /// Complete every running request successfully.
    pub fn complete_all(&self) {
        let mut state = self.state.lock();
        let running = std::mem::take(&mut state.running);
        state
            .finished
            .extend(running.into_iter().map(|request| TransformResult {
                resource_name: request.resource_name,
                input_modification_time: request.input_modification_time,
                outcome: TransformOutcome::Success {
                    outputs: Vec::new(),
                    transformers: ["ModelImporter".to_owned()].into(),
                    source_modified: false,
                },
            }));
    }
}

impl AssetProcessor for DeferredProcessor {
    fn start(&mut self, request: TransformRequest, _env: &ProcessEnv<'_>) {
        let mut state = self.state.lock();
        state.running.push(request);
        state.peak = state.peak.max(state.running.len());
    }

    fn poll_completed(&mut self) -> Vec<TransformResult> {
        std::mem::take(&mut self.state.lock().finished)
    }
}
