use kiln_vfs::{ScanKind, Vfs, poll_now};

use crate::error::{PipelineError, Result};
use crate::hierarchy::TransformerHierarchy;
use crate::layout::ProjectLayout;
use crate::request::{TransformOutcome, TransformRequest, TransformResult};
use crate::transformer::{TransformContext, execute_chain};

/// What a processor may use while starting a request.
#[derive(Clone, Copy)]
pub struct ProcessEnv<'a> {
    pub vfs: &'a Vfs,
    pub layout: &'a ProjectLayout,
    pub hierarchy: &'a TransformerHierarchy,
}

/// Executes transform requests on behalf of the
/// [`Dispatcher`](crate::Dispatcher).
///
/// Every started request must eventually come back from
/// [`poll_completed`](Self::poll_completed) exactly once, as a success or a
/// failure.
pub trait AssetProcessor {
    fn start(&mut self, request: TransformRequest, env: &ProcessEnv<'_>);

    /// Results that finished since the last call.
    fn poll_completed(&mut self) -> Vec<TransformResult>;
}

/// Runs the transformer chain synchronously inside [`start`](AssetProcessor::start).
#[derive(Default)]
pub struct InProcessProcessor {
    completed: Vec<TransformResult>,
}

impl InProcessProcessor {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AssetProcessor for InProcessProcessor {
    fn start(&mut self, request: TransformRequest, env: &ProcessEnv<'_>) {
        self.completed.push(execute_and_store(env, &request));
    }

    fn poll_completed(&mut self) -> Vec<TransformResult> {
        std::mem::take(&mut self.completed)
    }
}

/// Run the candidate chain for a request, then move its staged outputs from
/// the request's temporary directory into the cache.
///
/// The temporary directory is removed whether or not the chain succeeds.
pub fn execute_and_store(env: &ProcessEnv<'_>, request: &TransformRequest) -> TransformResult {
    let outcome = run_and_store(env, request);
    remove_temp_dir(env.vfs, &request.temp_path);

    match outcome {
        Ok(outcome) => TransformResult {
            resource_name: request.resource_name.clone(),
            input_modification_time: request.input_modification_time,
            outcome,
        },
        Err(err) => TransformResult::failure(request, err.to_string()),
    }
}

fn run_and_store(env: &ProcessEnv<'_>, request: &TransformRequest) -> Result<TransformOutcome> {
    let transformers = env
        .hierarchy
        .candidates(&request.resource_name, &request.flavor);
    let ctx = TransformContext { vfs: env.vfs };
    let output = execute_chain(&ctx, request, &transformers)?;

    if output.applied_transformers.is_empty() {
        return Err(PipelineError::Transform {
            resource: request.resource_name.clone(),
            message: "no applicable transformer".into(),
        });
    }

    let staged = poll_now(env.vfs.scan(&request.temp_path, ScanKind::Files))?;
    for output_name in &staged {
        poll_now(env.vfs.copy(
            &request.staged_output(output_name),
            &env.layout.cache_path(output_name),
        ))?;
    }

    Ok(TransformOutcome::Success {
        outputs: staged,
        transformers: output.applied_transformers,
        source_modified: output.source_modified,
    })
}

fn remove_temp_dir(vfs: &Vfs, temp_path: &str) {
    match poll_now(vfs.remove_dir(temp_path)) {
        Ok(()) => {}
        Err(err) if err.is_not_found() => {}
        Err(err) => log::warn!("Failed to remove temporary directory {temp_path}: {err}"),
    }
}
