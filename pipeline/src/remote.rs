use std::path::{Path, PathBuf};
use std::task::Poll;

use uuid::Uuid;

use crate::error::{PipelineError, Result};
use crate::io_handle::IoHandle;
use crate::processor::{AssetProcessor, ProcessEnv};
use crate::request::{TransformRequest, TransformResult};

/// Placeholder replaced with the request file path in command templates.
pub const REQUEST_PLACEHOLDER: &str = "{request}";
/// Placeholder replaced with the response file path in command templates.
pub const RESPONSE_PLACEHOLDER: &str = "{response}";

/// Exit code and combined stdout/stderr of a finished command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub output: String,
}

/// Run a command line and capture its output.
///
/// A process killed by a signal reports exit code `-1`.
pub async fn run_command(command: &[String]) -> Result<CommandOutput> {
    let (program, args) = command
        .split_first()
        .ok_or_else(|| PipelineError::Remote("empty command".into()))?;

    let output = tokio::process::Command::new(program)
        .args(args)
        .kill_on_drop(true)
        .output()
        .await?;

    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    text.push_str(&String::from_utf8_lossy(&output.stderr));
    Ok(CommandOutput {
        exit_code: output.status.code().unwrap_or(-1),
        output: text,
    })
}

/// Runs each request in a separate process.
///
/// The request is written as JSON into `exchange_dir`, the command template
/// is run with `{request}` and `{response}` replaced by the file paths, and
/// the response JSON is read back once the command exits with code 0. A
/// non-zero exit code or an unreadable response fails only that request.
///
/// Commands run on a background tokio runtime; [`poll_completed`] never
/// blocks.
///
/// [`poll_completed`]: AssetProcessor::poll_completed
pub struct RemoteProcessor {
    runtime: tokio::runtime::Runtime,
    command: Vec<String>,
    exchange_dir: PathBuf,
    pending: Vec<(TransformRequest, IoHandle<Result<TransformResult>>)>,
}

impl RemoteProcessor {
    pub fn new(command: Vec<String>, exchange_dir: impl Into<PathBuf>) -> Result<Self> {
        if command.is_empty() {
            return Err(PipelineError::Remote("empty command template".into()));
        }
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()?;
        Ok(Self {
            runtime,
            command,
            exchange_dir: exchange_dir.into(),
            pending: Vec::new(),
        })
    }

    pub fn in_flight(&self) -> usize {
        self.pending.len()
    }

    fn command_for(&self, request_file: &Path, response_file: &Path) -> Vec<String> {
        let request = request_file.to_string_lossy();
        let response = response_file.to_string_lossy();
        self.command
            .iter()
            .map(|arg| {
                arg.replace(REQUEST_PLACEHOLDER, &request)
                    .replace(RESPONSE_PLACEHOLDER, &response)
            })
            .collect()
    }
}

async fn exchange(
    request_json: Vec<u8>,
    command: Vec<String>,
    request_file: PathBuf,
    response_file: PathBuf,
) -> Result<TransformResult> {
    if let Some(parent) = request_file.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(&request_file, request_json).await?;

    let finished = run_command(&command).await;
    let _ = tokio::fs::remove_file(&request_file).await;
    let finished = finished?;

    if finished.exit_code != 0 {
        let _ = tokio::fs::remove_file(&response_file).await;
        return Err(PipelineError::Remote(format!(
            "command exited with code {}: {}",
            finished.exit_code,
            finished.output.trim()
        )));
    }

    let bytes = tokio::fs::read(&response_file).await?;
    let _ = tokio::fs::remove_file(&response_file).await;
    serde_json::from_slice(&bytes)
        .map_err(|err| PipelineError::json(response_file.to_string_lossy(), err))
}

impl AssetProcessor for RemoteProcessor {
    fn start(&mut self, request: TransformRequest, _env: &ProcessEnv<'_>) {
        let (sender, handle) = IoHandle::channel();

        let id = Uuid::new_v4();
        let request_file = self.exchange_dir.join(format!("{id}.request.json"));
        let response_file = self.exchange_dir.join(format!("{id}.response.json"));
        let command = self.command_for(&request_file, &response_file);

        match serde_json::to_vec_pretty(&request) {
            Ok(request_json) => {
                log::debug!("Starting remote processing of {}", request.resource_name);
                self.runtime.spawn(async move {
                    let result = exchange(request_json, command, request_file, response_file).await;
                    let _ = sender.send(result);
                });
            }
            Err(err) => {
                let _ = sender.send(Err(PipelineError::json(&request.resource_name, err)));
            }
        }

        self.pending.push((request, handle));
    }

    fn poll_completed(&mut self) -> Vec<TransformResult> {
        let mut completed = Vec::new();
        self.pending.retain(|(request, handle)| match handle.check() {
            Poll::Pending => true,
            Poll::Ready(Some(Ok(result))) => {
                completed.push(result);
                false
            }
            Poll::Ready(Some(Err(err))) => {
                completed.push(TransformResult::failure(request, err.to_string()));
                false
            }
            Poll::Ready(None) => {
                completed.push(TransformResult::failure(request, "remote task was dropped"));
                false
            }
        });
        completed
    }
}
