//! `kiln` command line tool.
//!
//! Builds the asset cache of a project described by `project.toml`, keeps
//! it up to date while watching the data directory, and serves as the
//! worker process for out-of-process transforms.

mod fs_watcher;
mod project;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use kiln_pipeline::{AssetManager, RemoteProcessor, TransformRequest, TransformerRegistry};

use crate::fs_watcher::FsWatcher;
use crate::project::Project;

/// Kiln asset pipeline.
#[derive(Parser, Debug)]
#[command(name = "kiln", about = "Incremental asset pipeline", version)]
struct Cli {
    /// Path to the project file.
    #[arg(long, global = true, default_value = "project.toml")]
    project: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Process every stale asset once and exit.
    Build {
        /// Reprocess everything under this data path (repeatable).
        #[arg(long)]
        dirty: Vec<String>,
    },
    /// Keep the cache up to date until interrupted.
    Watch {
        /// Delay between ticks in milliseconds.
        #[arg(long, default_value = "100")]
        tick_ms: u64,
    },
    /// Run a single transform request; used by remote workers.
    Process {
        /// Request JSON file.
        #[arg(long)]
        request: PathBuf,
        /// Where to write the result JSON.
        #[arg(long)]
        response: PathBuf,
    },
    /// Print what the cache currently knows.
    Status,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let result = project::load_or_default(&cli.project).and_then(|project| match cli.command {
        Command::Build { dirty } => build(&project, &dirty),
        Command::Watch { tick_ms } => watch(&project, Duration::from_millis(tick_ms.max(1))),
        Command::Process { request, response } => process(&project, &request, &response),
        Command::Status => status(&project),
    });

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

/// Create a manager over the project's directories with the saved cache
/// state loaded.
fn open_manager(project: &Project) -> Result<AssetManager, String> {
    let vfs = project::build_vfs(project)?;
    let mut manager = AssetManager::new(
        vfs,
        project.layout(),
        TransformerRegistry::with_builtins(),
        project.config.pipeline.clone(),
    );
    manager.load_state(&project.state_path());
    Ok(manager)
}

/// Switch to worker processes if the project asks for it.
///
/// Returns whether requests now complete in the background.
fn attach_remote(manager: &mut AssetManager, project: &Project) -> Result<bool, String> {
    let (Some(command), Some(exchange_dir)) = (project.remote_command()?, project.exchange_dir())
    else {
        return Ok(false);
    };
    log::info!("Running transforms out of process: {}", command.join(" "));
    let processor = RemoteProcessor::new(command, exchange_dir).map_err(|e| e.to_string())?;
    manager.set_processor(Box::new(processor));
    Ok(true)
}

fn save(manager: &AssetManager, project: &Project) -> Result<(), String> {
    manager
        .save_state(&project.state_path())
        .map_err(|e| e.to_string())
}

fn build(project: &Project, dirty: &[String]) -> Result<(), String> {
    let mut manager = open_manager(project)?;
    let background = attach_remote(&mut manager, project)?;
    for path in dirty {
        manager.mark_cache_dirty(path);
    }

    manager.initialize(false);
    while !manager.is_settled() {
        manager.update();
        if background && !manager.is_settled() {
            std::thread::sleep(Duration::from_millis(10));
        }
    }

    let scan = manager.last_scan();
    log::info!(
        "Build finished: {} processed, {} up to date, {} ignored",
        scan.processed,
        scan.up_to_date,
        scan.ignored
    );
    save(&manager, project)
}

fn watch(project: &Project, tick: Duration) -> Result<(), String> {
    let mut manager = open_manager(project)?;
    attach_remote(&mut manager, project)?;

    let data_root = project.resolve(&project.config.paths.data);
    let watcher = FsWatcher::new(&data_root)
        .ok_or_else(|| format!("failed to watch {}", data_root.display()))?;
    manager.set_change_source(Box::new(watcher));

    manager.initialize(false);
    let mut was_settled = false;
    loop {
        manager.update();

        let settled = manager.is_settled();
        if settled && !was_settled {
            save(&manager, project)?;
        } else if !settled {
            let progress = manager.progress();
            log::debug!("Processing assets: {}/{}", progress.completed, progress.total);
        }
        was_settled = settled;

        std::thread::sleep(tick);
    }
}

fn process(
    project: &Project,
    request_file: &Path,
    response_file: &Path,
) -> Result<(), String> {
    let bytes = std::fs::read(request_file)
        .map_err(|e| format!("failed to read {}: {e}", request_file.display()))?;
    let request: TransformRequest = serde_json::from_slice(&bytes)
        .map_err(|e| format!("failed to parse {}: {e}", request_file.display()))?;

    let mut manager = open_manager(project)?;
    manager.initialize(true);
    let result = manager.process_request(&request);
    log::debug!(
        "Processed {} in worker: {}",
        request.resource_name,
        if result.is_success() { "ok" } else { "failed" }
    );

    let json = serde_json::to_vec_pretty(&result).map_err(|e| e.to_string())?;
    std::fs::write(response_file, json)
        .map_err(|e| format!("failed to write {}: {e}", response_file.display()))
}

fn status(project: &Project) -> Result<(), String> {
    let mut manager = open_manager(project)?;
    manager.initialize(true);

    let cache = manager.cache();
    println!("Project: {}", project.config.project.name);
    println!("Pipelines: {}", manager.pipelines().len());
    println!("Cached assets: {}", cache.len());
    for asset in cache.assets() {
        let marker = if asset.cache_invalid { "stale" } else { "ok" };
        println!(
            "  [{marker}] {} <- {} ({} outputs)",
            asset.resource_name,
            asset.transformer_summary(),
            asset.outputs.len()
        );
    }
    Ok(())
}
