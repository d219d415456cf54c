//! Incremental asset pipeline.
//!
//! Inputs live under the `data` mount of a [`Vfs`](kiln_vfs::Vfs). Pipeline
//! files (`AssetPipeline.json`, `*.assetpipeline`) declare which
//! [`Transformer`]s apply under their directory and how transformer types
//! depend on each other. The [`AssetManager`] keeps a durable
//! [`AssetCache`] of what was produced from each input, notices what became
//! stale and feeds requests through a [`Dispatcher`] with bounded
//! concurrency.
//!
//! ```text
//! change feed ─▶ path updates ─▶ pipeline reload ─▶ invalidation
//!      ─▶ scan ─▶ request queue ─▶ processor ─▶ cache update
//! ```
//!
//! Everything runs on the caller's thread through
//! [`AssetManager::update`]. Only [`RemoteProcessor`] runs work in the
//! background, on a tokio runtime, and reports back through an
//! [`IoHandle`].

mod asset_pipeline;
mod builtin;
mod cache;
mod config;
mod dispatcher;
mod error;
mod flavor;
mod hierarchy;
mod io_handle;
mod layout;
mod manager;
mod processor;
mod registry;
#[cfg(feature = "remote")]
mod remote;
mod request;
pub mod resource_path;
mod transformer;
mod watch;

pub use asset_pipeline::{
    PIPELINE_FILE_EXTENSION, PIPELINE_FILE_NAME, PipelineChange, PipelineDescriptor,
    PipelineFileTimes, changed_pipeline_files, diff_asset_pipelines,
    enumerate_asset_pipeline_files, is_pipeline_file, load_asset_pipelines, parse_asset_pipeline,
};
pub use builtin::CopyTransformer;
pub use cache::{AssetCache, AssetDescriptor};
pub use config::AssetManagerConfig;
pub use dispatcher::Dispatcher;
pub use error::{PipelineError, Result};
pub use flavor::Flavor;
pub use hierarchy::TransformerHierarchy;
pub use io_handle::IoHandle;
pub use layout::ProjectLayout;
pub use manager::{AssetManager, ManagerState, Progress, ScanStats};
pub use processor::{AssetProcessor, InProcessProcessor, ProcessEnv, execute_and_store};
pub use registry::TransformerRegistry;
#[cfg(feature = "remote")]
pub use remote::{
    CommandOutput, REQUEST_PLACEHOLDER, RESPONSE_PLACEHOLDER, RemoteProcessor, run_command,
};
pub use request::{TransformOutcome, TransformRequest, TransformResult};
pub use transformer::{
    TransformContext, Transformer, TransformerOutput, execute_chain, is_applicable_any,
};
pub use watch::{ChangeQueue, ChangeSource, FileChange, compress_path_updates};
