use kiln_vfs::VfsError;
use thiserror::Error;

/// Errors produced by the asset pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("VFS error: {0}")]
    Vfs(#[from] VfsError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("unknown transformer class `{0}`")]
    UnknownTransformer(String),

    #[error("invalid settings for transformer `{class}`: {message}")]
    TransformerSettings { class: String, message: String },

    #[error("transform of {resource} failed: {message}")]
    Transform { resource: String, message: String },

    #[error("remote processing failed: {0}")]
    Remote(String),
}

impl PipelineError {
    pub(crate) fn json(path: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Json {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T, E = PipelineError> = std::result::Result<T, E>;
