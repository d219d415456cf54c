use std::collections::BTreeSet;

use kiln_vfs::FileTime;
use serde::{Deserialize, Serialize};

use crate::flavor::Flavor;

/// A unit of work: transform one input resource for one flavor.
///
/// All file fields are VFS paths. `output_file` is the input's resource
/// name placed under the request's unique `temp_path`, so transformers
/// writing next to it stay inside the staging directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TransformRequest {
    pub resource_name: String,
    pub flavor: Flavor,
    pub input_file: String,
    pub output_file: String,
    pub temp_path: String,
    pub input_modification_time: FileTime,
}

impl TransformRequest {
    /// Staging path for an output named relative to the cache root.
    pub fn staged_output(&self, output_name: &str) -> String {
        kiln_vfs::path::join(&self.temp_path, output_name)
    }
}

/// Outcome of a [`TransformRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TransformResult {
    pub resource_name: String,
    pub input_modification_time: FileTime,
    pub outcome: TransformOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "Status")]
pub enum TransformOutcome {
    #[serde(rename_all = "PascalCase")]
    Success {
        /// Cache-relative output names, sorted.
        outputs: Vec<String>,
        transformers: BTreeSet<String>,
        source_modified: bool,
    },
    #[serde(rename_all = "PascalCase")]
    Failure { message: String },
}

impl TransformResult {
    pub fn failure(request: &TransformRequest, message: impl Into<String>) -> Self {
        Self {
            resource_name: request.resource_name.clone(),
            input_modification_time: request.input_modification_time,
            outcome: TransformOutcome::Failure {
                message: message.into(),
            },
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, TransformOutcome::Success { .. })
    }
}
