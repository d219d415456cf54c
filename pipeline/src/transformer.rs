use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use kiln_vfs::{Vfs, poll_now};

use crate::error::Result;
use crate::flavor::Flavor;
use crate::request::TransformRequest;

/// A step that turns one input resource into cache outputs.
///
/// Instances are created from pipeline files by the
/// [`TransformerRegistry`](crate::TransformerRegistry) and shared between
/// the hierarchy and in-flight work, hence `Send + Sync`.
pub trait Transformer: Send + Sync {
    /// Type name used in pipeline files, dependency edges and the cache.
    fn type_name(&self) -> &str;

    /// Whether this instance may run for the given target flavor.
    fn is_flavor_compatible(&self, _flavor: &Flavor) -> bool {
        true
    }

    /// Whether this transformer wants to process the request's input.
    fn is_applicable(&self, request: &TransformRequest) -> bool;

    /// Produce outputs for the request into its staging directory.
    fn execute(
        &self,
        ctx: &TransformContext<'_>,
        request: &TransformRequest,
        output: &mut TransformerOutput,
    ) -> Result<()>;
}

impl fmt::Debug for dyn Transformer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transformer")
            .field("type_name", &self.type_name())
            .finish()
    }
}

/// Accumulated result of running a transformer chain.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TransformerOutput {
    pub applied_transformers: BTreeSet<String>,
    /// Set when a transformer rewrote the input file itself.
    pub source_modified: bool,
}

/// Services available to a running transformer.
pub struct TransformContext<'a> {
    pub vfs: &'a Vfs,
}

impl TransformContext<'_> {
    pub fn read_input(&self, request: &TransformRequest) -> Result<Vec<u8>> {
        Ok(poll_now(self.vfs.read(&request.input_file))?)
    }

    /// Write an output named relative to the cache root into staging.
    pub fn write_output(
        &self,
        request: &TransformRequest,
        output_name: &str,
        data: Vec<u8>,
    ) -> Result<()> {
        poll_now(self.vfs.write(&request.staged_output(output_name), data))?;
        Ok(())
    }
}

/// Whether any of the transformers applies to the request.
pub fn is_applicable_any(request: &TransformRequest, transformers: &[Arc<dyn Transformer>]) -> bool {
    transformers.iter().any(|t| t.is_applicable(request))
}

/// Run every applicable transformer in order.
///
/// Stops at the first failure.
pub fn execute_chain(
    ctx: &TransformContext<'_>,
    request: &TransformRequest,
    transformers: &[Arc<dyn Transformer>],
) -> Result<TransformerOutput> {
    let mut output = TransformerOutput::default();
    for transformer in transformers {
        if !transformer.is_applicable(request) {
            continue;
        }
        transformer.execute(ctx, request, &mut output)?;
        output
            .applied_transformers
            .insert(transformer.type_name().to_owned());
    }
    Ok(output)
}
