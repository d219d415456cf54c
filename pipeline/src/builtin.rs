use serde::Deserialize;
use serde_json::Value;

use crate::error::{PipelineError, Result};
use crate::flavor::Flavor;
use crate::request::TransformRequest;
use crate::transformer::{TransformContext, Transformer, TransformerOutput};

/// Copies inputs with matching extensions into the cache unchanged.
///
/// ```json
/// { "_Class": "CopyTransformer", "Extensions": [".png", ".ogg"], "Flavor": "*" }
/// ```
///
/// An empty extension list matches every file.
#[derive(Debug, Clone)]
pub struct CopyTransformer {
    extensions: Vec<String>,
    flavor: Flavor,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CopySettings {
    #[serde(default)]
    extensions: Vec<String>,
    #[serde(default)]
    flavor: Flavor,
}

impl CopyTransformer {
    pub const TYPE_NAME: &'static str = "CopyTransformer";

    pub fn new(extensions: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            extensions: extensions
                .into_iter()
                .map(|ext| normalize_extension(&Into::<String>::into(ext)))
                .collect(),
            flavor: Flavor::any(),
        }
    }

    pub fn with_flavor(mut self, flavor: Flavor) -> Self {
        self.flavor = flavor;
        self
    }

    pub fn from_settings(settings: &Value) -> Result<Self> {
        let parsed = CopySettings::deserialize(settings).map_err(|err| {
            PipelineError::TransformerSettings {
                class: Self::TYPE_NAME.into(),
                message: err.to_string(),
            }
        })?;
        Ok(Self::new(parsed.extensions).with_flavor(parsed.flavor))
    }
}

fn normalize_extension(ext: &str) -> String {
    let ext = ext.trim().to_lowercase();
    if ext.starts_with('.') { ext } else { format!(".{ext}") }
}

impl Transformer for CopyTransformer {
    fn type_name(&self) -> &str {
        Self::TYPE_NAME
    }

    fn is_flavor_compatible(&self, flavor: &Flavor) -> bool {
        self.flavor.matches(flavor)
    }

    fn is_applicable(&self, request: &TransformRequest) -> bool {
        if self.extensions.is_empty() {
            return true;
        }
        let name = request.resource_name.to_lowercase();
        self.extensions.iter().any(|ext| name.ends_with(ext.as_str()))
    }

    fn execute(
        &self,
        ctx: &TransformContext<'_>,
        request: &TransformRequest,
        _output: &mut TransformerOutput,
    ) -> Result<()> {
        let data = ctx.read_input(request)?;
        ctx.write_output(request, &request.resource_name, data)
    }
}
