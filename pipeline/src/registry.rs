use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;

use crate::builtin::CopyTransformer;
use crate::error::{PipelineError, Result};
use crate::transformer::Transformer;

type Factory = Arc<dyn Fn(&Value) -> Result<Arc<dyn Transformer>> + Send + Sync>;

/// Maps transformer class names to factories.
///
/// Pipeline files name transformers by class (`"_Class"`) and carry their
/// settings inline; the registry turns such an entry into an instance.
/// Unregistering a class queues a removal event that the
/// [`AssetManager`](crate::AssetManager) drains on its next tick.
///
/// `Clone` shares the same table.
#[derive(Clone, Default)]
pub struct TransformerRegistry {
    inner: Arc<RwLock<RegistryInner>>,
}

#[derive(Default)]
struct RegistryInner {
    factories: BTreeMap<String, Factory>,
    removed: Vec<String>,
}

impl TransformerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the transformers shipped in this crate.
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        registry.register(CopyTransformer::TYPE_NAME, |settings| {
            Ok(Arc::new(CopyTransformer::from_settings(settings)?))
        });
        registry
    }

    /// Register a factory, replacing any previous one for the class.
    pub fn register<F>(&self, class: impl Into<String>, factory: F)
    where
        F: Fn(&Value) -> Result<Arc<dyn Transformer>> + Send + Sync + 'static,
    {
        self.inner
            .write()
            .factories
            .insert(class.into(), Arc::new(factory));
    }

    /// Remove a class. Returns `false` if it was not registered.
    pub fn unregister(&self, class: &str) -> bool {
        let mut inner = self.inner.write();
        if inner.factories.remove(class).is_none() {
            return false;
        }
        inner.removed.push(class.to_owned());
        true
    }

    pub fn contains(&self, class: &str) -> bool {
        self.inner.read().factories.contains_key(class)
    }

    pub fn type_names(&self) -> Vec<String> {
        self.inner.read().factories.keys().cloned().collect()
    }

    /// Instantiate `class` from its pipeline-file settings.
    pub fn create(&self, class: &str, settings: &Value) -> Result<Arc<dyn Transformer>> {
        let factory = self
            .inner
            .read()
            .factories
            .get(class)
            .cloned()
            .ok_or_else(|| PipelineError::UnknownTransformer(class.to_owned()))?;
        factory(settings)
    }

    /// Drain classes unregistered since the last call.
    pub fn take_removed(&self) -> Vec<String> {
        std::mem::take(&mut self.inner.write().removed)
    }
}
