use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::flavor::Flavor;
use crate::resource_path::{is_under, to_scope};
use crate::transformer::Transformer;

/// Path-scoped transformer instances plus a type-level dependency graph.
///
/// Transformers registered at scope `Models/` apply to every resource under
/// `Models/`. For a resource, candidates are gathered from every matching
/// scope, shallowest first. An instance in a deeper scope takes precedence
/// over a shallower instance of the same type and is placed after the
/// shallower scope's instances.
///
/// Dependencies are edges `(dependent, dependency)` between type names;
/// after [`commit_dependencies`](Self::commit_dependencies) candidates are
/// ordered so every dependent runs after its (transitive) dependencies.
#[derive(Debug, Default)]
pub struct TransformerHierarchy {
    scopes: BTreeMap<String, Vec<Arc<dyn Transformer>>>,
    pending_edges: Vec<(String, String)>,
    /// Type → every type it must run after.
    committed: BTreeMap<String, BTreeSet<String>>,
}

impl TransformerHierarchy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_transformer(&mut self, scope: &str, transformer: Arc<dyn Transformer>) {
        self.scopes
            .entry(to_scope(scope))
            .or_default()
            .push(transformer);
    }

    /// Declare that `dependent` must run after `dependency`.
    ///
    /// Takes effect on the next [`commit_dependencies`](Self::commit_dependencies).
    pub fn add_dependency(&mut self, dependent: impl Into<String>, dependency: impl Into<String>) {
        self.pending_edges.push((dependent.into(), dependency.into()));
    }

    /// Build the transitive dependency closure from the declared edges.
    ///
    /// An edge that would close a cycle is dropped with an error log; the
    /// edges declared before it are kept.
    pub fn commit_dependencies(&mut self) {
        let mut closure: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for (dependent, dependency) in std::mem::take(&mut self.pending_edges) {
            let creates_cycle = dependent == dependency
                || closure
                    .get(&dependency)
                    .is_some_and(|deps| deps.contains(&dependent));
            if creates_cycle {
                log::error!(
                    "Ignoring transformer dependency {dependent} -> {dependency}: it forms a cycle"
                );
                continue;
            }

            let mut added: BTreeSet<String> = closure.get(&dependency).cloned().unwrap_or_default();
            added.insert(dependency.clone());

            // Everything that already runs after `dependent` now also runs
            // after `dependency` and its dependencies.
            for (ty, deps) in closure.iter_mut() {
                if deps.contains(&dependent) {
                    deps.extend(added.iter().cloned());
                }
                debug_assert!(!deps.contains(ty));
            }
            closure.entry(dependent).or_default().extend(added);
        }
        self.committed = closure;
    }

    pub fn clear(&mut self) {
        self.scopes.clear();
        self.pending_edges.clear();
        self.committed.clear();
    }

    /// Remove every instance of `type_name`. Returns whether any was removed.
    pub fn remove_transformers(&mut self, type_name: &str) -> bool {
        let mut removed = false;
        for transformers in self.scopes.values_mut() {
            let before = transformers.len();
            transformers.retain(|t| t.type_name() != type_name);
            removed |= transformers.len() != before;
        }
        self.scopes.retain(|_, transformers| !transformers.is_empty());
        removed
    }

    /// Whether `dependent` is committed to run after `dependency`.
    pub fn depends_on(&self, dependent: &str, dependency: &str) -> bool {
        self.committed
            .get(dependent)
            .is_some_and(|deps| deps.contains(dependency))
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }

    /// Ordered transformers that may process `resource_name` for `flavor`.
    pub fn candidates(&self, resource_name: &str, flavor: &Flavor) -> Vec<Arc<dyn Transformer>> {
        let mut gathered: Vec<Arc<dyn Transformer>> = Vec::new();
        for (scope, transformers) in &self.scopes {
            if !is_under(resource_name, scope) {
                continue;
            }
            let scoped: Vec<&Arc<dyn Transformer>> = transformers
                .iter()
                .filter(|t| t.is_flavor_compatible(flavor))
                .collect();
            gathered.retain(|existing| {
                !scoped
                    .iter()
                    .any(|t| t.type_name() == existing.type_name())
            });
            gathered.extend(scoped.into_iter().cloned());
        }
        self.sort_by_dependencies(gathered)
    }

    /// Stable topological sort: repeatedly take the earliest transformer
    /// whose dependencies among the remaining ones are all placed.
    fn sort_by_dependencies(
        &self,
        mut remaining: Vec<Arc<dyn Transformer>>,
    ) -> Vec<Arc<dyn Transformer>> {
        let mut sorted = Vec::with_capacity(remaining.len());
        while !remaining.is_empty() {
            let ready = remaining.iter().position(|candidate| {
                !remaining.iter().any(|other| {
                    other.type_name() != candidate.type_name()
                        && self.depends_on(candidate.type_name(), other.type_name())
                })
            });
            // Committed edges are acyclic, so some candidate is always ready.
            let index = ready.unwrap_or(0);
            sorted.push(remaining.remove(index));
        }
        sorted
    }
}
