use std::collections::HashMap;
use std::sync::Arc;

use crate::action::ActionKind;
use crate::builtin;
use crate::comparator::ComparatorDef;
use crate::resolver::OperandResolver;

/// Error building a registry.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
  /// The same id was registered twice on a builder that rejects overrides.
  #[error("conflicting {category} registration: {id}")]
  Conflict { category: &'static str, id: String },
}

/// Read-only capability maps consulted by the engine.
#[derive(Clone, Default)]
pub struct Registry {
  actions: HashMap<String, ActionKind>,
  comparators: HashMap<String, ComparatorDef>,
  resolvers: HashMap<String, Arc<dyn OperandResolver>>,
}

impl Registry {
  pub fn builder() -> RegistryBuilder {
    RegistryBuilder::default()
  }

  /// A registry holding only the core comparators.
  pub fn core() -> Self {
    Self::core_builder().build_lenient()
  }

  /// A builder pre-populated with the core comparators.
  pub fn core_builder() -> RegistryBuilder {
    let mut builder = RegistryBuilder::default();
    for comparator in builtin::comparators() {
      builder = builder.comparator(comparator);
    }
    builder
  }

  pub fn action(&self, kind: &str) -> Option<&ActionKind> {
    self.actions.get(kind)
  }

  pub fn comparator(&self, id: &str) -> Option<&ComparatorDef> {
    self.comparators.get(id)
  }

  pub fn resolver(&self, kind: &str) -> Option<&Arc<dyn OperandResolver>> {
    self.resolvers.get(kind)
  }
}

impl std::fmt::Debug for Registry {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let mut resolvers: Vec<_> = self.resolvers.keys().collect();
    resolvers.sort();
    f.debug_struct("Registry")
      .field("actions", &self.actions)
      .field("comparators", &self.comparators)
      .field("resolvers", &resolvers)
      .finish()
  }
}

/// Builder for [`Registry`].
///
/// Later registrations replace earlier ones with the same id. Call
/// [`RegistryBuilder::build`] to reject such conflicts instead.
#[derive(Default)]
pub struct RegistryBuilder {
  registry: Registry,
  conflicts: Vec<RegistryError>,
}

impl RegistryBuilder {
  pub fn action(mut self, action: ActionKind) -> Self {
    if let Some(previous) = self.registry.actions.insert(action.kind.clone(), action) {
      self.conflict("action kind", previous.kind);
    }
    self
  }

  pub fn comparator(mut self, comparator: ComparatorDef) -> Self {
    if let Some(previous) = self
      .registry
      .comparators
      .insert(comparator.id.clone(), comparator)
    {
      self.conflict("comparator", previous.id);
    }
    self
  }

  /// Register a resolver for an operand kind. For `fn` operands the key is
  /// the operand's `fnId`.
  pub fn resolver(mut self, kind: impl Into<String>, resolver: impl OperandResolver + 'static) -> Self {
    let kind = kind.into();
    if self
      .registry
      .resolvers
      .insert(kind.clone(), Arc::new(resolver))
      .is_some()
    {
      self.conflict("operand resolver", kind);
    }
    self
  }

  fn conflict(&mut self, category: &'static str, id: String) {
    self.conflicts.push(RegistryError::Conflict { category, id });
  }

  /// Build, failing on the first id registered twice.
  pub fn build(mut self) -> Result<Registry, RegistryError> {
    if self.conflicts.is_empty() {
      Ok(self.registry)
    } else {
      Err(self.conflicts.remove(0))
    }
  }

  /// Build, letting later registrations win.
  pub fn build_lenient(self) -> Registry {
    self.registry
  }
}
