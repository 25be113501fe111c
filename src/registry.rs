//! Package registries mapping logical names onto package definitions.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::models::PackageDefinition;

/// Named package definitions for one asset type.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct PackageRegistry {
  packages: BTreeMap<String, PackageDefinition>,
}

impl PackageRegistry {
  /// Create an empty registry.
  pub fn new() -> Self {
    Self::default()
  }

  /// Look up a registered package.
  pub fn get(&self, name: &str) -> Option<&PackageDefinition> {
    self.packages.get(name)
  }

  /// Register or replace a package.
  pub fn insert(&mut self, name: impl Into<String>, definition: PackageDefinition) {
    self.packages.insert(name.into(), definition);
  }

  /// Builder-style variant of [`PackageRegistry::insert`].
  pub fn with(mut self, name: impl Into<String>, definition: PackageDefinition) -> Self {
    self.insert(name, definition);
    self
  }

  /// Number of registered packages.
  pub fn len(&self) -> usize {
    self.packages.len()
  }

  /// Returns true when nothing is registered.
  pub fn is_empty(&self) -> bool {
    self.packages.is_empty()
  }

  /// A one-entry view holding only `name`.
  ///
  /// Names missing from the registry are wrapped as a singleton package whose only source is
  /// the name itself, so a bare asset path can be referenced like a package.
  pub fn scoped(&self, name: &str) -> Self {
    let definition = match self.get(name) {
      Some(definition) => definition.clone(),
      None => {
        tracing::debug!("package {name:?} is not registered, treating it as a bare asset path");
        PackageDefinition::singleton(name)
      }
    };

    Self::default().with(name, definition)
  }
}
