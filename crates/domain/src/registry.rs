//! Model registry — the set of entity types rules may target.

use std::collections::BTreeMap;

use crate::error::ResolutionError;
use crate::schema::{ModelKey, ModelSchema};

/// Immutable map from [`ModelKey`] to [`ModelSchema`], built once at startup.
#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    schemas: BTreeMap<ModelKey, ModelSchema>,
}

impl ModelRegistry {
    #[must_use]
    pub fn builder() -> ModelRegistryBuilder {
        ModelRegistryBuilder::default()
    }

    #[must_use]
    pub fn get(&self, key: &ModelKey) -> Option<&ModelSchema> {
        self.schemas.get(key)
    }

    /// Like [`get`](Self::get) but failing with a resolution error.
    ///
    /// # Errors
    ///
    /// Returns [`ResolutionError::UnknownModel`] when `key` is not registered.
    pub fn require(&self, key: &ModelKey) -> Result<&ModelSchema, ResolutionError> {
        self.get(key)
            .ok_or_else(|| ResolutionError::UnknownModel(key.to_string()))
    }

    /// Resolve a raw dotted key, as stored on a rule.
    ///
    /// # Errors
    ///
    /// Returns [`ResolutionError::UnknownModel`] when `raw` is malformed or
    /// not registered.
    pub fn resolve(&self, raw: &str) -> Result<&ModelSchema, ResolutionError> {
        let key =
            ModelKey::parse(raw).map_err(|_| ResolutionError::UnknownModel(raw.to_string()))?;
        self.require(&key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ModelSchema> {
        self.schemas.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}

/// Builder for [`ModelRegistry`].
#[derive(Debug, Default)]
pub struct ModelRegistryBuilder {
    schemas: BTreeMap<ModelKey, ModelSchema>,
}

impl ModelRegistryBuilder {
    /// Add a schema; a later registration for the same key replaces it.
    #[must_use]
    pub fn register(mut self, schema: ModelSchema) -> Self {
        self.schemas.insert(schema.key.clone(), schema);
        self
    }

    #[must_use]
    pub fn build(self) -> ModelRegistry {
        ModelRegistry {
            schemas: self.schemas,
        }
    }
}
