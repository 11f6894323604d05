//! Dotted attribute paths.
//!
//! A path such as `employee_id__department__name` names a chain of field
//! lookups starting at a root model. Compiling it against a
//! [`ModelRegistry`](crate::registry::ModelRegistry) checks every hop once
//! and records, for each hop, whether it follows a single reference, fans
//! out over a set, or reads a plain value.

use std::fmt;

use serde::Serialize;

use crate::error::ResolutionError;
use crate::registry::ModelRegistry;
use crate::schema::{FieldKind, ModelKey};

/// Separator between the segments of a dotted path.
pub const SEPARATOR: &str = "__";

/// One compiled hop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Step {
    /// Model the field is read from.
    pub model: ModelKey,
    pub field: String,
    pub kind: FieldKind,
}

/// A path whose every segment was checked against the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompiledPath {
    raw: String,
    root: ModelKey,
    steps: Vec<Step>,
}

impl CompiledPath {
    /// Compile `raw` starting at `root`.
    ///
    /// # Errors
    ///
    /// - [`ResolutionError::UnknownModel`] if `root` or a relation target is
    ///   not registered
    /// - [`ResolutionError::UnknownField`] if a segment does not exist
    /// - [`ResolutionError::NotARelation`] if a scalar is followed by more
    ///   segments
    pub fn compile(
        registry: &ModelRegistry,
        root: &ModelKey,
        raw: &str,
    ) -> Result<Self, ResolutionError> {
        let mut current = registry.require(root)?;
        let segments: Vec<&str> = raw.trim().split(SEPARATOR).collect();
        let mut steps = Vec::with_capacity(segments.len());

        for (idx, segment) in segments.iter().enumerate() {
            let kind = current
                .field(segment)
                .ok_or_else(|| ResolutionError::UnknownField {
                    model: current.key.to_string(),
                    field: (*segment).to_string(),
                })?
                .clone();
            let is_last = idx + 1 == segments.len();
            let next = if is_last {
                None
            } else {
                let target = kind.target().ok_or_else(|| ResolutionError::NotARelation {
                    model: current.key.to_string(),
                    field: (*segment).to_string(),
                })?;
                Some(registry.require(target)?)
            };
            steps.push(Step {
                model: current.key.clone(),
                field: (*segment).to_string(),
                kind,
            });
            if let Some(next) = next {
                current = next;
            }
        }

        Ok(Self {
            raw: raw.trim().to_string(),
            root: root.clone(),
            steps,
        })
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    #[must_use]
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// The final hop. Compilation guarantees at least one.
    #[must_use]
    pub fn last(&self) -> Option<&Step> {
        self.steps.last()
    }

    /// Model reached when the path ends on a relation.
    #[must_use]
    pub fn target_model(&self) -> Option<&ModelKey> {
        self.last().and_then(|step| step.kind.target())
    }

    /// Whether any hop fans out over a many-to-many set.
    #[must_use]
    pub fn is_many(&self) -> bool {
        self.steps.iter().any(|step| step.kind.is_many())
    }
}

impl fmt::Display for CompiledPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.root, self.raw)
    }
}
