//! Entity-type descriptions.
//!
//! A [`ModelSchema`] is the typed stand-in for ORM introspection: it lists
//! the fields of one entity type and which of them point at other types.
//! Attribute paths are checked against schemas once, when a rule is
//! compiled, instead of being looked up reflectively on every evaluation.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Name of the implicit primary-key field every model carries.
pub const ID_FIELD: &str = "id";

/// Dotted entity-type key, `app_label.ModelName`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ModelKey(String);

impl ModelKey {
    /// Validate and wrap a dotted model key.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidModelKey`] unless `raw` has exactly
    /// one `.` separating two non-empty parts.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let raw = raw.trim();
        match raw.split_once('.') {
            Some((app, model))
                if !app.is_empty() && !model.is_empty() && !model.contains('.') =>
            {
                Ok(Self(raw.to_string()))
            }
            _ => Err(ValidationError::InvalidModelKey(raw.to_string())),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The part after the dot, e.g. `Employee`.
    #[must_use]
    pub fn model_name(&self) -> &str {
        self.0.rsplit_once('.').map_or(self.0.as_str(), |(_, name)| name)
    }
}

impl fmt::Display for ModelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ModelKey {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ModelKey {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ModelKey> for String {
    fn from(key: ModelKey) -> Self {
        key.0
    }
}

/// How a field relates to other models.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldKind {
    /// Plain value column.
    Scalar,
    /// Single reference to a record of `target`.
    ForeignKey { target: ModelKey },
    /// Set of references to records of `target`.
    ManyToMany { target: ModelKey },
}

impl FieldKind {
    /// The model a relation field points at, `None` for scalars.
    #[must_use]
    pub fn target(&self) -> Option<&ModelKey> {
        match self {
            Self::Scalar => None,
            Self::ForeignKey { target } | Self::ManyToMany { target } => Some(target),
        }
    }

    #[must_use]
    pub fn is_many(&self) -> bool {
        matches!(self, Self::ManyToMany { .. })
    }
}

/// Description of one entity type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSchema {
    pub key: ModelKey,
    pub label: String,
    pub fields: BTreeMap<String, FieldKind>,
    /// Field holding the mail address when a record of this model is a recipient.
    pub email_field: Option<String>,
    /// Fields joined with a space to build a display name.
    #[serde(default)]
    pub name_fields: Vec<String>,
}

impl ModelSchema {
    #[must_use]
    pub fn builder(key: ModelKey) -> ModelSchemaBuilder {
        ModelSchemaBuilder {
            label: key.model_name().to_string(),
            key,
            fields: BTreeMap::new(),
            email_field: None,
            name_fields: Vec::new(),
        }
    }

    /// Look up a field, including the implicit `id`.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldKind> {
        if name == ID_FIELD {
            return Some(&FieldKind::Scalar);
        }
        self.fields.get(name)
    }
}

/// Builder for [`ModelSchema`].
#[derive(Debug)]
pub struct ModelSchemaBuilder {
    key: ModelKey,
    label: String,
    fields: BTreeMap<String, FieldKind>,
    email_field: Option<String>,
    name_fields: Vec<String>,
}

impl ModelSchemaBuilder {
    #[must_use]
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    #[must_use]
    pub fn scalar(mut self, name: impl Into<String>) -> Self {
        self.fields.insert(name.into(), FieldKind::Scalar);
        self
    }

    #[must_use]
    pub fn foreign_key(mut self, name: impl Into<String>, target: ModelKey) -> Self {
        self.fields
            .insert(name.into(), FieldKind::ForeignKey { target });
        self
    }

    #[must_use]
    pub fn many_to_many(mut self, name: impl Into<String>, target: ModelKey) -> Self {
        self.fields
            .insert(name.into(), FieldKind::ManyToMany { target });
        self
    }

    /// Mark a scalar field as the recipient address; adds it if missing.
    #[must_use]
    pub fn email_field(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.fields
            .entry(name.clone())
            .or_insert(FieldKind::Scalar);
        self.email_field = Some(name);
        self
    }

    #[must_use]
    pub fn name_field(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.fields
            .entry(name.clone())
            .or_insert(FieldKind::Scalar);
        self.name_fields.push(name);
        self
    }

    #[must_use]
    pub fn build(self) -> ModelSchema {
        ModelSchema {
            key: self.key,
            label: self.label,
            fields: self.fields,
            email_field: self.email_field,
            name_fields: self.name_fields,
        }
    }
}
