//! Record — a generic instance of a registered entity type.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::id::RecordId;
use crate::schema::{FieldKind, ModelKey, ModelSchema};

/// A single typed field value.
///
/// Relations are stored as references so that records stay flat:
/// `{"ref": "<uuid>"}` for a foreign key, `{"refs": [...]}` for a
/// many-to-many set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Ref {
        #[serde(rename = "ref")]
        id: RecordId,
    },
    RefList {
        refs: Vec<RecordId>,
    },
}

impl FieldValue {
    #[must_use]
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    #[must_use]
    pub fn reference(id: RecordId) -> Self {
        Self::Ref { id }
    }

    #[must_use]
    pub fn references(refs: impl IntoIterator<Item = RecordId>) -> Self {
        Self::RefList {
            refs: refs.into_iter().collect(),
        }
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Referenced ids, empty for non-relation values.
    #[must_use]
    pub fn referenced_ids(&self) -> Vec<RecordId> {
        match self {
            Self::Ref { id } => vec![*id],
            Self::RefList { refs } => refs.clone(),
            _ => Vec::new(),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Text(s) => f.write_str(s),
            Self::Ref { id } => write!(f, "{id}"),
            Self::RefList { refs } => {
                let joined: Vec<String> = refs.iter().map(ToString::to_string).collect();
                f.write_str(&joined.join(","))
            }
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// One persisted entity instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub model: ModelKey,
    pub id: RecordId,
    #[serde(default)]
    pub fields: BTreeMap<String, FieldValue>,
}

impl Record {
    /// Start a record of `model` with a fresh id.
    #[must_use]
    pub fn new(model: ModelKey) -> Self {
        Self {
            model,
            id: RecordId::new(),
            fields: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_id(mut self, id: RecordId) -> Self {
        self.id = id;
        self
    }

    #[must_use]
    pub fn with(mut self, field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    /// Set a field in place, returning the previous value.
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<FieldValue>) -> Option<FieldValue> {
        self.fields.insert(field.into(), value.into())
    }

    /// Read a field; `id` yields the primary key, unknown fields yield `None`.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<FieldValue> {
        if field == crate::schema::ID_FIELD {
            return Some(FieldValue::reference(self.id));
        }
        self.fields.get(field).cloned()
    }

    /// Check that every field exists on `schema` and that relation fields
    /// hold references of the right arity.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::FieldMismatch`] on the first offending field.
    pub fn validate_against(&self, schema: &ModelSchema) -> Result<(), ValidationError> {
        for (name, value) in &self.fields {
            let ok = match (schema.field(name), value) {
                (None, _) => false,
                (Some(_), FieldValue::Null) => true,
                (Some(FieldKind::ForeignKey { .. }), v) => matches!(v, FieldValue::Ref { .. }),
                (Some(FieldKind::ManyToMany { .. }), v) => {
                    matches!(v, FieldValue::RefList { .. })
                }
                (Some(FieldKind::Scalar), v) => {
                    !matches!(v, FieldValue::Ref { .. } | FieldValue::RefList { .. })
                }
            };
            if !ok || name == crate::schema::ID_FIELD {
                return Err(ValidationError::FieldMismatch {
                    model: self.model.to_string(),
                    field: name.clone(),
                });
            }
        }
        Ok(())
    }
}
