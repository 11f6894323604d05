//! Common error types used across the workspace.
//!
//! Each layer defines its own typed errors and converts into [`HrMailError`]
//! via `From`. Infrastructure failures travel boxed so the domain does not
//! depend on adapter crates.

use std::error::Error as StdError;

type BoxError = Box<dyn StdError + Send + Sync>;

/// Top-level error shared by ports, services and adapters.
#[derive(Debug, thiserror::Error)]
pub enum HrMailError {
    #[error("validation error")]
    Validation(#[from] ValidationError),

    #[error("not found")]
    NotFound(#[from] NotFoundError),

    #[error("resolution error")]
    Resolution(#[from] ResolutionError),

    #[error("template render error")]
    Render(#[source] BoxError),

    #[error("mail transport error")]
    Transport(#[source] BoxError),

    #[error("storage error")]
    Storage(#[source] BoxError),
}

/// A domain invariant was violated.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("title must not be empty")]
    EmptyTitle,

    #[error("at least one recipient path is required")]
    NoRecipients,

    #[error("template body must not be empty")]
    EmptyBody,

    #[error("a mail template is required")]
    MissingTemplate,

    #[error("`{0}` is not a mail address")]
    InvalidAddress(String),

    #[error("invalid model key `{0}`, expected `app_label.ModelName`")]
    InvalidModelKey(String),

    #[error("invalid identifier `{0}`")]
    InvalidId(String),

    #[error("invalid template: {0}")]
    InvalidTemplate(String),

    #[error("invalid condition: {0}")]
    InvalidCondition(ConditionSyntaxError),

    #[error("record of `{model}` cannot carry field `{field}`")]
    FieldMismatch { model: String, field: String },
}

/// Why a serialized condition expression could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConditionSyntaxError {
    #[error("`{0}` appears before any `path`")]
    OrphanKey(String),

    #[error("unknown key `{0}`")]
    UnknownKey(String),

    #[error("unknown operator `{0}`")]
    UnknownOperator(String),

    #[error("unknown connector `{0}`")]
    UnknownConnector(String),

    #[error("clause on `{0}` has no operator")]
    MissingOperator(String),

    #[error("empty path")]
    EmptyPath,
}

impl From<ConditionSyntaxError> for ValidationError {
    fn from(err: ConditionSyntaxError) -> Self {
        Self::InvalidCondition(err)
    }
}

impl From<ConditionSyntaxError> for HrMailError {
    fn from(err: ConditionSyntaxError) -> Self {
        Self::Validation(err.into())
    }
}

/// A lookup by identifier found nothing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{entity} `{id}` not found")]
pub struct NotFoundError {
    pub entity: &'static str,
    pub id: String,
}

/// A model key or dotted path does not resolve against the registered schemas.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolutionError {
    #[error("unknown model `{0}`")]
    UnknownModel(String),

    #[error("model `{model}` has no field `{field}`")]
    UnknownField { model: String, field: String },

    #[error("`{model}.{field}` is not a relation and cannot be traversed")]
    NotARelation { model: String, field: String },

    #[error("recipient path `{path}` does not lead to an address")]
    NotAddressable { path: String },
}
