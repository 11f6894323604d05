//! Attribute-path resolution against live records.
//!
//! Resolution walks a [`CompiledPath`] hop by hop through the
//! [`RecordRepository`]. It is fail-soft: an unset relation, a dangling
//! reference or a storage failure yields [`ResolvedValue::Missing`] (or an
//! empty list for many-valued paths) instead of an error.

use hrmail_domain::automation::{ResolvedValue, SELF_PATH, looks_like_address};
use hrmail_domain::error::{HrMailError, ResolutionError};
use hrmail_domain::id::RecordId;
use hrmail_domain::mail::Recipient;
use hrmail_domain::path::{CompiledPath, Step};
use hrmail_domain::record::{FieldValue, Record};
use hrmail_domain::registry::ModelRegistry;
use hrmail_domain::schema::{ModelKey, ModelSchema};

use crate::ports::RecordRepository;

/// A recipient path checked against the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecipientPath {
    /// `self`: the mutated record is the recipient.
    Instance,
    /// Path ending on a relation; the related records are the recipients.
    Related(CompiledPath),
    /// Path ending on a scalar holding an address.
    Address(CompiledPath),
}

impl RecipientPath {
    /// Compile a raw recipient path rooted at `root`.
    ///
    /// # Errors
    ///
    /// Returns the path's [`ResolutionError`], or
    /// [`ResolutionError::NotAddressable`] when the records reached have no
    /// `email_field`.
    pub fn compile(
        registry: &ModelRegistry,
        root: &ModelKey,
        raw: &str,
    ) -> Result<Self, ResolutionError> {
        let raw = raw.trim();
        let not_addressable = || ResolutionError::NotAddressable {
            path: raw.to_string(),
        };
        if raw == SELF_PATH {
            let schema = registry.require(root)?;
            return schema
                .email_field
                .as_ref()
                .map(|_| Self::Instance)
                .ok_or_else(not_addressable);
        }
        let path = CompiledPath::compile(registry, root, raw)?;
        match path.target_model() {
            Some(target) => {
                let schema = registry.require(target)?;
                if schema.email_field.is_some() {
                    Ok(Self::Related(path))
                } else {
                    Err(not_addressable())
                }
            }
            None => Ok(Self::Address(path)),
        }
    }
}

/// Resolve `path` on `record`.
///
/// Relation values reduce to the referenced id; many-valued paths yield
/// [`ResolvedValue::Many`] even when nothing was reached.
pub async fn resolve<DR: RecordRepository>(
    records: &DR,
    record: &Record,
    path: &CompiledPath,
) -> ResolvedValue {
    let empty = || {
        if path.is_many() {
            ResolvedValue::Many(Vec::new())
        } else {
            ResolvedValue::Missing
        }
    };
    let Some((last, hops)) = path.steps().split_last() else {
        return empty();
    };
    let frontier = match follow(records, vec![record.clone()], hops).await {
        Ok(frontier) => frontier,
        Err(err) => {
            tracing::warn!(path = %path, record_id = %record.id, error = %err, "path resolution failed");
            return empty();
        }
    };

    let values: Vec<FieldValue> = frontier
        .iter()
        .filter_map(|row| row.get(&last.field))
        .flat_map(|value| match value {
            FieldValue::RefList { refs } => refs.into_iter().map(FieldValue::reference).collect(),
            other => vec![other],
        })
        .filter(|value| !value.is_null())
        .collect();

    if path.is_many() {
        ResolvedValue::Many(values)
    } else {
        values
            .into_iter()
            .next()
            .map_or(ResolvedValue::Missing, ResolvedValue::One)
    }
}

/// Resolve every recipient path of a rule, in order.
///
/// Records without an address and text values that are not addresses are
/// skipped. Duplicates are kept; deduplication happens when the mail is
/// addressed.
pub async fn resolve_recipients<DR: RecordRepository>(
    records: &DR,
    registry: &ModelRegistry,
    record: &Record,
    paths: &[RecipientPath],
) -> Vec<Recipient> {
    let mut out = Vec::new();
    for path in paths {
        match path {
            RecipientPath::Instance => {
                if let Some(schema) = registry.get(&record.model) {
                    out.extend(recipient_of(schema, record));
                }
            }
            RecipientPath::Related(compiled) => {
                let reached = match follow(records, vec![record.clone()], compiled.steps()).await {
                    Ok(reached) => reached,
                    Err(err) => {
                        tracing::warn!(path = %compiled, error = %err, "recipient resolution failed");
                        continue;
                    }
                };
                for row in &reached {
                    if let Some(schema) = registry.get(&row.model) {
                        out.extend(recipient_of(schema, row));
                    }
                }
            }
            RecipientPath::Address(compiled) => {
                let addresses = match resolve(records, record, compiled).await {
                    ResolvedValue::Missing => Vec::new(),
                    ResolvedValue::One(value) => vec![value],
                    ResolvedValue::Many(values) => values,
                };
                out.extend(
                    addresses
                        .iter()
                        .filter_map(FieldValue::as_text)
                        .filter(|text| looks_like_address(text))
                        .map(|text| Recipient::new(text.trim(), "")),
                );
            }
        }
    }
    out
}

/// The recipient a record stands for, if its address field is filled in.
#[must_use]
pub fn recipient_of(schema: &ModelSchema, record: &Record) -> Option<Recipient> {
    let field = schema.email_field.as_deref()?;
    let email = record.get(field)?;
    let email = email.as_text().map(str::trim).filter(|e| looks_like_address(e))?;
    Some(Recipient::new(email, display_name(schema, record)))
}

/// Space-joined values of the schema's name fields.
#[must_use]
pub fn display_name(schema: &ModelSchema, record: &Record) -> String {
    schema
        .name_fields
        .iter()
        .filter_map(|field| record.get(field))
        .map(|value| value.to_string())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Follow every relation hop in `steps`, starting from `start`.
async fn follow<DR: RecordRepository>(
    records: &DR,
    start: Vec<Record>,
    steps: &[Step],
) -> Result<Vec<Record>, HrMailError> {
    let mut frontier = start;
    for step in steps {
        let Some(target) = step.kind.target() else {
            return Ok(Vec::new());
        };
        let mut ids: Vec<RecordId> = Vec::new();
        for id in frontier
            .iter()
            .filter_map(|row| row.get(&step.field))
            .flat_map(|value| value.referenced_ids())
        {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut reached = records.get_many(target, &ids).await?;
        reached.sort_by_key(|row| ids.iter().position(|id| *id == row.id));
        frontier = reached;
    }
    Ok(frontier)
}
