//! Template rendering with handlebars.
//!
//! The context a mail template sees has three roots:
//!
//! - `instance`: the mutated record's fields plus `id`, `model` and
//!   `display`; foreign keys are expanded one level into the related
//!   record, many-to-many fields into a list of related records
//! - `rule`: `id`, `title`, `model`, `trigger`
//! - `recipient`: `email` and `name` of the primary recipient

use handlebars::{Handlebars, handlebars_helper};
use hrmail_domain::automation::AutomationRule;
use hrmail_domain::error::{HrMailError, ValidationError};
use hrmail_domain::mail::Recipient;
use hrmail_domain::record::{FieldValue, Record};
use hrmail_domain::registry::ModelRegistry;
use hrmail_domain::schema::{FieldKind, ModelSchema};
use serde_json::{Map, Value, json};

use crate::ports::RecordRepository;
use crate::resolver::display_name;

handlebars_helper!(upper: |s: str| s.to_uppercase());
handlebars_helper!(lower: |s: str| s.to_lowercase());

/// Renders template sources against a JSON context.
pub struct MailRenderer {
    handlebars: Handlebars<'static>,
}

impl Default for MailRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl MailRenderer {
    #[must_use]
    pub fn new() -> Self {
        let mut handlebars = Handlebars::new();
        handlebars.register_helper("upper", Box::new(upper));
        handlebars.register_helper("lower", Box::new(lower));
        Self { handlebars }
    }

    /// Check that `source` parses.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidTemplate`] with the parser message.
    pub fn check(source: &str) -> Result<(), HrMailError> {
        handlebars::Template::compile(source)
            .map(|_| ())
            .map_err(|err| ValidationError::InvalidTemplate(err.to_string()).into())
    }

    /// Render `source` with `context`. Unknown variables render empty.
    ///
    /// # Errors
    ///
    /// Returns [`HrMailError::Render`] when rendering fails.
    pub fn render(&self, source: &str, context: &Value) -> Result<String, HrMailError> {
        self.handlebars
            .render_template(source, context)
            .map_err(|err| HrMailError::Render(err.to_string().into()))
    }
}

/// Build the full rendering context for one mail.
pub async fn mail_context<DR: RecordRepository>(
    records: &DR,
    registry: &ModelRegistry,
    record: &Record,
    rule: &AutomationRule,
    recipient: Option<&Recipient>,
) -> Value {
    json!({
        "instance": instance_json(records, registry, record).await,
        "rule": {
            "id": rule.id.to_string(),
            "title": rule.title,
            "model": rule.target_model.as_str(),
            "trigger": rule.trigger.to_string(),
        },
        "recipient": recipient.map_or(Value::Null, |r| json!({ "email": r.email, "name": r.name })),
    })
}

/// The `instance` object: own fields with relations expanded one level.
pub async fn instance_json<DR: RecordRepository>(
    records: &DR,
    registry: &ModelRegistry,
    record: &Record,
) -> Value {
    let schema = registry.get(&record.model);
    let mut out = record_json(record, schema);
    let Some(schema) = schema else {
        return Value::Object(out);
    };

    for (field, kind) in &schema.fields {
        let Some(target) = kind.target() else {
            continue;
        };
        let ids = record.get(field).map(|v| v.referenced_ids()).unwrap_or_default();
        if ids.is_empty() {
            continue;
        }
        let related = match records.get_many(target, &ids).await {
            Ok(related) => related,
            Err(err) => {
                tracing::warn!(field = %field, error = %err, "could not expand relation for rendering");
                continue;
            }
        };
        let target_schema = registry.get(target);
        let expanded = match kind {
            FieldKind::ManyToMany { .. } => Value::Array(
                ids.iter()
                    .filter_map(|id| related.iter().find(|r| r.id == *id))
                    .map(|r| Value::Object(record_json(r, target_schema)))
                    .collect(),
            ),
            _ => related
                .first()
                .map_or(Value::Null, |r| Value::Object(record_json(r, target_schema))),
        };
        out.insert(field.clone(), expanded);
    }
    Value::Object(out)
}

/// Flat JSON view of a record without following relations.
#[must_use]
pub fn record_json(record: &Record, schema: Option<&ModelSchema>) -> Map<String, Value> {
    let mut out: Map<String, Value> = record
        .fields
        .iter()
        .map(|(name, value)| (name.clone(), scalar_json(value)))
        .collect();
    out.insert("id".to_string(), Value::String(record.id.to_string()));
    out.insert("model".to_string(), Value::String(record.model.to_string()));
    if let Some(schema) = schema {
        out.insert("display".to_string(), Value::String(display_name(schema, record)));
    }
    out
}

/// JSON form of a field value; references become id strings.
#[must_use]
pub fn scalar_json(value: &FieldValue) -> Value {
    match value {
        FieldValue::Null => Value::Null,
        FieldValue::Bool(b) => Value::Bool(*b),
        FieldValue::Int(i) => Value::from(*i),
        FieldValue::Float(x) => Value::from(*x),
        FieldValue::Text(s) => Value::String(s.clone()),
        FieldValue::Ref { id } => Value::String(id.to_string()),
        FieldValue::RefList { refs } => {
            Value::Array(refs.iter().map(|id| Value::String(id.to_string())).collect())
        }
    }
}
