//! Mail templates.

use serde::{Deserialize, Serialize};

use crate::error::{HrMailError, ValidationError};
use crate::id::TemplateId;

/// A reusable mail body, also used to render attachment documents.
///
/// `subject` and `body` are handlebars sources. The rendering context
/// exposes `instance`, `rule` and `recipient`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailTemplate {
    #[serde(default)]
    pub id: TemplateId,
    pub title: String,
    #[serde(default)]
    pub subject: Option<String>,
    pub body: String,
}

impl MailTemplate {
    #[must_use]
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id: TemplateId::new(),
            title: title.into(),
            subject: None,
            body: body.into(),
        }
    }

    #[must_use]
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Check domain invariants. Template syntax is checked by the renderer.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyTitle`] or [`ValidationError::EmptyBody`].
    pub fn validate(&self) -> Result<(), HrMailError> {
        if self.title.trim().is_empty() {
            return Err(ValidationError::EmptyTitle.into());
        }
        if self.body.trim().is_empty() {
            return Err(ValidationError::EmptyBody.into());
        }
        Ok(())
    }

    /// File name used when this template is rendered as an attachment.
    #[must_use]
    pub fn attachment_filename(&self) -> String {
        let slug: String = self
            .title
            .trim()
            .chars()
            .map(|c| if c.is_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
            .collect();
        let slug = slug.trim_matches('-');
        if slug.is_empty() {
            format!("{}.html", self.id)
        } else {
            format!("{slug}.html")
        }
    }
}
