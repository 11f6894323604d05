//! Automation — trigger → condition → mail rules.
//!
//! An [`AutomationRule`] watches one entity type. When a record of that type
//! is mutated in a way that matches the rule's [`Trigger`] and the record
//! satisfies its [`Condition`], a mail rendered from the rule's template is
//! sent to the addresses reached through its recipient paths.

mod condition;
mod trigger;

use std::collections::BTreeSet;

pub use condition::{Canonical, Clause, Condition, Connector, Fold, Operator, ResolvedValue};
pub use trigger::{MutationKind, Trigger};

use serde::{Deserialize, Serialize};

use crate::error::{HrMailError, ValidationError};
use crate::id::{RuleId, TemplateId};
use crate::schema::ModelKey;
use crate::time::Timestamp;

/// Recipient path designating the mutated record itself.
pub const SELF_PATH: &str = "self";

/// An administrator-authored mail automation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutomationRule {
    pub id: RuleId,
    pub title: String,
    pub target_model: ModelKey,
    pub trigger: Trigger,
    #[serde(default)]
    pub condition: Condition,
    pub recipient_paths: Vec<String>,
    /// Fixed addresses always copied on the mail.
    #[serde(default)]
    pub also_sent_to: Vec<String>,
    pub template_id: TemplateId,
    #[serde(default)]
    pub attachment_template_ids: BTreeSet<TemplateId>,
    pub active: bool,
    pub created_at: Timestamp,
}

impl AutomationRule {
    /// Create a builder for a rule watching `target_model`.
    #[must_use]
    pub fn builder(target_model: ModelKey) -> AutomationRuleBuilder {
        AutomationRuleBuilder {
            target_model,
            id: None,
            title: None,
            trigger: None,
            condition: Condition::always(),
            recipient_paths: Vec::new(),
            also_sent_to: Vec::new(),
            template_id: None,
            attachment_template_ids: BTreeSet::new(),
            active: None,
            created_at: None,
        }
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`HrMailError::Validation`] when:
    /// - `title` is blank ([`ValidationError::EmptyTitle`])
    /// - there is no recipient path ([`ValidationError::NoRecipients`])
    /// - an `also_sent_to` entry is not an address ([`ValidationError::InvalidAddress`])
    pub fn validate(&self) -> Result<(), HrMailError> {
        if self.title.trim().is_empty() {
            return Err(ValidationError::EmptyTitle.into());
        }
        if self.recipient_paths.iter().all(|p| p.trim().is_empty()) {
            return Err(ValidationError::NoRecipients.into());
        }
        if let Some(bad) = self.also_sent_to.iter().find(|a| !looks_like_address(a)) {
            return Err(ValidationError::InvalidAddress(bad.clone()).into());
        }
        Ok(())
    }
}

/// Minimal address shape check: `local@domain` with both parts present.
#[must_use]
pub fn looks_like_address(raw: &str) -> bool {
    let raw = raw.trim();
    match raw.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && !domain.is_empty() && !raw.contains(char::is_whitespace)
        }
        None => false,
    }
}

/// Step-by-step builder for [`AutomationRule`].
#[derive(Debug)]
pub struct AutomationRuleBuilder {
    target_model: ModelKey,
    id: Option<RuleId>,
    title: Option<String>,
    trigger: Option<Trigger>,
    condition: Condition,
    recipient_paths: Vec<String>,
    also_sent_to: Vec<String>,
    template_id: Option<TemplateId>,
    attachment_template_ids: BTreeSet<TemplateId>,
    active: Option<bool>,
    created_at: Option<Timestamp>,
}

impl AutomationRuleBuilder {
    #[must_use]
    pub fn id(mut self, id: RuleId) -> Self {
        self.id = Some(id);
        self
    }

    #[must_use]
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    #[must_use]
    pub fn trigger(mut self, trigger: Trigger) -> Self {
        self.trigger = Some(trigger);
        self
    }

    #[must_use]
    pub fn condition(mut self, condition: Condition) -> Self {
        self.condition = condition;
        self
    }

    #[must_use]
    pub fn recipient(mut self, path: impl Into<String>) -> Self {
        self.recipient_paths.push(path.into());
        self
    }

    #[must_use]
    pub fn also_sent_to(mut self, address: impl Into<String>) -> Self {
        self.also_sent_to.push(address.into());
        self
    }

    #[must_use]
    pub fn template(mut self, id: TemplateId) -> Self {
        self.template_id = Some(id);
        self
    }

    #[must_use]
    pub fn attachment(mut self, id: TemplateId) -> Self {
        self.attachment_template_ids.insert(id);
        self
    }

    #[must_use]
    pub fn active(mut self, active: bool) -> Self {
        self.active = Some(active);
        self
    }

    #[must_use]
    pub fn created_at(mut self, ts: Timestamp) -> Self {
        self.created_at = Some(ts);
        self
    }

    /// Consume the builder, validate, and return an [`AutomationRule`].
    ///
    /// # Errors
    ///
    /// Returns [`HrMailError::Validation`] if no template was given or the
    /// rule breaks an invariant checked by [`AutomationRule::validate`].
    pub fn build(self) -> Result<AutomationRule, HrMailError> {
        let template_id = self.template_id.ok_or(ValidationError::MissingTemplate)?;
        let rule = AutomationRule {
            id: self.id.unwrap_or_default(),
            title: self.title.unwrap_or_default(),
            target_model: self.target_model,
            trigger: self.trigger.unwrap_or(Trigger::OnCreate),
            condition: self.condition,
            recipient_paths: self.recipient_paths,
            also_sent_to: self.also_sent_to,
            template_id,
            attachment_template_ids: self.attachment_template_ids,
            active: self.active.unwrap_or(true),
            created_at: self.created_at.unwrap_or_else(crate::time::now),
        };
        rule.validate()?;
        Ok(rule)
    }
}
