//! Rule service — use-cases for managing automation rules.
//!
//! Every successful change rebinds the engine so the next mutation sees it.
//! Once a change is stored it is reported as done: if the full rebuild then
//! fails, the single rule is patched into the live bindings instead.

use std::sync::Arc;

use hrmail_domain::automation::AutomationRule;
use hrmail_domain::error::{HrMailError, NotFoundError};
use hrmail_domain::id::RuleId;

use crate::automation_engine::{AutomationEngine, RebuildReport};
use crate::handlers::{CompiledRule, HandlerRegistry};
use crate::ports::{RecordRepository, RuleRepository};

/// Application service for rule CRUD.
pub struct RuleService<RR, DR> {
    repo: Arc<RR>,
    engine: Arc<AutomationEngine<RR, DR>>,
}

impl<RR, DR> RuleService<RR, DR>
where
    RR: RuleRepository + Send + Sync,
    DR: RecordRepository + Send + Sync,
{
    /// Create a new service; `repo` must be the repository the engine reads.
    pub fn new(repo: Arc<RR>, engine: Arc<AutomationEngine<RR, DR>>) -> Self {
        Self { repo, engine }
    }

    /// Validate and store a new rule, then rebind.
    ///
    /// # Errors
    ///
    /// Returns [`HrMailError::Validation`] if invariants fail,
    /// [`HrMailError::Resolution`] if a path does not resolve against the
    /// registered models, or a storage error from the repository.
    #[tracing::instrument(skip(self, rule), fields(rule_title = %rule.title, model = %rule.target_model))]
    pub async fn create_rule(&self, rule: AutomationRule) -> Result<AutomationRule, HrMailError> {
        let compiled = self.check(&rule)?;
        let created = self.repo.create(rule).await?;
        self.rebind(|handlers| bind(handlers, compiled)).await;
        Ok(created)
    }

    /// Look up a rule by id, returning an error if not found.
    ///
    /// # Errors
    ///
    /// Returns [`HrMailError::NotFound`] when no rule with `id` exists,
    /// or a storage error from the repository.
    #[tracing::instrument(skip(self))]
    pub async fn get_rule(&self, id: RuleId) -> Result<AutomationRule, HrMailError> {
        self.repo.get_by_id(id).await?.ok_or_else(|| {
            NotFoundError {
                entity: "AutomationRule",
                id: id.to_string(),
            }
            .into()
        })
    }

    /// List all rules.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    pub async fn list_rules(&self) -> Result<Vec<AutomationRule>, HrMailError> {
        self.repo.get_all().await
    }

    /// Replace an existing rule, then rebind.
    ///
    /// The creation time of the stored rule is kept.
    ///
    /// # Errors
    ///
    /// Returns [`HrMailError::NotFound`] if the rule does not exist, plus the
    /// errors of [`create_rule`](Self::create_rule).
    #[tracing::instrument(skip(self, rule), fields(rule_id = %rule.id))]
    pub async fn update_rule(&self, mut rule: AutomationRule) -> Result<AutomationRule, HrMailError> {
        let existing = self.get_rule(rule.id).await?;
        rule.created_at = existing.created_at;
        let compiled = self.check(&rule)?;
        let updated = self.repo.update(rule).await?;
        self.rebind(|handlers| bind(handlers, compiled)).await;
        Ok(updated)
    }

    /// Delete a rule by id, then rebind.
    ///
    /// # Errors
    ///
    /// Returns [`HrMailError::NotFound`] if the rule does not exist, or a
    /// storage error from the repository.
    #[tracing::instrument(skip(self))]
    pub async fn delete_rule(&self, id: RuleId) -> Result<(), HrMailError> {
        self.get_rule(id).await?;
        self.repo.delete(id).await?;
        self.rebind(|handlers| {
            handlers.unregister(id);
        })
        .await;
        Ok(())
    }

    /// Rebind every active rule.
    ///
    /// # Errors
    ///
    /// Returns a storage error when the rules cannot be loaded.
    pub async fn rebuild(&self) -> Result<RebuildReport, HrMailError> {
        self.engine.rebuild().await
    }

    /// Rebuild from the store, or apply `patch` when the store cannot be read.
    async fn rebind(&self, patch: impl FnOnce(&HandlerRegistry)) {
        if let Err(err) = self.engine.rebuild().await {
            tracing::warn!(error = %err, "rebuild failed after rule change, patching bindings");
            patch(self.engine.handlers());
        }
    }

    fn check(&self, rule: &AutomationRule) -> Result<CompiledRule, HrMailError> {
        rule.validate()?;
        Ok(CompiledRule::compile(self.engine.registry(), rule.clone())?)
    }
}

fn bind(handlers: &HandlerRegistry, compiled: CompiledRule) {
    if compiled.rule.active {
        handlers.register(compiled);
    } else {
        handlers.unregister(compiled.rule.id);
    }
}
