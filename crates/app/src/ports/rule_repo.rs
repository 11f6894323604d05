//! Rule repository port — persistence for automation rules.

use std::future::Future;

use hrmail_domain::automation::AutomationRule;
use hrmail_domain::error::HrMailError;
use hrmail_domain::id::RuleId;

/// Repository for persisting and querying [`AutomationRule`]s.
pub trait RuleRepository {
    /// Create a new rule in storage.
    fn create(
        &self,
        rule: AutomationRule,
    ) -> impl Future<Output = Result<AutomationRule, HrMailError>> + Send;

    /// Get a rule by its unique identifier.
    fn get_by_id(
        &self,
        id: RuleId,
    ) -> impl Future<Output = Result<Option<AutomationRule>, HrMailError>> + Send;

    /// Get all rules, oldest first.
    fn get_all(&self) -> impl Future<Output = Result<Vec<AutomationRule>, HrMailError>> + Send;

    /// Get all active rules, oldest first.
    fn get_active(&self) -> impl Future<Output = Result<Vec<AutomationRule>, HrMailError>> + Send;

    /// Replace an existing rule.
    fn update(
        &self,
        rule: AutomationRule,
    ) -> impl Future<Output = Result<AutomationRule, HrMailError>> + Send;

    /// Delete a rule by its unique identifier.
    fn delete(&self, id: RuleId) -> impl Future<Output = Result<(), HrMailError>> + Send;
}
