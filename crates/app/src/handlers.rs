//! Compiled rules and the handler registry they are bound in.
//!
//! Every active rule is compiled once against the model registry and bound
//! to two channels of its target model: the single-instance channel, fed by
//! per-record saves and deletes, and the bulk channel, fed by bulk updates.
//! The binding set is an immutable snapshot; writers build a new one and
//! swap it in, so readers always see a complete set.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, PoisonError, RwLock};

use hrmail_domain::automation::{AutomationRule, Clause};
use hrmail_domain::error::ResolutionError;
use hrmail_domain::id::RuleId;
use hrmail_domain::path::CompiledPath;
use hrmail_domain::registry::ModelRegistry;
use hrmail_domain::schema::ModelKey;

use crate::resolver::RecipientPath;

/// Which stream of mutations a handler listens to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Instance,
    Bulk,
}

/// A condition clause with its path compiled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledClause {
    pub clause: Clause,
    pub path: CompiledPath,
}

/// A rule whose every path was checked against the registry.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledRule {
    pub rule: AutomationRule,
    pub clauses: Vec<CompiledClause>,
    pub recipients: Vec<RecipientPath>,
}

impl CompiledRule {
    /// Compile `rule` against `registry`.
    ///
    /// # Errors
    ///
    /// Returns the first [`ResolutionError`] met while resolving the target
    /// model, a condition path or a recipient path.
    pub fn compile(registry: &ModelRegistry, rule: AutomationRule) -> Result<Self, ResolutionError> {
        let root = &registry.require(&rule.target_model)?.key;
        let clauses = rule
            .condition
            .clauses()
            .iter()
            .map(|clause| {
                CompiledPath::compile(registry, root, &clause.path).map(|path| CompiledClause {
                    clause: clause.clone(),
                    path,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let recipients = rule
            .recipient_paths
            .iter()
            .filter(|raw| !raw.trim().is_empty())
            .map(|raw| RecipientPath::compile(registry, root, raw))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            rule,
            clauses,
            recipients,
        })
    }

    #[must_use]
    pub fn id(&self) -> RuleId {
        self.rule.id
    }

    #[must_use]
    pub fn model(&self) -> &ModelKey {
        &self.rule.target_model
    }
}

/// Immutable set of bindings, keyed by channel then model.
#[derive(Debug, Clone, Default)]
pub struct HandlerSet {
    bindings: HashMap<(Channel, ModelKey), Vec<Arc<CompiledRule>>>,
}

impl HandlerSet {
    /// Rules bound to `model` on `channel`, in binding order.
    #[must_use]
    pub fn handlers_for(&self, channel: Channel, model: &ModelKey) -> &[Arc<CompiledRule>] {
        self.bindings
            .get(&(channel, model.clone()))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Models with at least one bound rule.
    #[must_use]
    pub fn tracked_models(&self) -> BTreeSet<ModelKey> {
        self.bindings.keys().map(|(_, model)| model.clone()).collect()
    }

    #[must_use]
    pub fn is_tracked(&self, model: &ModelKey) -> bool {
        self.bindings.keys().any(|(_, bound)| bound == model)
    }

    /// Distinct rule ids bound on any channel.
    #[must_use]
    pub fn rule_ids(&self) -> BTreeSet<RuleId> {
        self.bindings
            .values()
            .flat_map(|rules| rules.iter().map(|r| r.id()))
            .collect()
    }

    fn bind(&mut self, rule: Arc<CompiledRule>) {
        self.unbind(rule.id());
        for channel in [Channel::Instance, Channel::Bulk] {
            self.bindings
                .entry((channel, rule.model().clone()))
                .or_default()
                .push(Arc::clone(&rule));
        }
    }

    fn unbind(&mut self, id: RuleId) -> bool {
        let mut removed = false;
        self.bindings.retain(|_, rules| {
            let before = rules.len();
            rules.retain(|r| r.id() != id);
            removed |= rules.len() != before;
            !rules.is_empty()
        });
        removed
    }
}

/// Owner of the current [`HandlerSet`].
#[derive(Debug, Default)]
pub struct HandlerRegistry {
    current: RwLock<Arc<HandlerSet>>,
}

impl HandlerRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The binding set in force right now.
    #[must_use]
    pub fn snapshot(&self) -> Arc<HandlerSet> {
        Arc::clone(&self.current.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Bind one rule on both channels, replacing an earlier binding with
    /// the same id.
    pub fn register(&self, rule: CompiledRule) {
        let rule = Arc::new(rule);
        self.update(|set| set.bind(rule));
    }

    /// Detach one rule from both channels. Returns whether it was bound.
    pub fn unregister(&self, id: RuleId) -> bool {
        let mut removed = false;
        self.update(|set| removed = set.unbind(id));
        removed
    }

    /// Detach everything and bind `rules` instead, in one swap.
    pub fn replace_all(&self, rules: impl IntoIterator<Item = CompiledRule>) {
        let mut next = HandlerSet::default();
        for rule in rules {
            next.bind(Arc::new(rule));
        }
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(next);
    }

    fn update(&self, change: impl FnOnce(&mut HandlerSet)) {
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        let mut next = HandlerSet::clone(&guard);
        change(&mut next);
        *guard = Arc::new(next);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{hr_registry, key, rule_on};
    use hrmail_domain::automation::{Condition, Operator, Trigger};

    fn compiled(raw_model: &str) -> CompiledRule {
        CompiledRule::compile(&hr_registry(), rule_on(raw_model, Trigger::OnCreate)).unwrap()
    }

    #[test]
    fn should_compile_condition_and_recipient_paths() {
        let mut rule = rule_on("helpdesk.Ticket", Trigger::OnUpdate);
        rule.condition = Condition::new(vec![Clause::new(
            "employee_id__department__name",
            Operator::Equal,
            "Human Resources",
        )]);
        let compiled = CompiledRule::compile(&hr_registry(), rule).unwrap();
        assert_eq!(compiled.clauses.len(), 1);
        assert_eq!(compiled.clauses[0].path.steps().len(), 3);
        assert!(matches!(compiled.recipients[0], RecipientPath::Related(_)));
    }

    #[test]
    fn should_fail_compilation_on_unknown_model() {
        let rule = rule_on("payroll.Payslip", Trigger::OnCreate);
        assert_eq!(
            CompiledRule::compile(&hr_registry(), rule).unwrap_err(),
            ResolutionError::UnknownModel("payroll.Payslip".to_string())
        );
    }

    #[test]
    fn should_bind_rule_on_both_channels() {
        let registry = HandlerRegistry::new();
        let rule = compiled("helpdesk.Ticket");
        let id = rule.id();
        registry.register(rule);

        let set = registry.snapshot();
        let ticket = key("helpdesk.Ticket");
        assert_eq!(set.handlers_for(Channel::Instance, &ticket).len(), 1);
        assert_eq!(set.handlers_for(Channel::Bulk, &ticket).len(), 1);
        assert_eq!(set.rule_ids(), BTreeSet::from([id]));
        assert!(set.is_tracked(&ticket));
        assert!(!set.is_tracked(&key("employee.Employee")));
    }

    #[test]
    fn should_register_idempotently_by_rule_id() {
        let registry = HandlerRegistry::new();
        let rule = compiled("helpdesk.Ticket");
        registry.register(rule.clone());
        registry.register(rule);

        let set = registry.snapshot();
        assert_eq!(set.handlers_for(Channel::Instance, &key("helpdesk.Ticket")).len(), 1);
    }

    #[test]
    fn should_unregister_from_both_channels() {
        let registry = HandlerRegistry::new();
        let rule = compiled("helpdesk.Ticket");
        let id = rule.id();
        registry.register(rule);

        assert!(registry.unregister(id));
        assert!(!registry.unregister(id));
        assert!(registry.snapshot().tracked_models().is_empty());
    }

    #[test]
    fn should_replace_all_bindings_at_once() {
        let registry = HandlerRegistry::new();
        registry.register(compiled("helpdesk.Ticket"));
        let kept_snapshot = registry.snapshot();

        registry.replace_all(vec![compiled("employee.Employee"), compiled("employee.Employee")]);

        let set = registry.snapshot();
        assert_eq!(set.tracked_models(), BTreeSet::from([key("employee.Employee")]));
        assert_eq!(set.handlers_for(Channel::Instance, &key("employee.Employee")).len(), 2);
        // earlier snapshots are unaffected by the swap
        assert!(kept_snapshot.is_tracked(&key("helpdesk.Ticket")));
    }
}
