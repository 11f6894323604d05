//! Automation engine — binds active rules to record mutations.
//!
//! The engine owns the [`HandlerRegistry`]. [`rebuild`](AutomationEngine::rebuild)
//! compiles every active rule and swaps the bindings in one step. Mutation
//! drivers call the hooks around each write:
//!
//! 1. `before_save` / `before_bulk_update` stash the persisted state in the
//!    [`MutationContext`]
//! 2. the driver writes
//! 3. `after_save` / `after_bulk_update` / `after_delete` evaluate every
//!    bound rule and queue a mail for each one that fires
//!
//! Update rules only fire when a value their condition reads has changed.

use std::sync::Arc;

use hrmail_domain::automation::{Canonical, Fold, MutationKind};
use hrmail_domain::error::HrMailError;
use hrmail_domain::id::RuleId;
use hrmail_domain::record::Record;
use hrmail_domain::registry::ModelRegistry;
use hrmail_domain::schema::ModelKey;
use hrmail_domain::time::Timestamp;
use serde::Serialize;

use crate::context::MutationContext;
use crate::dispatcher::{DispatchTicket, MailDispatcher, MailJob};
use crate::handlers::{Channel, CompiledRule, HandlerRegistry};
use crate::ports::{RecordRepository, RuleRepository};
use crate::resolver::resolve;

/// A rule left unbound by a rebuild.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleFailure {
    pub rule_id: RuleId,
    pub title: String,
    pub reason: String,
}

/// Result of one rebuild pass.
#[derive(Debug, Clone, Serialize)]
pub struct RebuildReport {
    pub bound: Vec<RuleId>,
    pub failed: Vec<RuleFailure>,
    pub rebuilt_at: Timestamp,
}

/// Evaluates bound rules around record mutations.
pub struct AutomationEngine<RR, DR> {
    rules: Arc<RR>,
    records: Arc<DR>,
    registry: Arc<ModelRegistry>,
    handlers: HandlerRegistry,
    dispatcher: MailDispatcher,
    rebuild_lock: tokio::sync::Mutex<()>,
}

impl<RR, DR> AutomationEngine<RR, DR>
where
    RR: RuleRepository + Send + Sync,
    DR: RecordRepository + Send + Sync,
{
    /// Create an engine with no bindings. Call [`rebuild`](Self::rebuild)
    /// before the first mutation.
    pub fn new(
        rules: Arc<RR>,
        records: Arc<DR>,
        registry: Arc<ModelRegistry>,
        dispatcher: MailDispatcher,
    ) -> Self {
        Self {
            rules,
            records,
            registry,
            handlers: HandlerRegistry::new(),
            dispatcher,
            rebuild_lock: tokio::sync::Mutex::new(()),
        }
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<ModelRegistry> {
        &self.registry
    }

    #[must_use]
    pub fn handlers(&self) -> &HandlerRegistry {
        &self.handlers
    }

    #[must_use]
    pub fn dispatcher(&self) -> &MailDispatcher {
        &self.dispatcher
    }

    /// Compile every active rule and replace all bindings at once.
    ///
    /// A rule that fails to compile is logged and reported but does not
    /// prevent the others from being bound. Concurrent rebuilds run one
    /// after the other.
    ///
    /// # Errors
    ///
    /// Returns a storage error when the active rules cannot be loaded; the
    /// previous bindings then stay in force.
    #[tracing::instrument(skip(self))]
    pub async fn rebuild(&self) -> Result<RebuildReport, HrMailError> {
        let _guard = self.rebuild_lock.lock().await;
        let active = self.rules.get_active().await?;

        let mut compiled = Vec::with_capacity(active.len());
        let mut failed = Vec::new();
        for rule in active {
            let (rule_id, title) = (rule.id, rule.title.clone());
            match CompiledRule::compile(&self.registry, rule) {
                Ok(rule) => compiled.push(rule),
                Err(err) => {
                    tracing::warn!(rule_id = %rule_id, title = %title, error = %err, "rule not bound");
                    failed.push(RuleFailure {
                        rule_id,
                        title,
                        reason: err.to_string(),
                    });
                }
            }
        }

        let bound: Vec<RuleId> = compiled.iter().map(CompiledRule::id).collect();
        self.handlers.replace_all(compiled);
        tracing::info!(bound = bound.len(), failed = failed.len(), "automation rules rebound");
        Ok(RebuildReport {
            bound,
            failed,
            rebuilt_at: hrmail_domain::time::now(),
        })
    }

    /// Stash the persisted state of `record` before it is written.
    ///
    /// Does nothing without a context or when no rule watches the model.
    pub async fn before_save(&self, record: &Record, ctx: Option<&mut MutationContext>) {
        let Some(ctx) = ctx else {
            return;
        };
        if !self.handlers.snapshot().is_tracked(&record.model) {
            return;
        }
        match self.records.get(&record.model, record.id).await {
            Ok(Some(previous)) => ctx.stash(previous),
            Ok(None) => {}
            Err(err) => {
                tracing::warn!(model = %record.model, record_id = %record.id, error = %err, "could not snapshot record");
            }
        }
    }

    /// Run the rules bound to `record`'s model after a create or update.
    pub async fn after_save(
        &self,
        record: &Record,
        kind: MutationKind,
        mut ctx: Option<&mut MutationContext>,
    ) -> Vec<DispatchTicket> {
        let previous = ctx
            .as_deref_mut()
            .and_then(|ctx| ctx.take(&record.model, record.id));
        self.fire(Channel::Instance, record, previous.as_ref(), kind, ctx.as_deref())
            .await
    }

    /// Stash every row targeted by a bulk update, by value.
    pub fn before_bulk_update(
        &self,
        model: &ModelKey,
        rows: &[Record],
        ctx: Option<&mut MutationContext>,
    ) {
        let Some(ctx) = ctx else {
            return;
        };
        if self.handlers.snapshot().is_tracked(model) {
            ctx.stash_bulk(model, rows.iter().cloned());
        }
    }

    /// Run the rules bound to the bulk channel for every updated row.
    pub async fn after_bulk_update(
        &self,
        rows: &[Record],
        mut ctx: Option<&mut MutationContext>,
    ) -> Vec<DispatchTicket> {
        let mut tickets = Vec::new();
        for row in rows {
            let previous = ctx
                .as_deref_mut()
                .and_then(|ctx| ctx.take_bulk(&row.model, row.id));
            tickets.extend(
                self.fire(
                    Channel::Bulk,
                    row,
                    previous.as_ref(),
                    MutationKind::Updated,
                    ctx.as_deref(),
                )
                .await,
            );
        }
        tickets
    }

    /// Run the rules bound to `record`'s model after it was deleted.
    pub async fn after_delete(
        &self,
        record: &Record,
        ctx: Option<&mut MutationContext>,
    ) -> Vec<DispatchTicket> {
        self.fire(
            Channel::Instance,
            record,
            None,
            MutationKind::Deleted,
            ctx.as_deref(),
        )
        .await
    }

    async fn fire(
        &self,
        channel: Channel,
        record: &Record,
        previous: Option<&Record>,
        kind: MutationKind,
        ctx: Option<&MutationContext>,
    ) -> Vec<DispatchTicket> {
        let bindings = self.handlers.snapshot();
        let mut tickets = Vec::new();
        for rule in bindings.handlers_for(channel, &record.model) {
            if !rule.rule.trigger.matches(kind) {
                continue;
            }
            if !self.condition_holds(rule, record).await {
                tracing::debug!(rule_id = %rule.id(), record_id = %record.id, "condition not met");
                continue;
            }
            if rule.rule.trigger.requires_change() && !self.changed(rule, record, previous).await {
                tracing::debug!(rule_id = %rule.id(), record_id = %record.id, "watched values unchanged");
                continue;
            }
            tracing::debug!(rule_id = %rule.id(), record_id = %record.id, "rule fired");
            let ticket = self
                .dispatcher
                .enqueue(MailJob {
                    rule: Arc::clone(rule),
                    record: record.clone(),
                    notices: ctx.and_then(MutationContext::notices).cloned(),
                })
                .await;
            tickets.push(ticket);
        }
        tickets
    }

    /// Fold the clauses left to right, skipping those that cannot change
    /// the running result.
    async fn condition_holds(&self, rule: &CompiledRule, record: &Record) -> bool {
        let mut fold = Fold::default();
        for compiled in &rule.clauses {
            let clause = &compiled.clause;
            if !fold.needs(clause.connector) {
                continue;
            }
            let value = resolve(&*self.records, record, &compiled.path).await;
            fold.push(clause.connector, clause.operator.holds(&value, &clause.value));
        }
        fold.result()
    }

    /// Whether the values the condition reads differ from the previous state.
    ///
    /// Values are compared as multisets; many-valued paths compare as sets.
    /// Without a condition the whole field map is compared. Without a
    /// previous state the record counts as changed.
    async fn changed(&self, rule: &CompiledRule, record: &Record, previous: Option<&Record>) -> bool {
        let Some(previous) = previous else {
            return true;
        };
        if rule.clauses.is_empty() {
            return record.fields != previous.fields;
        }
        let mut now: Vec<Canonical> = Vec::with_capacity(rule.clauses.len());
        let mut before: Vec<Canonical> = Vec::with_capacity(rule.clauses.len());
        for compiled in &rule.clauses {
            now.push(resolve(&*self.records, record, &compiled.path).await.canonical());
            before.push(resolve(&*self.records, previous, &compiled.path).await.canonical());
        }
        now.sort();
        before.sort();
        now != before
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::{DispatchOutcome, DispatcherConfig};
    use crate::outbox::Outbox;
    use crate::testing::{HrFixture, InMemoryRuleRepo, InMemoryTemplateRepo, key, rule_on};
    use hrmail_domain::automation::{AutomationRule, Clause, Condition, Operator, Trigger};
    use hrmail_domain::record::FieldValue;
    use hrmail_domain::template::MailTemplate;

    use crate::testing::InMemoryRecordRepo;

    struct Harness {
        fx: HrFixture,
        rules: Arc<InMemoryRuleRepo>,
        outbox: Arc<Outbox>,
        template: MailTemplate,
        engine: AutomationEngine<InMemoryRuleRepo, InMemoryRecordRepo>,
    }

    impl Harness {
        async fn new() -> Self {
            let fx = HrFixture::new().await;
            let rules = Arc::new(InMemoryRuleRepo::default());
            let templates = Arc::new(InMemoryTemplateRepo::default());
            let template = templates.put(MailTemplate::new("Notice", "<p>{{instance.status}}</p>"));
            let outbox = Arc::new(Outbox::new(32));
            let dispatcher = MailDispatcher::start(
                &DispatcherConfig::default(),
                templates,
                Arc::clone(&fx.records),
                Arc::clone(&outbox),
                Arc::clone(&fx.registry),
            );
            let engine = AutomationEngine::new(
                Arc::clone(&rules),
                Arc::clone(&fx.records),
                Arc::clone(&fx.registry),
                dispatcher,
            );
            Self {
                fx,
                rules,
                outbox,
                template,
                engine,
            }
        }

        async fn add_rule(&self, mut rule: AutomationRule) -> RuleId {
            rule.template_id = self.template.id;
            let id = rule.id;
            self.rules.create(rule).await.unwrap();
            self.engine.rebuild().await.unwrap();
            id
        }

        /// Drive an update of the ticket through the hooks.
        async fn update_ticket(&self, change: impl FnOnce(&mut Record)) -> Vec<DispatchTicket> {
            let mut ctx = MutationContext::new();
            let mut ticket = self
                .fx
                .records
                .get(&key("helpdesk.Ticket"), self.fx.ticket.id)
                .await
                .unwrap()
                .unwrap();
            change(&mut ticket);
            self.engine.before_save(&ticket, Some(&mut ctx)).await;
            self.fx.records.update(ticket.clone()).await.unwrap();
            let tickets = self
                .engine
                .after_save(&ticket, MutationKind::Updated, Some(&mut ctx))
                .await;
            assert!(ctx.is_empty(), "snapshot must be consumed");
            tickets
        }
    }

    async fn sent(tickets: Vec<DispatchTicket>) -> usize {
        let mut count = 0;
        for ticket in tickets {
            if matches!(ticket.outcome().await, DispatchOutcome::Sent { .. }) {
                count += 1;
            }
        }
        count
    }

    fn status_rule(trigger: Trigger, operator: Operator, value: &str) -> AutomationRule {
        let mut rule = rule_on("helpdesk.Ticket", trigger);
        rule.condition = Condition::new(vec![Clause::new("status", operator, value)]);
        rule
    }

    #[tokio::test]
    async fn should_dispatch_once_on_create_with_empty_condition() {
        let h = Harness::new().await;
        h.add_rule(rule_on("helpdesk.Ticket", Trigger::OnCreate)).await;

        let ticket = Record::new(key("helpdesk.Ticket"))
            .with("status", "new")
            .with("employee_id", FieldValue::reference(h.fx.employee.id));
        let mut ctx = MutationContext::new();
        h.engine.before_save(&ticket, Some(&mut ctx)).await;
        h.fx.records.insert(ticket.clone()).await.unwrap();
        let tickets = h
            .engine
            .after_save(&ticket, MutationKind::Created, Some(&mut ctx))
            .await;

        assert_eq!(sent(tickets).await, 1);
        let mails = h.outbox.recent();
        assert_eq!(mails.len(), 1);
        assert_eq!(mails[0].to, "ada@example.com");
        assert_eq!(mails[0].body_html, "<p>new</p>");
    }

    #[tokio::test]
    async fn should_not_dispatch_when_condition_values_are_unchanged() {
        let h = Harness::new().await;
        h.add_rule(status_rule(Trigger::OnUpdate, Operator::Equal, "open")).await;

        let tickets = h.update_ticket(|t| {
            t.set("title", "Laptop still broken");
        })
        .await;

        assert!(tickets.is_empty());
        assert!(h.outbox.is_empty());
    }

    #[tokio::test]
    async fn should_dispatch_on_transition_into_matching_value_only() {
        let h = Harness::new().await;
        h.add_rule(status_rule(Trigger::OnUpdate, Operator::Equal, "closed")).await;

        let tickets = h.update_ticket(|t| {
            t.set("status", "closed");
        })
        .await;
        assert_eq!(sent(tickets).await, 1);

        // the reverse transition changes the value but fails the condition
        let tickets = h.update_ticket(|t| {
            t.set("status", "open");
        })
        .await;
        assert!(tickets.is_empty());
        assert_eq!(h.outbox.len(), 1);
    }

    #[tokio::test]
    async fn should_ignore_deactivated_rules() {
        let h = Harness::new().await;
        let mut rule = rule_on("helpdesk.Ticket", Trigger::OnUpdate);
        rule.active = false;
        h.add_rule(rule).await;

        let tickets = h.update_ticket(|t| {
            t.set("status", "closed");
        })
        .await;
        assert!(tickets.is_empty());
        assert!(h.engine.handlers().snapshot().tracked_models().is_empty());
    }

    #[tokio::test]
    async fn should_dispatch_once_after_repeated_rebuilds() {
        let h = Harness::new().await;
        h.add_rule(status_rule(Trigger::OnUpdate, Operator::NotEqual, "open")).await;
        h.engine.rebuild().await.unwrap();
        h.engine.rebuild().await.unwrap();

        let tickets = h.update_ticket(|t| {
            t.set("status", "escalated");
        })
        .await;
        assert_eq!(sent(tickets).await, 1);
    }

    #[tokio::test]
    async fn should_compare_many_valued_paths_as_sets() {
        let h = Harness::new().await;
        let mut rule = rule_on("helpdesk.Ticket", Trigger::OnUpdate);
        rule.condition = Condition::new(vec![Clause::new(
            "assigned_to",
            Operator::Equal,
            h.fx.manager.id.to_string(),
        )]);
        h.add_rule(rule).await;

        // same members, different order: not a change
        let (manager, employee) = (h.fx.manager.id, h.fx.employee.id);
        let tickets = h.update_ticket(|t| {
            t.set("assigned_to", FieldValue::references([employee, manager]));
        })
        .await;
        assert!(tickets.is_empty());

        // member removed: a change, and the manager is still assigned
        let tickets = h.update_ticket(|t| {
            t.set("assigned_to", FieldValue::references([manager]));
        })
        .await;
        assert_eq!(sent(tickets).await, 1);
    }

    #[tokio::test]
    async fn should_treat_missing_snapshot_as_changed() {
        let h = Harness::new().await;
        h.add_rule(status_rule(Trigger::OnUpdate, Operator::Equal, "open")).await;

        let tickets = h
            .engine
            .after_save(&h.fx.ticket, MutationKind::Updated, None)
            .await;
        assert_eq!(sent(tickets).await, 1);
    }

    #[tokio::test]
    async fn should_compare_full_field_map_without_condition() {
        let h = Harness::new().await;
        h.add_rule(rule_on("helpdesk.Ticket", Trigger::OnUpdate)).await;

        let tickets = h.update_ticket(|_| {}).await;
        assert!(tickets.is_empty());

        let tickets = h.update_ticket(|t| {
            t.set("priority", 5_i64);
        })
        .await;
        assert_eq!(sent(tickets).await, 1);
    }

    #[tokio::test]
    async fn should_evaluate_conditions_across_relations() {
        let h = Harness::new().await;
        let mut rule = rule_on("helpdesk.Ticket", Trigger::OnDelete);
        rule.condition = Condition::new(vec![
            Clause::new("employee_id__department__name", Operator::Equal, "Finance"),
            Clause::new("priority", Operator::Ge, "3").or(),
        ]);
        h.add_rule(rule).await;

        let tickets = h.engine.after_delete(&h.fx.ticket, None).await;
        assert_eq!(sent(tickets).await, 1);
    }

    #[tokio::test]
    async fn should_run_bulk_channel_per_row_with_snapshots() {
        let h = Harness::new().await;
        h.add_rule(status_rule(Trigger::OnUpdate, Operator::Equal, "closed")).await;

        let other = Record::new(key("helpdesk.Ticket"))
            .with("status", "closed")
            .with("employee_id", FieldValue::reference(h.fx.manager.id));
        h.fx.records.insert(other.clone()).await.unwrap();

        let rows = vec![h.fx.ticket.clone(), other.clone()];
        let mut ctx = MutationContext::new();
        h.engine
            .before_bulk_update(&key("helpdesk.Ticket"), &rows, Some(&mut ctx));
        let updated: Vec<Record> = rows
            .into_iter()
            .map(|mut row| {
                row.set("status", "closed");
                row
            })
            .collect();
        let tickets = h.engine.after_bulk_update(&updated, Some(&mut ctx)).await;

        // only the ticket that moved into `closed` fires
        assert_eq!(tickets.len(), 1);
        assert_eq!(tickets[0].record_id(), h.fx.ticket.id);
        assert_eq!(sent(tickets).await, 1);
        assert!(ctx.is_empty());
    }

    #[tokio::test]
    async fn should_isolate_rules_that_fail_to_compile() {
        let h = Harness::new().await;
        let mut broken = rule_on("helpdesk.Ticket", Trigger::OnCreate);
        broken.condition = Condition::new(vec![Clause::new("status__name", Operator::Equal, "x")]);
        let broken_id = broken.id;
        h.rules.create(broken).await.unwrap();
        let good = h.add_rule(rule_on("helpdesk.Ticket", Trigger::OnCreate)).await;

        let report = h.engine.rebuild().await.unwrap();
        assert_eq!(report.bound, vec![good]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].rule_id, broken_id);
    }

    #[tokio::test]
    async fn should_skip_snapshot_for_untracked_models() {
        let h = Harness::new().await;
        h.add_rule(rule_on("helpdesk.Ticket", Trigger::OnUpdate)).await;

        let mut ctx = MutationContext::new();
        h.engine.before_save(&h.fx.employee, Some(&mut ctx)).await;
        assert!(ctx.is_empty());
    }

    #[tokio::test]
    async fn should_attach_dispatch_failures_to_mutation_notices() {
        let h = Harness::new().await;
        let mut rule = rule_on("helpdesk.Ticket", Trigger::OnDelete);
        rule.template_id = hrmail_domain::id::TemplateId::new();
        let id = rule.id;
        h.rules.create(rule).await.unwrap();
        h.engine.rebuild().await.unwrap();

        let sink = crate::context::NoticeSink::default();
        let mut ctx = MutationContext::new().with_notices(sink.clone());
        let tickets = h.engine.after_delete(&h.fx.ticket, Some(&mut ctx)).await;
        assert_eq!(tickets[0].rule_id(), id);
        assert_eq!(sent(tickets).await, 0);
        assert_eq!(sink.drain().len(), 1);
    }
}
