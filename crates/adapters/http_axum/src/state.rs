//! Shared application state for axum handlers.

use std::sync::Arc;

use hrmail_app::outbox::Outbox;
use hrmail_app::ports::{RecordRepository, RuleRepository, TemplateRepository};
use hrmail_app::services::{RecordService, RuleService, TemplateService};
use hrmail_domain::registry::ModelRegistry;

/// Application state shared across all axum handlers.
///
/// Generic over the rule, template and record repositories to avoid
/// dynamic dispatch. `Clone` is implemented manually so the underlying
/// types themselves do not need to be `Clone` — only the `Arc` wrappers
/// are cloned.
pub struct AppState<RR, TR, DR> {
    /// Rule CRUD service.
    pub rule_service: Arc<RuleService<RR, DR>>,
    /// Template CRUD service.
    pub template_service: Arc<TemplateService<TR>>,
    /// Record mutation pipeline.
    pub record_service: Arc<RecordService<DR, RR>>,
    /// Models rules may target.
    pub registry: Arc<ModelRegistry>,
    /// Recently sent mail.
    pub outbox: Arc<Outbox>,
}

impl<RR, TR, DR> Clone for AppState<RR, TR, DR> {
    fn clone(&self) -> Self {
        Self {
            rule_service: Arc::clone(&self.rule_service),
            template_service: Arc::clone(&self.template_service),
            record_service: Arc::clone(&self.record_service),
            registry: Arc::clone(&self.registry),
            outbox: Arc::clone(&self.outbox),
        }
    }
}

impl<RR, TR, DR> AppState<RR, TR, DR>
where
    RR: RuleRepository + Send + Sync + 'static,
    TR: TemplateRepository + Send + Sync + 'static,
    DR: RecordRepository + Send + Sync + 'static,
{
    /// Create a new application state from pre-wrapped `Arc` services.
    pub fn from_arcs(
        rule_service: Arc<RuleService<RR, DR>>,
        template_service: Arc<TemplateService<TR>>,
        record_service: Arc<RecordService<DR, RR>>,
        registry: Arc<ModelRegistry>,
        outbox: Arc<Outbox>,
    ) -> Self {
        Self {
            rule_service,
            template_service,
            record_service,
            registry,
            outbox,
        }
    }
}
