//! In-memory repositories and a wired state for router tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::Semaphore;

use hrmail_app::automation_engine::AutomationEngine;
use hrmail_app::dispatcher::{DispatcherConfig, MailDispatcher};
use hrmail_app::outbox::Outbox;
use hrmail_app::ports::{MailTransport, RecordRepository, RuleRepository, TemplateRepository};
use hrmail_app::services::{RecordService, RuleService, TemplateService};
use hrmail_domain::automation::AutomationRule;
use hrmail_domain::error::{HrMailError, NotFoundError};
use hrmail_domain::id::{RecordId, RuleId, TemplateId};
use hrmail_domain::mail::OutgoingMail;
use hrmail_domain::record::Record;
use hrmail_domain::registry::ModelRegistry;
use hrmail_domain::schema::{ModelKey, ModelSchema};
use hrmail_domain::template::MailTemplate;

use crate::state::AppState;

pub fn employee_key() -> &'static str {
    "employee.Employee"
}

#[derive(Default)]
pub struct MemoryRules(Mutex<HashMap<RuleId, AutomationRule>>);

impl RuleRepository for MemoryRules {
    async fn create(&self, rule: AutomationRule) -> Result<AutomationRule, HrMailError> {
        self.0.lock().unwrap().insert(rule.id, rule.clone());
        Ok(rule)
    }
    async fn get_by_id(&self, id: RuleId) -> Result<Option<AutomationRule>, HrMailError> {
        Ok(self.0.lock().unwrap().get(&id).cloned())
    }
    async fn get_all(&self) -> Result<Vec<AutomationRule>, HrMailError> {
        Ok(self.0.lock().unwrap().values().cloned().collect())
    }
    async fn get_active(&self) -> Result<Vec<AutomationRule>, HrMailError> {
        Ok(self
            .0
            .lock()
            .unwrap()
            .values()
            .filter(|r| r.active)
            .cloned()
            .collect())
    }
    async fn update(&self, rule: AutomationRule) -> Result<AutomationRule, HrMailError> {
        self.0.lock().unwrap().insert(rule.id, rule.clone());
        Ok(rule)
    }
    async fn delete(&self, id: RuleId) -> Result<(), HrMailError> {
        self.0.lock().unwrap().remove(&id);
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryTemplates(Mutex<HashMap<TemplateId, MailTemplate>>);

impl TemplateRepository for MemoryTemplates {
    async fn create(&self, template: MailTemplate) -> Result<MailTemplate, HrMailError> {
        self.0.lock().unwrap().insert(template.id, template.clone());
        Ok(template)
    }
    async fn get_by_id(&self, id: TemplateId) -> Result<Option<MailTemplate>, HrMailError> {
        Ok(self.0.lock().unwrap().get(&id).cloned())
    }
    async fn get_all(&self) -> Result<Vec<MailTemplate>, HrMailError> {
        Ok(self.0.lock().unwrap().values().cloned().collect())
    }
    async fn update(&self, template: MailTemplate) -> Result<MailTemplate, HrMailError> {
        self.0.lock().unwrap().insert(template.id, template.clone());
        Ok(template)
    }
    async fn delete(&self, id: TemplateId) -> Result<(), HrMailError> {
        self.0.lock().unwrap().remove(&id);
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryRecords(Mutex<HashMap<(ModelKey, RecordId), Record>>);

impl RecordRepository for MemoryRecords {
    async fn get(&self, model: &ModelKey, id: RecordId) -> Result<Option<Record>, HrMailError> {
        Ok(self.0.lock().unwrap().get(&(model.clone(), id)).cloned())
    }
    async fn get_many(&self, model: &ModelKey, ids: &[RecordId]) -> Result<Vec<Record>, HrMailError> {
        let store = self.0.lock().unwrap();
        Ok(ids
            .iter()
            .filter_map(|id| store.get(&(model.clone(), *id)).cloned())
            .collect())
    }
    async fn list(&self, model: &ModelKey) -> Result<Vec<Record>, HrMailError> {
        Ok(self
            .0
            .lock()
            .unwrap()
            .values()
            .filter(|r| &r.model == model)
            .cloned()
            .collect())
    }
    async fn insert(&self, record: Record) -> Result<Record, HrMailError> {
        self.0
            .lock()
            .unwrap()
            .insert((record.model.clone(), record.id), record.clone());
        Ok(record)
    }
    async fn update(&self, record: Record) -> Result<Record, HrMailError> {
        let mut store = self.0.lock().unwrap();
        let slot = store
            .get_mut(&(record.model.clone(), record.id))
            .ok_or_else(|| NotFoundError {
                entity: "Record",
                id: record.id.to_string(),
            })?;
        *slot = record.clone();
        Ok(record)
    }
    async fn update_many(&self, records: Vec<Record>) -> Result<Vec<Record>, HrMailError> {
        let mut store = self.0.lock().unwrap();
        for record in &records {
            if !store.contains_key(&(record.model.clone(), record.id)) {
                return Err(NotFoundError {
                    entity: "Record",
                    id: record.id.to_string(),
                }
                .into());
            }
        }
        for record in &records {
            store.insert((record.model.clone(), record.id), record.clone());
        }
        Ok(records)
    }
    async fn delete(&self, model: &ModelKey, id: RecordId) -> Result<(), HrMailError> {
        self.0.lock().unwrap().remove(&(model.clone(), id));
        Ok(())
    }
}

pub struct TestApp {
    pub state: AppState<MemoryRules, MemoryTemplates, MemoryRecords>,
}

impl TestApp {
    /// Wire every service over in-memory stores. Must run inside a runtime.
    pub fn new() -> Self {
        let outbox = Arc::new(Outbox::new(8));
        Self::wire(Arc::clone(&outbox), outbox)
    }

    /// Same wiring, but mail leaves through `transport` instead of the outbox.
    pub fn with_transport<MT>(transport: Arc<MT>) -> Self
    where
        MT: MailTransport + Send + Sync + 'static,
    {
        Self::wire(transport, Arc::new(Outbox::new(8)))
    }

    fn wire<MT>(transport: Arc<MT>, outbox: Arc<Outbox>) -> Self
    where
        MT: MailTransport + Send + Sync + 'static,
    {
        let employee = ModelKey::parse(employee_key()).unwrap();
        let registry = Arc::new(
            ModelRegistry::builder()
                .register(
                    ModelSchema::builder(employee)
                        .name_field("first_name")
                        .name_field("last_name")
                        .email_field("email")
                        .build(),
                )
                .build(),
        );
        let rules = Arc::new(MemoryRules::default());
        let templates = Arc::new(MemoryTemplates::default());
        let records = Arc::new(MemoryRecords::default());

        let dispatcher = MailDispatcher::start(
            &DispatcherConfig::default(),
            Arc::clone(&templates),
            Arc::clone(&records),
            transport,
            Arc::clone(&registry),
        );
        let engine = Arc::new(AutomationEngine::new(
            Arc::clone(&rules),
            Arc::clone(&records),
            Arc::clone(&registry),
            dispatcher,
        ));

        Self {
            state: AppState::from_arcs(
                Arc::new(RuleService::new(rules, Arc::clone(&engine))),
                Arc::new(TemplateService::new(templates)),
                Arc::new(RecordService::new(records, engine)),
                registry,
                outbox,
            ),
        }
    }
}

/// Transport that holds every send until [`open`](Self::open) is called.
pub struct GatedTransport {
    gate: Semaphore,
    sent: Mutex<Vec<OutgoingMail>>,
}

impl Default for GatedTransport {
    fn default() -> Self {
        Self {
            gate: Semaphore::new(0),
            sent: Mutex::default(),
        }
    }
}

impl GatedTransport {
    /// Let every pending and later send through.
    pub fn open(&self) {
        self.gate.add_permits(1);
    }

    pub fn sent(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

impl MailTransport for GatedTransport {
    async fn send(&self, mail: OutgoingMail) -> Result<(), HrMailError> {
        let _permit = self
            .gate
            .acquire()
            .await
            .map_err(|err| HrMailError::Transport(err.into()))?;
        self.sent.lock().unwrap().push(mail);
        Ok(())
    }
}
