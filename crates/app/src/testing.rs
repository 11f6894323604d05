//! In-memory port implementations and HR fixtures shared by unit tests.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use hrmail_domain::automation::{AutomationRule, Trigger};
use hrmail_domain::error::{HrMailError, NotFoundError};
use hrmail_domain::id::{RecordId, RuleId, TemplateId};
use hrmail_domain::mail::OutgoingMail;
use hrmail_domain::path::CompiledPath;
use hrmail_domain::record::{FieldValue, Record};
use hrmail_domain::registry::ModelRegistry;
use hrmail_domain::schema::{ModelKey, ModelSchema};
use hrmail_domain::template::MailTemplate;

use crate::ports::{MailTransport, RecordRepository, RuleRepository, TemplateRepository};

pub(crate) fn key(raw: &str) -> ModelKey {
    ModelKey::parse(raw).unwrap()
}

pub(crate) fn hr_registry() -> ModelRegistry {
    ModelRegistry::builder()
        .register(
            ModelSchema::builder(key("base.Department"))
                .name_field("name")
                .scalar("mailbox")
                .foreign_key("manager", key("employee.Employee"))
                .build(),
        )
        .register(
            ModelSchema::builder(key("employee.Employee"))
                .name_field("first_name")
                .name_field("last_name")
                .email_field("email")
                .foreign_key("department", key("base.Department"))
                .build(),
        )
        .register(
            ModelSchema::builder(key("helpdesk.Ticket"))
                .scalar("title")
                .scalar("status")
                .scalar("priority")
                .foreign_key("employee_id", key("employee.Employee"))
                .many_to_many("assigned_to", key("employee.Employee"))
                .build(),
        )
        .build()
}

/// An active rule with a default recipient for `model` and a template id
/// that does not exist yet.
pub(crate) fn rule_on(model: &str, trigger: Trigger) -> AutomationRule {
    let recipient = if model == "helpdesk.Ticket" {
        "employee_id"
    } else {
        "self"
    };
    AutomationRule::builder(key(model))
        .title(format!("Rule on {model}"))
        .trigger(trigger)
        .recipient(recipient)
        .template(TemplateId::new())
        .build()
        .unwrap()
}

/// Registry plus a small populated record store:
/// Ada works in Human Resources managed by Grace, and opened a ticket
/// assigned to Grace and herself.
pub(crate) struct HrFixture {
    pub registry: Arc<ModelRegistry>,
    pub records: Arc<InMemoryRecordRepo>,
    pub department: Record,
    pub manager: Record,
    pub employee: Record,
    pub ticket: Record,
}

impl HrFixture {
    pub async fn new() -> Self {
        let records = Arc::new(InMemoryRecordRepo::default());
        let department_id = RecordId::new();
        let manager = Record::new(key("employee.Employee"))
            .with("first_name", "Grace")
            .with("last_name", "Hopper")
            .with("email", "grace@example.com")
            .with("department", FieldValue::reference(department_id));
        let department = Record::new(key("base.Department"))
            .with_id(department_id)
            .with("name", "Human Resources")
            .with("mailbox", "hr@example.com")
            .with("manager", FieldValue::reference(manager.id));
        let employee = Record::new(key("employee.Employee"))
            .with("first_name", "Ada")
            .with("last_name", "Lovelace")
            .with("email", "ada@example.com")
            .with("department", FieldValue::reference(department_id));
        let ticket = Record::new(key("helpdesk.Ticket"))
            .with("title", "Laptop broken")
            .with("status", "open")
            .with("priority", 3_i64)
            .with("employee_id", FieldValue::reference(employee.id))
            .with("assigned_to", FieldValue::references([manager.id, employee.id]));

        for record in [&department, &manager, &employee, &ticket] {
            records.insert(record.clone()).await.unwrap();
        }

        Self {
            registry: Arc::new(hr_registry()),
            records,
            department,
            manager,
            employee,
            ticket,
        }
    }

    pub fn path(&self, model: &str, raw: &str) -> CompiledPath {
        CompiledPath::compile(&self.registry, &key(model), raw).unwrap()
    }
}

#[derive(Default)]
pub(crate) struct InMemoryRecordRepo {
    store: Mutex<HashMap<(ModelKey, RecordId), Record>>,
    failing: bool,
    reject_writes: AtomicBool,
}

impl InMemoryRecordRepo {
    /// A repository whose every call fails with a storage error.
    pub fn failing() -> Self {
        Self {
            store: Mutex::default(),
            failing: true,
            reject_writes: AtomicBool::new(false),
        }
    }

    /// Make every later `update_many` fail while reads keep working.
    pub fn reject_writes(&self) {
        self.reject_writes.store(true, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), HrMailError> {
        if self.failing {
            Err(HrMailError::Storage("disk on fire".into()))
        } else {
            Ok(())
        }
    }
}

impl RecordRepository for InMemoryRecordRepo {
    fn get(
        &self,
        model: &ModelKey,
        id: RecordId,
    ) -> impl Future<Output = Result<Option<Record>, HrMailError>> + Send {
        let result = self
            .check()
            .map(|()| self.store.lock().unwrap().get(&(model.clone(), id)).cloned());
        async { result }
    }

    fn get_many(
        &self,
        model: &ModelKey,
        ids: &[RecordId],
    ) -> impl Future<Output = Result<Vec<Record>, HrMailError>> + Send {
        let result = self.check().map(|()| {
            let store = self.store.lock().unwrap();
            ids.iter()
                .filter_map(|id| store.get(&(model.clone(), *id)).cloned())
                .collect()
        });
        async { result }
    }

    fn list(
        &self,
        model: &ModelKey,
    ) -> impl Future<Output = Result<Vec<Record>, HrMailError>> + Send {
        let result = self.check().map(|()| {
            let store = self.store.lock().unwrap();
            store
                .values()
                .filter(|r| &r.model == model)
                .cloned()
                .collect()
        });
        async { result }
    }

    fn insert(&self, record: Record) -> impl Future<Output = Result<Record, HrMailError>> + Send {
        let result = self.check().map(|()| {
            self.store
                .lock()
                .unwrap()
                .insert((record.model.clone(), record.id), record.clone());
            record
        });
        async { result }
    }

    fn update(&self, record: Record) -> impl Future<Output = Result<Record, HrMailError>> + Send {
        let result = self.check().and_then(|()| {
            let mut store = self.store.lock().unwrap();
            let slot = store
                .get_mut(&(record.model.clone(), record.id))
                .ok_or_else(|| NotFoundError {
                    entity: "Record",
                    id: record.id.to_string(),
                })?;
            *slot = record.clone();
            Ok(record)
        });
        async { result }
    }

    fn update_many(
        &self,
        records: Vec<Record>,
    ) -> impl Future<Output = Result<Vec<Record>, HrMailError>> + Send {
        let result = self.check().and_then(|()| {
            if self.reject_writes.load(Ordering::SeqCst) {
                return Err(HrMailError::Storage("database is locked".into()));
            }
            let mut store = self.store.lock().unwrap();
            if let Some(missing) = records
                .iter()
                .find(|r| !store.contains_key(&(r.model.clone(), r.id)))
            {
                return Err(NotFoundError {
                    entity: "Record",
                    id: missing.id.to_string(),
                }
                .into());
            }
            for record in &records {
                store.insert((record.model.clone(), record.id), record.clone());
            }
            Ok(records)
        });
        async { result }
    }

    fn delete(
        &self,
        model: &ModelKey,
        id: RecordId,
    ) -> impl Future<Output = Result<(), HrMailError>> + Send {
        let result = self.check().map(|()| {
            self.store.lock().unwrap().remove(&(model.clone(), id));
        });
        async { result }
    }
}

#[derive(Default)]
pub(crate) struct InMemoryRuleRepo {
    store: Mutex<Vec<AutomationRule>>,
    reject_loads: AtomicBool,
}

impl InMemoryRuleRepo {
    /// Make `get_active` fail from now on; writes keep working.
    pub fn reject_loads(&self) {
        self.reject_loads.store(true, Ordering::SeqCst);
    }
}

impl RuleRepository for InMemoryRuleRepo {
    fn create(
        &self,
        rule: AutomationRule,
    ) -> impl Future<Output = Result<AutomationRule, HrMailError>> + Send {
        self.store.lock().unwrap().push(rule.clone());
        async { Ok(rule) }
    }

    fn get_by_id(
        &self,
        id: RuleId,
    ) -> impl Future<Output = Result<Option<AutomationRule>, HrMailError>> + Send {
        let result = self.store.lock().unwrap().iter().find(|r| r.id == id).cloned();
        async { Ok(result) }
    }

    fn get_all(&self) -> impl Future<Output = Result<Vec<AutomationRule>, HrMailError>> + Send {
        let result = self.store.lock().unwrap().clone();
        async { Ok(result) }
    }

    fn get_active(
        &self,
    ) -> impl Future<Output = Result<Vec<AutomationRule>, HrMailError>> + Send {
        let result: Result<Vec<AutomationRule>, HrMailError> = if self.reject_loads.load(Ordering::SeqCst) {
            Err(HrMailError::Storage("rules table unreadable".into()))
        } else {
            Ok(self
                .store
                .lock()
                .unwrap()
                .iter()
                .filter(|r| r.active)
                .cloned()
                .collect())
        };
        async { result }
    }

    fn update(
        &self,
        rule: AutomationRule,
    ) -> impl Future<Output = Result<AutomationRule, HrMailError>> + Send {
        let mut store = self.store.lock().unwrap();
        let result = match store.iter_mut().find(|r| r.id == rule.id) {
            Some(slot) => {
                *slot = rule.clone();
                Ok(rule)
            }
            None => Err(NotFoundError {
                entity: "AutomationRule",
                id: rule.id.to_string(),
            }
            .into()),
        };
        async { result }
    }

    fn delete(&self, id: RuleId) -> impl Future<Output = Result<(), HrMailError>> + Send {
        self.store.lock().unwrap().retain(|r| r.id != id);
        async { Ok(()) }
    }
}

#[derive(Default)]
pub(crate) struct InMemoryTemplateRepo {
    store: Mutex<HashMap<TemplateId, MailTemplate>>,
}

impl InMemoryTemplateRepo {
    /// Store a template synchronously and return it.
    pub fn put(&self, template: MailTemplate) -> MailTemplate {
        self.store
            .lock()
            .unwrap()
            .insert(template.id, template.clone());
        template
    }
}

impl TemplateRepository for InMemoryTemplateRepo {
    fn create(
        &self,
        template: MailTemplate,
    ) -> impl Future<Output = Result<MailTemplate, HrMailError>> + Send {
        let template = self.put(template);
        async { Ok(template) }
    }

    fn get_by_id(
        &self,
        id: TemplateId,
    ) -> impl Future<Output = Result<Option<MailTemplate>, HrMailError>> + Send {
        let result = self.store.lock().unwrap().get(&id).cloned();
        async { Ok(result) }
    }

    fn get_all(&self) -> impl Future<Output = Result<Vec<MailTemplate>, HrMailError>> + Send {
        let result: Vec<MailTemplate> = self.store.lock().unwrap().values().cloned().collect();
        async { Ok(result) }
    }

    fn update(
        &self,
        template: MailTemplate,
    ) -> impl Future<Output = Result<MailTemplate, HrMailError>> + Send {
        let exists = self.store.lock().unwrap().contains_key(&template.id);
        let result = if exists {
            Ok(self.put(template))
        } else {
            Err(NotFoundError {
                entity: "MailTemplate",
                id: template.id.to_string(),
            }
            .into())
        };
        async { result }
    }

    fn delete(&self, id: TemplateId) -> impl Future<Output = Result<(), HrMailError>> + Send {
        self.store.lock().unwrap().remove(&id);
        async { Ok(()) }
    }
}

/// Transport that refuses every mail.
pub(crate) struct FailingTransport;

impl MailTransport for FailingTransport {
    fn send(&self, _mail: OutgoingMail) -> impl Future<Output = Result<(), HrMailError>> + Send {
        async { Err(HrMailError::Transport("connection refused".into())) }
    }
}
