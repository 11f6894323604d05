//! Record service — the mutation pipeline that drives the automation hooks.
//!
//! Every write runs the engine's pre-hook, the repository call, then the
//! post-hook, and hands back the tickets of the mails it queued.

use std::collections::BTreeMap;
use std::sync::Arc;

use hrmail_domain::automation::MutationKind;
use hrmail_domain::error::{HrMailError, NotFoundError};
use hrmail_domain::id::RecordId;
use hrmail_domain::record::{FieldValue, Record};
use hrmail_domain::schema::ModelKey;

use crate::automation_engine::AutomationEngine;
use crate::context::MutationContext;
use crate::dispatcher::DispatchTicket;
use crate::ports::{RecordRepository, RuleRepository};

/// The result of a write together with the dispatches it queued.
#[derive(Debug)]
pub struct Mutation<T> {
    pub value: T,
    pub tickets: Vec<DispatchTicket>,
}

/// Application service for records of registered models.
pub struct RecordService<DR, RR> {
    records: Arc<DR>,
    engine: Arc<AutomationEngine<RR, DR>>,
}

impl<DR, RR> RecordService<DR, RR>
where
    DR: RecordRepository + Send + Sync,
    RR: RuleRepository + Send + Sync,
{
    /// Create a new service; `records` must be the repository the engine reads.
    pub fn new(records: Arc<DR>, engine: Arc<AutomationEngine<RR, DR>>) -> Self {
        Self { records, engine }
    }

    /// Fetch one record.
    ///
    /// # Errors
    ///
    /// Returns [`HrMailError::NotFound`] when the model is not registered or
    /// the record does not exist.
    #[tracing::instrument(skip(self))]
    pub async fn get(&self, model: &ModelKey, id: RecordId) -> Result<Record, HrMailError> {
        self.known(model)?;
        self.records.get(model, id).await?.ok_or_else(|| {
            NotFoundError {
                entity: "Record",
                id: id.to_string(),
            }
            .into()
        })
    }

    /// List every record of `model`.
    ///
    /// # Errors
    ///
    /// Returns [`HrMailError::NotFound`] for an unregistered model, or a
    /// storage error from the repository.
    pub async fn list(&self, model: &ModelKey) -> Result<Vec<Record>, HrMailError> {
        self.known(model)?;
        self.records.list(model).await
    }

    /// Insert a new record and run the create rules.
    ///
    /// # Errors
    ///
    /// Returns [`HrMailError::NotFound`] for an unregistered model,
    /// [`HrMailError::Validation`] when a field does not fit the schema, or a
    /// storage error from the repository.
    #[tracing::instrument(skip(self, record, ctx), fields(model = %record.model, record_id = %record.id))]
    pub async fn create(
        &self,
        record: Record,
        ctx: &mut MutationContext,
    ) -> Result<Mutation<Record>, HrMailError> {
        self.check(&record)?;
        self.engine.before_save(&record, Some(&mut *ctx)).await;
        let created = self.records.insert(record).await?;
        let tickets = self
            .engine
            .after_save(&created, MutationKind::Created, Some(ctx))
            .await;
        Ok(Mutation {
            value: created,
            tickets,
        })
    }

    /// Replace an existing record and run the update rules.
    ///
    /// # Errors
    ///
    /// Same as [`create`](Self::create), plus [`HrMailError::NotFound`] when
    /// the record does not exist.
    #[tracing::instrument(skip(self, record, ctx), fields(model = %record.model, record_id = %record.id))]
    pub async fn update(
        &self,
        record: Record,
        ctx: &mut MutationContext,
    ) -> Result<Mutation<Record>, HrMailError> {
        self.check(&record)?;
        self.get(&record.model, record.id).await?;
        self.engine.before_save(&record, Some(&mut *ctx)).await;
        let updated = self.records.update(record).await?;
        let tickets = self
            .engine
            .after_save(&updated, MutationKind::Updated, Some(ctx))
            .await;
        Ok(Mutation {
            value: updated,
            tickets,
        })
    }

    /// Apply the same field changes to many rows at once.
    ///
    /// `ids` narrows the rows; `None` targets every record of `model`.
    /// Unknown ids are skipped. Only bulk-channel rules run.
    ///
    /// # Errors
    ///
    /// Returns [`HrMailError::NotFound`] for an unregistered model,
    /// [`HrMailError::Validation`] when a change does not fit the schema, or
    /// a storage error from the repository. The rows are written together:
    /// when validation or the write fails nothing is changed and no rule runs.
    #[tracing::instrument(skip(self, ids, changes, ctx), fields(fields = changes.len()))]
    pub async fn bulk_update(
        &self,
        model: &ModelKey,
        ids: Option<&[RecordId]>,
        changes: BTreeMap<String, FieldValue>,
        ctx: &mut MutationContext,
    ) -> Result<Mutation<Vec<Record>>, HrMailError> {
        self.known(model)?;
        let rows = match ids {
            Some(ids) => self.records.get_many(model, ids).await?,
            None => self.records.list(model).await?,
        };

        let changed: Vec<Record> = rows
            .iter()
            .map(|row| {
                let mut row = row.clone();
                row.fields
                    .extend(changes.iter().map(|(k, v)| (k.clone(), v.clone())));
                row
            })
            .collect();
        for row in &changed {
            self.check(row)?;
        }

        self.engine.before_bulk_update(model, &rows, Some(&mut *ctx));
        let written = match self.records.update_many(changed).await {
            Ok(written) => written,
            Err(err) => {
                let dropped = ctx.discard_bulk(model);
                tracing::warn!(error = %err, snapshots = dropped, "bulk update rolled back");
                return Err(err);
            }
        };
        tracing::debug!(rows = written.len(), "bulk update written");
        let tickets = self.engine.after_bulk_update(&written, Some(ctx)).await;
        Ok(Mutation {
            value: written,
            tickets,
        })
    }

    /// Delete a record and run the delete rules against its last state.
    ///
    /// # Errors
    ///
    /// Returns [`HrMailError::NotFound`] when the model or the record does
    /// not exist, or a storage error from the repository.
    #[tracing::instrument(skip(self, ctx))]
    pub async fn delete(
        &self,
        model: &ModelKey,
        id: RecordId,
        ctx: &mut MutationContext,
    ) -> Result<Mutation<Record>, HrMailError> {
        let record = self.get(model, id).await?;
        self.records.delete(model, id).await?;
        let tickets = self.engine.after_delete(&record, Some(ctx)).await;
        Ok(Mutation {
            value: record,
            tickets,
        })
    }

    fn known(&self, model: &ModelKey) -> Result<(), HrMailError> {
        if self.engine.registry().get(model).is_some() {
            Ok(())
        } else {
            Err(NotFoundError {
                entity: "Model",
                id: model.to_string(),
            }
            .into())
        }
    }

    fn check(&self, record: &Record) -> Result<(), HrMailError> {
        let schema = self.engine.registry().get(&record.model).ok_or_else(|| NotFoundError {
            entity: "Model",
            id: record.model.to_string(),
        })?;
        record.validate_against(schema)?;
        Ok(())
    }
}
