//! Per-mutation context carried from the pre-save hook to the post-save hook.
//!
//! A [`MutationContext`] is created by whoever drives a mutation, handed to
//! the engine before the write so it can stash the persisted state, and
//! handed again after the write so the engine can compare against it.
//! Snapshots are consumed when read.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use hrmail_domain::id::RecordId;
use hrmail_domain::record::Record;
use hrmail_domain::schema::ModelKey;
use serde::Serialize;

/// Severity of a [`Notice`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// User-visible message produced while handling a mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    #[must_use]
    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

/// Shared collector for notices; clones push into the same buffer.
///
/// Dispatch workers hold a clone, so notices may arrive after the
/// mutation itself returned.
#[derive(Debug, Clone, Default)]
pub struct NoticeSink {
    inner: Arc<Mutex<Vec<Notice>>>,
}

impl NoticeSink {
    pub fn push(&self, notice: Notice) {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(notice);
    }

    /// Remove and return every collected notice.
    #[must_use]
    pub fn drain(&self) -> Vec<Notice> {
        std::mem::take(&mut *self.inner.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

/// State owned by one in-flight mutation.
#[derive(Debug, Default)]
pub struct MutationContext {
    snapshots: HashMap<(ModelKey, RecordId), Record>,
    bulk: HashMap<ModelKey, HashMap<RecordId, Record>>,
    notices: Option<NoticeSink>,
}

impl MutationContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a sink that receives dispatch failures for this mutation.
    #[must_use]
    pub fn with_notices(mut self, sink: NoticeSink) -> Self {
        self.notices = Some(sink);
        self
    }

    #[must_use]
    pub fn notices(&self) -> Option<&NoticeSink> {
        self.notices.as_ref()
    }

    /// Remember the persisted state of a single record.
    pub fn stash(&mut self, record: Record) {
        self.snapshots
            .insert((record.model.clone(), record.id), record);
    }

    /// Take the stashed state of a single record, if any.
    pub fn take(&mut self, model: &ModelKey, id: RecordId) -> Option<Record> {
        self.snapshots.remove(&(model.clone(), id))
    }

    /// Remember the persisted state of every row targeted by a bulk update.
    pub fn stash_bulk(&mut self, model: &ModelKey, rows: impl IntoIterator<Item = Record>) {
        let entry = self.bulk.entry(model.clone()).or_default();
        for row in rows {
            entry.insert(row.id, row);
        }
    }

    /// Take the bulk snapshot of one row. The model entry is dropped once empty.
    pub fn take_bulk(&mut self, model: &ModelKey, id: RecordId) -> Option<Record> {
        let rows = self.bulk.get_mut(model)?;
        let row = rows.remove(&id);
        if rows.is_empty() {
            self.bulk.remove(model);
        }
        row
    }

    /// Drop every bulk snapshot of `model`, returning how many were held.
    pub fn discard_bulk(&mut self, model: &ModelKey) -> usize {
        self.bulk.remove(model).map_or(0, |rows| rows.len())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty() && self.bulk.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn employee() -> ModelKey {
        ModelKey::parse("employee.Employee").unwrap()
    }

    #[test]
    fn should_consume_snapshot_once() {
        let mut ctx = MutationContext::new();
        let record = Record::new(employee()).with("first_name", "Ada");
        let id = record.id;
        ctx.stash(record.clone());

        assert_eq!(ctx.take(&employee(), id), Some(record));
        assert_eq!(ctx.take(&employee(), id), None);
        assert!(ctx.is_empty());
    }

    #[test]
    fn should_keep_snapshots_of_different_records_apart() {
        let mut ctx = MutationContext::new();
        let a = Record::new(employee()).with("first_name", "Ada");
        let b = Record::new(employee()).with("first_name", "Bob");
        ctx.stash(a.clone());
        ctx.stash(b.clone());

        assert_eq!(ctx.take(&employee(), b.id), Some(b));
        assert_eq!(ctx.take(&employee(), a.id), Some(a));
    }

    #[test]
    fn should_drop_bulk_entry_when_every_row_was_taken() {
        let mut ctx = MutationContext::new();
        let a = Record::new(employee());
        let b = Record::new(employee());
        ctx.stash_bulk(&employee(), vec![a.clone(), b.clone()]);

        assert_eq!(ctx.take_bulk(&employee(), a.id), Some(a));
        assert!(!ctx.is_empty());
        assert_eq!(ctx.take_bulk(&employee(), b.id), Some(b));
        assert!(ctx.is_empty());
    }

    #[test]
    fn should_discard_bulk_snapshots_of_one_model() {
        let mut ctx = MutationContext::new();
        ctx.stash_bulk(&employee(), vec![Record::new(employee()), Record::new(employee())]);

        assert_eq!(ctx.discard_bulk(&employee()), 2);
        assert_eq!(ctx.discard_bulk(&employee()), 0);
        assert!(ctx.is_empty());
    }

    #[test]
    fn should_share_notices_between_sink_clones() {
        let sink = NoticeSink::default();
        let ctx = MutationContext::new().with_notices(sink.clone());
        if let Some(notices) = ctx.notices() {
            notices.push(Notice::error("smtp down"));
        }

        let drained = sink.drain();
        assert_eq!(drained, vec![Notice::error("smtp down")]);
        assert!(sink.drain().is_empty());
    }
}
