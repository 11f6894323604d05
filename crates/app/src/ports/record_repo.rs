//! Record repository port — the generic entity store the engine reads
//! through when it follows relations.

use std::future::Future;

use hrmail_domain::error::HrMailError;
use hrmail_domain::id::RecordId;
use hrmail_domain::record::Record;
use hrmail_domain::schema::ModelKey;

/// Repository for records of any registered model.
pub trait RecordRepository {
    /// Get one record of `model` by id.
    fn get(
        &self,
        model: &ModelKey,
        id: RecordId,
    ) -> impl Future<Output = Result<Option<Record>, HrMailError>> + Send;

    /// Get the records of `model` whose ids are in `ids`.
    ///
    /// Unknown ids are skipped. The order of the result is unspecified.
    fn get_many(
        &self,
        model: &ModelKey,
        ids: &[RecordId],
    ) -> impl Future<Output = Result<Vec<Record>, HrMailError>> + Send;

    /// List every record of `model`.
    fn list(
        &self,
        model: &ModelKey,
    ) -> impl Future<Output = Result<Vec<Record>, HrMailError>> + Send;

    /// Persist a new record.
    fn insert(&self, record: Record) -> impl Future<Output = Result<Record, HrMailError>> + Send;

    /// Replace an existing record.
    ///
    /// Fails with [`HrMailError::NotFound`] when the record does not exist.
    fn update(&self, record: Record) -> impl Future<Output = Result<Record, HrMailError>> + Send;

    /// Replace many existing records at once.
    ///
    /// All or nothing: when one record is missing or the write fails, none
    /// of them are changed.
    fn update_many(
        &self,
        records: Vec<Record>,
    ) -> impl Future<Output = Result<Vec<Record>, HrMailError>> + Send;

    /// Delete a record. Deleting a missing record is not an error.
    fn delete(
        &self,
        model: &ModelKey,
        id: RecordId,
    ) -> impl Future<Output = Result<(), HrMailError>> + Send;
}
