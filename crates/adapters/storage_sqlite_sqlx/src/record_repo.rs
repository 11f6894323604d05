//! `SQLite` implementation of [`RecordRepository`].
//!
//! Every model shares the `records` table; field maps are stored as JSON.

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, QueryBuilder, Row, Sqlite, SqlitePool};

use hrmail_app::ports::RecordRepository;
use hrmail_domain::error::{HrMailError, NotFoundError};
use hrmail_domain::id::RecordId;
use hrmail_domain::record::Record;
use hrmail_domain::schema::ModelKey;

use crate::error::{StorageError, decode};

struct Wrapper(Record);

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let model: String = row.try_get("model")?;
        let id: String = row.try_get("id")?;
        let fields_json: String = row.try_get("fields")?;

        Ok(Self(Record {
            model: ModelKey::parse(&model).map_err(decode)?,
            id: id.parse().map_err(decode)?,
            fields: serde_json::from_str(&fields_json).map_err(decode)?,
        }))
    }
}

/// `SQLite`-backed record repository.
pub struct SqliteRecordRepository {
    pool: SqlitePool,
}

impl SqliteRecordRepository {
    /// Create a new repository backed by the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl RecordRepository for SqliteRecordRepository {
    async fn get(&self, model: &ModelKey, id: RecordId) -> Result<Option<Record>, HrMailError> {
        let row: Option<Wrapper> =
            sqlx::query_as("SELECT model, id, fields FROM records WHERE model = ? AND id = ?")
                .bind(model.as_str())
                .bind(id.to_string())
                .fetch_optional(&self.pool)
                .await
                .map_err(StorageError::from)?;
        Ok(row.map(|w| w.0))
    }

    async fn get_many(&self, model: &ModelKey, ids: &[RecordId]) -> Result<Vec<Record>, HrMailError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut query =
            QueryBuilder::<Sqlite>::new("SELECT model, id, fields FROM records WHERE model = ");
        query.push_bind(model.to_string()).push(" AND id IN (");
        let mut separated = query.separated(", ");
        for id in ids {
            separated.push_bind(id.to_string());
        }
        separated.push_unseparated(")");

        let rows: Vec<Wrapper> = query
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(rows.into_iter().map(|w| w.0).collect())
    }

    async fn list(&self, model: &ModelKey) -> Result<Vec<Record>, HrMailError> {
        let rows: Vec<Wrapper> =
            sqlx::query_as("SELECT model, id, fields FROM records WHERE model = ? ORDER BY id")
                .bind(model.as_str())
                .fetch_all(&self.pool)
                .await
                .map_err(StorageError::from)?;
        Ok(rows.into_iter().map(|w| w.0).collect())
    }

    async fn insert(&self, record: Record) -> Result<Record, HrMailError> {
        let fields_json = serde_json::to_string(&record.fields).map_err(StorageError::from)?;
        sqlx::query("INSERT INTO records (model, id, fields) VALUES (?, ?, ?)")
            .bind(record.model.as_str())
            .bind(record.id.to_string())
            .bind(&fields_json)
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(record)
    }

    async fn update(&self, record: Record) -> Result<Record, HrMailError> {
        let fields_json = serde_json::to_string(&record.fields).map_err(StorageError::from)?;
        let result = sqlx::query("UPDATE records SET fields = ? WHERE model = ? AND id = ?")
            .bind(&fields_json)
            .bind(record.model.as_str())
            .bind(record.id.to_string())
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;

        if result.rows_affected() == 0 {
            return Err(NotFoundError {
                entity: "Record",
                id: record.id.to_string(),
            }
            .into());
        }
        Ok(record)
    }

    async fn update_many(&self, records: Vec<Record>) -> Result<Vec<Record>, HrMailError> {
        let mut tx = self.pool.begin().await.map_err(StorageError::from)?;
        for record in &records {
            let fields_json = serde_json::to_string(&record.fields).map_err(StorageError::from)?;
            let result = sqlx::query("UPDATE records SET fields = ? WHERE model = ? AND id = ?")
                .bind(&fields_json)
                .bind(record.model.as_str())
                .bind(record.id.to_string())
                .execute(&mut *tx)
                .await
                .map_err(StorageError::from)?;

            // Dropping `tx` rolls back the rows already written.
            if result.rows_affected() == 0 {
                return Err(NotFoundError {
                    entity: "Record",
                    id: record.id.to_string(),
                }
                .into());
            }
        }
        tx.commit().await.map_err(StorageError::from)?;
        Ok(records)
    }

    async fn delete(&self, model: &ModelKey, id: RecordId) -> Result<(), HrMailError> {
        sqlx::query("DELETE FROM records WHERE model = ? AND id = ?")
            .bind(model.as_str())
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(())
    }
}
